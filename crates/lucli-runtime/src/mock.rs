use crate::backend::{BackendHandle, InstanceContext, RuntimeBackend};
use crate::RuntimeError;
use std::collections::HashMap;
use std::sync::Mutex;

/// A backend with no real process or container behind it, for exercising
/// `lucli-core::Engine`'s orchestration (WAL, state transitions, readiness
/// polling) without spawning anything real.
pub struct MockBackend {
    running: Mutex<HashMap<String, u32>>,
    next_pid: Mutex<u32>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            running: Mutex::new(HashMap::new()),
            next_pid: Mutex::new(90_000),
        }
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RuntimeBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn available(&self) -> bool {
        true
    }

    fn prepare(&self, ctx: &InstanceContext) -> Result<(), RuntimeError> {
        std::fs::create_dir_all(&ctx.instance_dir)?;
        std::fs::create_dir_all(ctx.logs_dir())?;
        Ok(())
    }

    fn start(&self, ctx: &InstanceContext) -> Result<BackendHandle, RuntimeError> {
        let mut running = self
            .running
            .lock()
            .map_err(|e| RuntimeError::ExecFailed(format!("mutex poisoned: {e}")))?;
        if running.contains_key(&ctx.name) {
            return Err(RuntimeError::AlreadyRunning(ctx.name.clone()));
        }
        let mut next = self
            .next_pid
            .lock()
            .map_err(|e| RuntimeError::ExecFailed(format!("mutex poisoned: {e}")))?;
        let pid = *next;
        *next += 1;
        running.insert(ctx.name.clone(), pid);
        std::fs::create_dir_all(ctx.logs_dir())?;
        std::fs::write(
            ctx.logs_dir().join("server.log"),
            format!("mock server started on port {}\n", ctx.port),
        )?;
        Ok(BackendHandle::Process { pid })
    }

    fn stop(&self, ctx: &InstanceContext, _handle: &BackendHandle) -> Result<(), RuntimeError> {
        let mut running = self
            .running
            .lock()
            .map_err(|e| RuntimeError::ExecFailed(format!("mutex poisoned: {e}")))?;
        running.remove(&ctx.name);
        Ok(())
    }

    fn probe(&self, ctx: &InstanceContext, _handle: &BackendHandle) -> Result<bool, RuntimeError> {
        let running = self
            .running
            .lock()
            .map_err(|e| RuntimeError::ExecFailed(format!("mutex poisoned: {e}")))?;
        Ok(running.contains_key(&ctx.name))
    }

    fn logs(&self, ctx: &InstanceContext, lines: usize) -> Result<Vec<String>, RuntimeError> {
        let path = ctx.logs_dir().join("server.log");
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(content
            .lines()
            .rev()
            .take(lines)
            .map(str::to_owned)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn test_ctx(dir: &std::path::Path) -> InstanceContext {
        InstanceContext {
            name: "mock-test".to_owned(),
            instance_dir: dir.join("instance"),
            project_dir: dir.join("project"),
            webroot: dir.join("project"),
            host: "localhost".to_owned(),
            port: 8080,
            shutdown_port: 8081,
            https_port: None,
            engine_version: "6".to_owned(),
            runtime: lucli_schema::RuntimeConfig::Embedded { variant: None },
            express_cache_dir: dir.join("express"),
            admin_password: None,
            agent_env: BTreeMap::new(),
        }
    }

    #[test]
    fn mock_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockBackend::new();
        let ctx = test_ctx(dir.path());

        backend.prepare(&ctx).unwrap();
        let handle = backend.start(&ctx).unwrap();
        assert!(matches!(handle, BackendHandle::Process { .. }));
        assert!(backend.probe(&ctx, &handle).unwrap());

        backend.stop(&ctx, &handle).unwrap();
        assert!(!backend.probe(&ctx, &handle).unwrap());
    }

    #[test]
    fn mock_rejects_double_start() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockBackend::new();
        let ctx = test_ctx(dir.path());
        backend.prepare(&ctx).unwrap();
        backend.start(&ctx).unwrap();
        assert!(matches!(
            backend.start(&ctx),
            Err(RuntimeError::AlreadyRunning(_))
        ));
    }

    #[test]
    fn mock_logs_tail() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockBackend::new();
        let ctx = test_ctx(dir.path());
        backend.prepare(&ctx).unwrap();
        backend.start(&ctx).unwrap();
        let logs = backend.logs(&ctx, 10).unwrap();
        assert!(!logs.is_empty());
    }
}

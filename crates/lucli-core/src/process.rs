//! ProcessController (spec §4.8, C8): start/stop/probe the runtime's
//! OS-level presence and poll for readiness. Does not decide *which*
//! backend to use (that's [`lucli_runtime::select_backend`], invoked by
//! [`crate::engine::Engine`]) — this module only drives the capability set
//! `{start, stop, probe, logs}` against a given backend and tracks the
//! `.pid`/`.container` marker plus port/HTTP readiness polling.

use crate::CoreError;
use lucli_runtime::{BackendHandle, InstanceContext, RuntimeBackend};
use std::net::TcpStream;
use std::time::{Duration, Instant};

/// Deadlines for the start protocol's readiness probe (spec §4.8 step 3,
/// §5 "Readiness timeout defaults to 60 seconds").
#[derive(Debug, Clone, Copy)]
pub struct ReadinessOptions {
    pub total_deadline: Duration,
    pub http_deadline: Duration,
    pub poll_interval: Duration,
}

impl Default for ReadinessOptions {
    fn default() -> Self {
        Self {
            total_deadline: Duration::from_secs(60),
            http_deadline: Duration::from_secs(10),
            poll_interval: Duration::from_millis(200),
        }
    }
}

pub struct ProcessController;

impl Default for ProcessController {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessController {
    pub fn new() -> Self {
        Self
    }

    /// Spawn the runtime (spec §4.8 start protocol step 1-2): the backend
    /// itself writes the `.pid`/`.container` marker atomically.
    pub fn start(
        &self,
        backend: &dyn RuntimeBackend,
        ctx: &InstanceContext,
    ) -> Result<BackendHandle, CoreError> {
        Ok(backend.start(ctx)?)
    }

    /// Poll the primary port until a TCP connect succeeds or the total
    /// deadline elapses, then issue an HTTP `GET /` that must return any
    /// non-5xx response within the secondary deadline. Returns
    /// `StartTimeout` on either failure; the caller is responsible for the
    /// `FAILED` transition and log-tail capture (spec §4.8 step 3).
    pub fn await_ready(
        &self,
        ctx: &InstanceContext,
        opts: &ReadinessOptions,
    ) -> Result<(), CoreError> {
        let deadline = Instant::now() + opts.total_deadline;
        loop {
            if TcpStream::connect((ctx.host.as_str(), ctx.port)).is_ok() {
                break;
            }
            if crate::shutdown_requested() {
                return Err(CoreError::StartTimeout {
                    name: ctx.name.clone(),
                    seconds: opts.total_deadline.as_secs(),
                });
            }
            if Instant::now() >= deadline {
                return Err(CoreError::StartTimeout {
                    name: ctx.name.clone(),
                    seconds: opts.total_deadline.as_secs(),
                });
            }
            std::thread::sleep(opts.poll_interval);
        }

        let http_deadline = Instant::now() + opts.http_deadline;
        loop {
            if http_get_ready(&ctx.host, ctx.port) {
                return Ok(());
            }
            if crate::shutdown_requested() || Instant::now() >= http_deadline {
                return Err(CoreError::StartTimeout {
                    name: ctx.name.clone(),
                    seconds: opts.total_deadline.as_secs(),
                });
            }
            std::thread::sleep(opts.poll_interval);
        }
    }

    /// Graceful stop, escalating inside the backend; removes whichever
    /// marker file the backend used regardless of the backend's own
    /// cleanup, since spec §4.8 requires "remove the PID/container marker
    /// regardless" even when `stop` itself already reports success.
    pub fn stop(
        &self,
        backend: &dyn RuntimeBackend,
        ctx: &InstanceContext,
        handle: &BackendHandle,
    ) -> Result<(), CoreError> {
        let result = backend.stop(ctx, handle);
        let _ = std::fs::remove_file(ctx.pid_file());
        let _ = std::fs::remove_file(ctx.container_file());
        Ok(result?)
    }

    pub fn probe(
        &self,
        backend: &dyn RuntimeBackend,
        ctx: &InstanceContext,
        handle: &BackendHandle,
    ) -> Result<bool, CoreError> {
        Ok(backend.probe(ctx, handle)?)
    }

    pub fn logs(
        &self,
        backend: &dyn RuntimeBackend,
        ctx: &InstanceContext,
        lines: usize,
    ) -> Result<Vec<String>, CoreError> {
        Ok(backend.logs(ctx, lines)?)
    }

    /// Reconstruct the `BackendHandle` from whichever marker file is
    /// present on disk, for `status`/`list`/`stop` invocations that start
    /// from a fresh process rather than one that just called `start`.
    pub fn read_handle(ctx: &InstanceContext) -> Option<BackendHandle> {
        if let Ok(content) = std::fs::read_to_string(ctx.pid_file()) {
            if let Ok(pid) = content.trim().parse::<u32>() {
                return Some(BackendHandle::Process { pid });
            }
        }
        if let Ok(content) = std::fs::read_to_string(ctx.container_file()) {
            let mut lines = content.lines();
            if let (Some(name), Some(image)) = (lines.next(), lines.next()) {
                return Some(BackendHandle::Container {
                    name: name.to_owned(),
                    image: image.to_owned(),
                });
            }
        }
        None
    }
}

/// Issue a `GET /` and report whether the runtime is up, using the same
/// `ureq` client `lucli-deps` uses for its `http`/`maven` sources rather
/// than a hand-rolled wire read. `ureq` treats a 5xx response as an error
/// by default, so any `Ok` here already satisfies "any non-5xx response"
/// (spec §4.8 step 3); an `Err` means either a 5xx or the connection was
/// refused/reset, both of which should keep the readiness loop polling.
fn http_get_ready(host: &str, port: u16) -> bool {
    let agent = ureq::Agent::new_with_defaults();
    agent.get(format!("http://{host}:{port}/")).call().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lucli_runtime::select_backend_named;
    use std::collections::BTreeMap;

    fn test_ctx(dir: &std::path::Path) -> InstanceContext {
        InstanceContext {
            name: "process-test".to_owned(),
            instance_dir: dir.join("instance"),
            project_dir: dir.join("project"),
            webroot: dir.join("project"),
            host: "127.0.0.1".to_owned(),
            port: 18080,
            shutdown_port: 18081,
            https_port: None,
            engine_version: "6.1".to_owned(),
            runtime: lucli_schema::RuntimeConfig::Embedded { variant: None },
            express_cache_dir: dir.join("express"),
            admin_password: None,
            agent_env: BTreeMap::new(),
        }
    }

    #[test]
    fn read_handle_parses_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_ctx(dir.path());
        std::fs::create_dir_all(&ctx.instance_dir).unwrap();
        std::fs::write(ctx.pid_file(), "4242").unwrap();
        let handle = ProcessController::read_handle(&ctx).unwrap();
        assert_eq!(handle, BackendHandle::Process { pid: 4242 });
    }

    #[test]
    fn read_handle_parses_container_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_ctx(dir.path());
        std::fs::create_dir_all(&ctx.instance_dir).unwrap();
        std::fs::write(ctx.container_file(), "lucli-demo\nlucee:6\n").unwrap();
        let handle = ProcessController::read_handle(&ctx).unwrap();
        assert_eq!(
            handle,
            BackendHandle::Container {
                name: "lucli-demo".to_owned(),
                image: "lucee:6".to_owned()
            }
        );
    }

    #[test]
    fn mock_backend_start_then_probe_then_stop() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_ctx(dir.path());
        let backend = select_backend_named("mock").unwrap();
        let controller = ProcessController::new();

        backend.prepare(&ctx).unwrap();
        let handle = controller.start(backend.as_ref(), &ctx).unwrap();
        assert!(controller.probe(backend.as_ref(), &ctx, &handle).unwrap());
        controller.stop(backend.as_ref(), &ctx, &handle).unwrap();
        assert!(!controller.probe(backend.as_ref(), &ctx, &handle).unwrap());
    }
}

//! The `embedded` backend: a bundled, version-pinned servlet container
//! distribution run as a plain subprocess.
//!
//! The shape is "prepare a directory, spawn a child process, write a pid
//! file"; there is no user-namespace or overlay-filesystem isolation here.
//! LuCLI's embedded runtime copies a cached vendor subset into the instance
//! directory and runs it unsandboxed.

use crate::backend::{BackendHandle, InstanceContext, RuntimeBackend};
use crate::RuntimeError;
use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::process::{Command, Stdio};

/// Minimum/maximum supported major engine versions. Download and
/// provisioning logic below treats anything outside this range as
/// incompatible with the bundled servlet container (spec §4.5: "incompatible
/// pairs fail with RuntimeIncompatible").
const MIN_SUPPORTED_MAJOR: u32 = 5;
const MAX_SUPPORTED_MAJOR: u32 = 6;

pub struct EmbeddedBackend;

impl Default for EmbeddedBackend {
    fn default() -> Self {
        Self
    }
}

impl EmbeddedBackend {
    pub fn new() -> Self {
        Self
    }

    fn check_version_compat(engine_version: &str) -> Result<(), RuntimeError> {
        let major: u32 = engine_version
            .split('.')
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                RuntimeError::RuntimeIncompatible(format!(
                    "cannot parse major version from '{engine_version}'"
                ))
            })?;
        if !(MIN_SUPPORTED_MAJOR..=MAX_SUPPORTED_MAJOR).contains(&major) {
            return Err(RuntimeError::RuntimeIncompatible(format!(
                "engine version {engine_version} is outside the supported range {MIN_SUPPORTED_MAJOR}.x-{MAX_SUPPORTED_MAJOR}.x for the embedded backend"
            )));
        }
        Ok(())
    }

    /// Path to the cached, extracted vendor distribution for one engine
    /// version, under `ctx.express_cache_dir` (`express/<version>/`).
    fn vendor_dir(ctx: &InstanceContext) -> std::path::PathBuf {
        ctx.express_cache_dir.join(&ctx.engine_version)
    }

    fn pid_alive(pid: u32) -> bool {
        #[allow(unsafe_code)]
        let alive = unsafe { libc::kill(pid as libc::pid_t, 0) == 0 };
        alive
    }
}

impl RuntimeBackend for EmbeddedBackend {
    fn name(&self) -> &'static str {
        "embedded"
    }

    fn available(&self) -> bool {
        true
    }

    fn prepare(&self, ctx: &InstanceContext) -> Result<(), RuntimeError> {
        Self::check_version_compat(&ctx.engine_version)?;

        let vendor_dir = Self::vendor_dir(ctx);
        if !vendor_dir.exists() {
            // The actual download of a vendor distribution archive is
            // performed by the caller before `prepare` runs (spec puts
            // network I/O in `lucli-deps`/the materializer, not here); by
            // the time we reach this point the cache entry must already
            // exist.
            return Err(RuntimeError::EngineDownloadFailed(format!(
                "no cached distribution for engine version {} at {}",
                ctx.engine_version,
                vendor_dir.display()
            )));
        }

        fs::create_dir_all(&ctx.instance_dir)?;
        fs::create_dir_all(ctx.logs_dir())?;
        copy_dir_recursive(&vendor_dir, &ctx.instance_dir.join("runtime"))?;
        Ok(())
    }

    fn start(&self, ctx: &InstanceContext) -> Result<BackendHandle, RuntimeError> {
        if ctx.pid_file().exists() {
            let existing = fs::read_to_string(ctx.pid_file())?;
            if let Ok(pid) = existing.trim().parse::<u32>() {
                if Self::pid_alive(pid) {
                    return Err(RuntimeError::AlreadyRunning(ctx.name.clone()));
                }
            }
        }

        let runtime_dir = ctx.instance_dir.join("runtime");
        let launcher = runtime_dir.join("bin").join("start.sh");
        let log_path = ctx.logs_dir().join("server.log");
        fs::create_dir_all(ctx.logs_dir())?;
        let log_file = fs::File::create(&log_path)?;

        let mut command = Command::new("sh");
        command
            .arg(launcher)
            .current_dir(&runtime_dir)
            .env("LUCLI_WEBROOT", &ctx.webroot)
            .env("LUCLI_HOST", &ctx.host)
            .env("LUCLI_PORT", ctx.port.to_string())
            .env("LUCLI_SHUTDOWN_PORT", ctx.shutdown_port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file.try_clone()?))
            .stderr(Stdio::from(log_file));

        if let Some(https_port) = ctx.https_port {
            command.env("LUCLI_HTTPS_PORT", https_port.to_string());
        }
        if let Some(password) = &ctx.admin_password {
            command.env("LUCLI_ADMIN_PASSWORD", password);
        }
        for (key, value) in &ctx.agent_env {
            command.env(key, value);
        }

        let child = command
            .spawn()
            .map_err(|e| RuntimeError::ExecFailed(format!("failed to spawn embedded server: {e}")))?;
        let pid = child.id();

        let mut pid_file = fs::File::create(ctx.pid_file())?;
        write!(pid_file, "{pid}")?;
        pid_file.sync_all()?;

        Ok(BackendHandle::Process { pid })
    }

    fn stop(&self, ctx: &InstanceContext, handle: &BackendHandle) -> Result<(), RuntimeError> {
        let pid = match handle {
            BackendHandle::Process { pid } => *pid,
            BackendHandle::Container { .. } => {
                return Err(RuntimeError::ExecFailed(
                    "embedded backend received a container handle".to_owned(),
                ))
            }
        };

        #[allow(unsafe_code)]
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
        while std::time::Instant::now() < deadline {
            if !Self::pid_alive(pid) {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(200));
        }
        if Self::pid_alive(pid) {
            #[allow(unsafe_code)]
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGKILL);
            }
        }

        let _ = fs::remove_file(ctx.pid_file());
        Ok(())
    }

    fn probe(&self, _ctx: &InstanceContext, handle: &BackendHandle) -> Result<bool, RuntimeError> {
        match handle {
            BackendHandle::Process { pid } => Ok(Self::pid_alive(*pid)),
            BackendHandle::Container { .. } => Err(RuntimeError::ExecFailed(
                "embedded backend received a container handle".to_owned(),
            )),
        }
    }

    fn logs(&self, ctx: &InstanceContext, lines: usize) -> Result<Vec<String>, RuntimeError> {
        let path = ctx.logs_dir().join("server.log");
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(path)?;
        Ok(content
            .lines()
            .rev()
            .take(lines)
            .map(str::to_owned)
            .collect())
    }
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let dest_path = dst.join(entry.file_name());
        if file_type.is_dir() {
            copy_dir_recursive(&entry.path(), &dest_path)?;
        } else {
            fs::copy(entry.path(), &dest_path)?;
        }
    }
    Ok(())
}

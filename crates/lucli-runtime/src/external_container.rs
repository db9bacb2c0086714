//! The `external-container` backend: a user-supplied `CATALINA_HOME` treated
//! as read-only, with an isolated `CATALINA_BASE` constructed per instance
//! by mounting a shared, unwritable base and layering instance-specific
//! state on top of it.

use crate::backend::{BackendHandle, InstanceContext, RuntimeBackend};
use crate::security::resolve_within;
use crate::RuntimeError;
use std::fs;
use std::io::Write as _;
use std::process::{Command, Stdio};

pub struct ExternalContainerBackend {
    /// The user-declared `CATALINA_HOME` from the manifest's
    /// `runtime.catalinaHome`. Empty when constructed via
    /// `select_backend_named` for capability probing only.
    catalina_home: String,
}

impl ExternalContainerBackend {
    pub fn new(catalina_home: String) -> Self {
        Self { catalina_home }
    }

    /// `CATALINA_BASE` directories conventionally expected beneath an
    /// instance-private base.
    const BASE_SUBDIRS: &'static [&'static str] =
        &["conf", "logs", "webapps", "work", "temp"];

    fn catalina_base(&self, ctx: &InstanceContext) -> std::path::PathBuf {
        ctx.instance_dir.join("catalina-base")
    }

    fn pid_alive(pid: u32) -> bool {
        #[allow(unsafe_code)]
        let alive = unsafe { libc::kill(pid as libc::pid_t, 0) == 0 };
        alive
    }
}

impl RuntimeBackend for ExternalContainerBackend {
    fn name(&self) -> &'static str {
        "external-container"
    }

    fn available(&self) -> bool {
        !self.catalina_home.is_empty() && std::path::Path::new(&self.catalina_home).is_dir()
    }

    fn prepare(&self, ctx: &InstanceContext) -> Result<(), RuntimeError> {
        if self.catalina_home.is_empty() {
            return Err(RuntimeError::BackendUnavailable(
                "external-container backend requires runtime.catalinaHome".to_owned(),
            ));
        }
        if !std::path::Path::new(&self.catalina_home).is_dir() {
            return Err(RuntimeError::BackendUnavailable(format!(
                "CATALINA_HOME '{}' does not exist or is not a directory",
                self.catalina_home
            )));
        }

        let base = self.catalina_base(ctx);
        resolve_within(&ctx.instance_dir.to_string_lossy(), &base.to_string_lossy())?;

        fs::create_dir_all(&base)?;
        for subdir in Self::BASE_SUBDIRS {
            fs::create_dir_all(base.join(subdir))?;
        }
        fs::create_dir_all(ctx.logs_dir())?;
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

        let base = self.catalina_base(ctx);
        let startup = std::path::Path::new(&self.catalina_home)
            .join("bin")
            .join("catalina.sh");
        let log_path = ctx.logs_dir().join("server.log");
        fs::create_dir_all(ctx.logs_dir())?;
        let log_file = fs::File::create(&log_path)?;

        let mut command = Command::new("sh");
        command
            .arg(startup)
            .arg("run")
            .env("CATALINA_HOME", &self.catalina_home)
            .env("CATALINA_BASE", &base)
            .env("LUCLI_WEBROOT", &ctx.webroot)
            .env("LUCLI_HOST", &ctx.host)
            .env("LUCLI_PORT", ctx.port.to_string())
            .env("LUCLI_SHUTDOWN_PORT", ctx.shutdown_port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file.try_clone()?))
            .stderr(Stdio::from(log_file));

        if let Some(password) = &ctx.admin_password {
            command.env("LUCLI_ADMIN_PASSWORD", password);
        }
        for (key, value) in &ctx.agent_env {
            command.env(key, value);
        }

        let child = command.spawn().map_err(|e| {
            RuntimeError::ExecFailed(format!("failed to spawn external container process: {e}"))
        })?;
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
                    "external-container backend received a container handle".to_owned(),
                ))
            }
        };

        #[allow(unsafe_code)]
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(15);
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
                "external-container backend received a container handle".to_owned(),
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

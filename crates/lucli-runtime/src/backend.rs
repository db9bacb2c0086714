use crate::RuntimeError;
use lucli_schema::RuntimeConfig;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Everything a `RuntimeBackend` needs to prepare, start, stop, probe, or
/// tail logs for one instance. Built by `lucli-core::Engine` from the
/// resolved [`lucli_schema::Manifest`] and the instance's on-disk location.
#[derive(Debug, Clone)]
pub struct InstanceContext {
    pub name: String,
    pub instance_dir: PathBuf,
    pub project_dir: PathBuf,
    pub webroot: PathBuf,
    pub host: String,
    pub port: u16,
    pub shutdown_port: u16,
    pub https_port: Option<u16>,
    pub engine_version: String,
    pub runtime: RuntimeConfig,
    /// `express/<version>/` under `LUCLI_HOME`, where the embedded backend
    /// caches downloaded vendor distributions.
    pub express_cache_dir: PathBuf,
    pub admin_password: Option<String>,
    /// Active agent JVM argument bundles, passed through to the container
    /// backend as environment variables (spec §4.5: "passes engine-admin
    /// password and agent configuration as environment variables").
    pub agent_env: BTreeMap<String, String>,
}

impl InstanceContext {
    pub fn logs_dir(&self) -> PathBuf {
        self.instance_dir.join("logs")
    }

    pub fn pid_file(&self) -> PathBuf {
        self.instance_dir.join(".pid")
    }

    pub fn container_file(&self) -> PathBuf {
        self.instance_dir.join(".container")
    }
}

/// What a backend's `start` produced: an OS process, or a running container.
/// Spec §3 ProcessHandle: "an OS process ID plus the port it claimed ... For
/// container runtimes: a container name plus its image reference."
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendHandle {
    Process { pid: u32 },
    Container { name: String, image: String },
}

/// The common capability set named in spec §9: `{prepare, start, stop,
/// probe, logs}`. A tagged variant per backend (`embedded`,
/// `external-container`, `container`) is sufficient; no inheritance
/// hierarchy is needed.
pub trait RuntimeBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this backend's prerequisites are satisfied on this host.
    fn available(&self) -> bool;

    /// Materialize the runtime's on-disk state for `ctx` without starting
    /// anything (provisioning, spec §3 Glossary): download/cache and copy
    /// vendor artifacts, construct an isolated `CATALINA_BASE`, or pull a
    /// container image.
    fn prepare(&self, ctx: &InstanceContext) -> Result<(), RuntimeError>;

    /// Spawn the server process or container. Does not block for readiness;
    /// the caller (`lucli-core::process::ProcessController`) owns polling.
    fn start(&self, ctx: &InstanceContext) -> Result<BackendHandle, RuntimeError>;

    /// Gracefully stop, escalating to a forceful kill after a bounded wait.
    fn stop(&self, ctx: &InstanceContext, handle: &BackendHandle) -> Result<(), RuntimeError>;

    /// Whether the process/container behind `handle` is still alive.
    fn probe(&self, ctx: &InstanceContext, handle: &BackendHandle) -> Result<bool, RuntimeError>;

    /// Return up to `lines` trailing lines of the instance's log output.
    fn logs(&self, ctx: &InstanceContext, lines: usize) -> Result<Vec<String>, RuntimeError>;
}

/// Construct the backend named by `ctx.runtime`'s tag, or by an explicit
/// `override_name` (used to select the `mock` backend in tests).
pub fn select_backend(runtime: &RuntimeConfig) -> Result<Box<dyn RuntimeBackend>, RuntimeError> {
    match runtime {
        RuntimeConfig::Embedded { .. } => Ok(Box::new(crate::embedded::EmbeddedBackend::new())),
        RuntimeConfig::ExternalContainer { catalina_home } => Ok(Box::new(
            crate::external_container::ExternalContainerBackend::new(catalina_home.clone()),
        )),
        RuntimeConfig::Container { .. } => Ok(Box::new(crate::container::ContainerBackend::new())),
    }
}

/// Construct a backend by its bare name, including `"mock"` for tests.
pub fn select_backend_named(name: &str) -> Result<Box<dyn RuntimeBackend>, RuntimeError> {
    match name {
        "embedded" => Ok(Box::new(crate::embedded::EmbeddedBackend::new())),
        "external-container" => Ok(Box::new(
            crate::external_container::ExternalContainerBackend::new(String::new()),
        )),
        "container" => Ok(Box::new(crate::container::ContainerBackend::new())),
        "mock" => Ok(Box::new(crate::mock::MockBackend::new())),
        other => Err(RuntimeError::BackendUnavailable(other.to_owned())),
    }
}

//! Pluggable server runtime backends for LuCLI (spec §4.5, C5 RuntimeProvider).
//!
//! Three variants share a common capability set — `{prepare, start, stop,
//! probe, logs}` — expressed as the [`RuntimeBackend`] trait rather than an
//! inheritance hierarchy: `embedded` (a bundled, version-pinned servlet
//! container distribution), `external-container` (a user-supplied
//! `CATALINA_HOME` treated as read-only), and `container` (an OCI image run
//! via `docker`). [`security`] carries the path-escape check that
//! dependency install paths and container mounts must satisfy (spec §3:
//! "paths must not escape those roots").

pub mod backend;
pub mod container;
pub mod embedded;
pub mod external_container;
pub mod mock;
pub mod prereq;
pub mod security;

pub use backend::{select_backend, select_backend_named, BackendHandle, InstanceContext, RuntimeBackend};
pub use prereq::{check_prereqs, format_missing, MissingPrereq};
pub use security::canonicalize_logical;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("backend '{0}' is not available on this system")]
    BackendUnavailable(String),
    #[error("instance '{0}' is not running")]
    NotRunning(String),
    #[error("instance '{0}' is already running")]
    AlreadyRunning(String),
    #[error("path escapes its declared root: {0}")]
    PathEscape(String),
    #[error("runtime and CFML engine versions are incompatible: {0}")]
    RuntimeIncompatible(String),
    #[error("engine download failed: {0}")]
    EngineDownloadFailed(String),
    #[error("runtime execution failed: {0}")]
    ExecFailed(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

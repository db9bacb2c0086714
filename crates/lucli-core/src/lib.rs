//! Orchestration engine for LuCLI instance lifecycle (spec §2, §4.9, §7).
//!
//! Ties together manifest resolution, environment/secret substitution,
//! instance registry bookkeeping, dependency materialization, config
//! materialization, and runtime process control behind one `Engine`.

pub mod concurrency;
pub mod engine;
pub mod environment;
mod express;
pub mod process;
pub mod registry;

pub use concurrency::{install_signal_handler, shutdown_requested, InstanceLock, RegistryLock};
pub use engine::{DepsInstallOutcome, Engine, StartOptions, StartOutcome};
pub use environment::EnvironmentResolver;
pub use process::ProcessController;
pub use registry::{InstanceRegistry, ReserveOutcome};

use thiserror::Error;

/// Error kinds named in spec §7, plus `#[from]` wiring onto every other
/// crate's error type this crate orchestrates.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("manifest error: {0}")]
    Manifest(#[from] lucli_schema::ManifestError),
    #[error("merge error: {0}")]
    Merge(#[from] lucli_schema::MergeError),
    #[error("lock error: {0}")]
    Lock(#[from] lucli_schema::LockError),
    #[error("store error: {0}")]
    Store(#[from] lucli_store::StoreError),
    #[error("runtime error: {0}")]
    Runtime(#[from] lucli_runtime::RuntimeError),
    #[error("secret error: {0}")]
    Secret(#[from] lucli_secrets::SecretError),
    #[error("dependency error: {0}")]
    Deps(#[from] lucli_deps::DepsError),
    #[error("materialize error: {0}")]
    Materialize(#[from] lucli_materialize::MaterializeError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("placeholder '{0}' has no value and no default")]
    MissingVariable(String),
    #[error("secret '{0}' referenced by manifest is not present in the secret store")]
    MissingSecret(String),
    #[error("instance name '{0}' is already in use by a different project directory")]
    NameConflict(String),
    #[error("instance '{0}' is busy (a start/stop is already in progress)")]
    InstanceBusy(String),
    #[error("port {0} is already in use")]
    PortUnavailable(u16),
    #[error("instance '{name}' did not become ready within {seconds}s")]
    StartTimeout { name: String, seconds: u64 },
    #[error("failed to stop instance '{0}'")]
    StopFailed(String),
    #[error("instance '{0}' not found")]
    InstanceNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_variable_display() {
        let err = CoreError::MissingVariable("DB_HOST".to_owned());
        assert!(err.to_string().contains("DB_HOST"));
    }

    #[test]
    fn port_unavailable_display() {
        let err = CoreError::PortUnavailable(8080);
        assert!(err.to_string().contains("8080"));
    }

    #[test]
    fn start_timeout_display() {
        let err = CoreError::StartTimeout {
            name: "myapp".to_owned(),
            seconds: 60,
        };
        let msg = err.to_string();
        assert!(msg.contains("myapp"));
        assert!(msg.contains("60"));
    }
}

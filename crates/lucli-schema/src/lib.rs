//! Manifest parsing, deep-merge, dependency lock, and newtype identifiers for LuCLI.
//!
//! This crate defines the schema layer: JSON manifest parsing (`Manifest`),
//! the layered deep-merge algorithm (`merge`), the dependency lock file
//! (`DependencyLock`), and filesystem-safe newtype identifiers.

pub mod lock;
pub mod manifest;
pub mod merge;
pub mod types;

pub use lock::{DependencyLock, LockError, LockedDependency};
pub use manifest::{
    AdminConfig, AgentConfig, DependencyEntry, DependencyKind, DependencySettings,
    DependencySource, HttpsConfig, JmxConfig, JvmConfig, KeystoreRef, Manifest, ManifestError,
    MonitoringConfig, RuntimeConfig, UrlRewriteConfig,
};
pub use merge::{apply_environment, apply_overrides, build_override, deep_merge, MergeError};
pub use types::{validate_instance_name, EnvTag, InstanceName};

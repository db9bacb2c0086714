//! Instance metadata persistence, WAL-based crash recovery, artifact caches,
//! and prune/GC for LuCLI (spec §3 Instance/ProcessHandle, §4.4 InstanceRegistry
//! storage, §4.7 dependency/engine caches, §4.9 ConcurrencyGuard's WAL).
//!
//! This crate owns the on-disk shape of `LUCLI_HOME`: per-instance metadata
//! with an embedded integrity checksum, a content-addressable cache for
//! downloaded engine distributions and dependency artifacts, a write-ahead
//! log backing crash-safe rollback of `start`/`stop`/`materialize`/`prune`,
//! and the garbage collector behind `lucli server prune`.

pub mod gc;
pub mod integrity;
pub mod layout;
pub mod metadata;
pub mod objects;
pub mod wal;

pub use gc::{PruneReport, Pruner};
pub use integrity::{verify_store_integrity, IntegrityFailure, IntegrityReport};
pub use layout::{StoreLayout, STORE_FORMAT_VERSION};
pub use metadata::{validate_instance_name, InstanceMetadata, InstanceState, InstanceStore};
pub use objects::ContentCache;
pub use wal::{RollbackStep, WalOpKind, WriteAheadLog};

use std::path::Path;
use thiserror::Error;

/// Fsync a directory to ensure that a preceding `rename()` is durable.
///
/// On Linux with ext4 `data=ordered` (the default), renames are usually
/// durable without an explicit dir fsync, but POSIX does not guarantee this.
/// Calling `fsync()` on the parent directory makes the rename durable on
/// all filesystems and mount configurations.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("integrity check failed for '{hash}': expected {expected}, got {actual}")]
    IntegrityFailure {
        hash: String,
        expected: String,
        actual: String,
    },
    #[error("cache entry not found: {0}")]
    EntryNotFound(String),
    #[error("instance not found: {0}")]
    InstanceNotFound(String),
    #[error("lock acquisition failed: {0}")]
    LockFailed(String),
    #[error("store format version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid instance name: {0}")]
    InvalidName(String),
    #[error("illegal state transition for '{name}': {from} -> {to}")]
    IllegalTransition {
        name: String,
        from: String,
        to: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display_invalid_name() {
        let e = StoreError::InvalidName("bad".to_owned());
        assert!(e.to_string().contains("invalid instance name"));
    }

    #[test]
    fn store_error_display_illegal_transition() {
        let e = StoreError::IllegalTransition {
            name: "myapp".to_owned(),
            from: "absent".to_owned(),
            to: "running".to_owned(),
        };
        let msg = e.to_string();
        assert!(msg.contains("myapp"));
        assert!(msg.contains("absent"));
        assert!(msg.contains("running"));
    }

    #[test]
    fn store_error_display_entry_not_found() {
        let e = StoreError::EntryNotFound("hash123".to_owned());
        assert!(e.to_string().contains("hash123"));
    }

    #[test]
    fn store_error_display_instance_not_found() {
        let e = StoreError::InstanceNotFound("myapp".to_owned());
        assert!(e.to_string().contains("myapp"));
    }

    #[test]
    fn store_error_display_lock_failed() {
        let e = StoreError::LockFailed("reason".to_owned());
        assert!(e.to_string().contains("reason"));
    }

    #[test]
    fn store_error_display_version_mismatch() {
        let e = StoreError::VersionMismatch {
            expected: 2,
            found: 1,
        };
        let msg = e.to_string();
        assert!(msg.contains('2'));
        assert!(msg.contains('1'));
    }

    #[test]
    fn store_error_display_integrity_failure() {
        let e = StoreError::IntegrityFailure {
            hash: "h".to_owned(),
            expected: "exp".to_owned(),
            actual: "act".to_owned(),
        };
        let msg = e.to_string();
        assert!(msg.contains("exp"));
        assert!(msg.contains("act"));
    }
}

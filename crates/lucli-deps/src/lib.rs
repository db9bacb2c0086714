//! Dependency materialization for LuCLI (spec §4.7, C7 DependencyResolver).
//!
//! For each declared dependency, ensures an on-disk materialization exists
//! and is valid, returning the set of virtual mappings consumed by
//! `lucli-materialize`'s engine-configuration output. Backed by a lock file
//! ([`lucli_schema::lock`]) so a re-run that matches the lock is a no-op.
//!
//! External binaries are invoked via `std::process::Command` rather than
//! vendoring a library for the `git` source; the `http`/`maven` sources use
//! `ureq::Agent` directly.

pub mod backoff;
pub mod file_source;
pub mod git_source;
pub mod http_source;
pub mod maven_source;
pub mod resolver;

pub use resolver::{DependencyResolver, ResolvedMapping};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DepsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("lock error: {0}")]
    Lock(#[from] lucli_schema::lock::LockError),
    #[error("malformed dependency entry '{0}': {1}")]
    MalformedEntry(String, String),
    #[error("dependency fetch failed for '{0}': {1}")]
    FetchFailed(String, String),
    #[error("dependency integrity check failed for '{0}': expected {expected}, got {actual}")]
    IntegrityFailed {
        name: String,
        expected: String,
        actual: String,
    },
    #[error("path escapes its declared root: {0}")]
    PathEscape(String),
    #[error("command '{0}' exited with failure: {1}")]
    CommandFailed(String, String),
    #[error("unsupported install method: {0}")]
    UnsupportedInstallMethod(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_dependency_name() {
        let err = DepsError::IntegrityFailed {
            name: "fw1".to_owned(),
            expected: "aaa".to_owned(),
            actual: "bbb".to_owned(),
        };
        let s = format!("{err}");
        assert!(s.contains("fw1"));
        assert!(s.contains("aaa"));
        assert!(s.contains("bbb"));
    }

    #[test]
    fn malformed_entry_display() {
        let err = DepsError::MalformedEntry("fw1".to_owned(), "missing url".to_owned());
        assert!(format!("{err}").contains("missing url"));
    }
}

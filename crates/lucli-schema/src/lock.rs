//! Dependency lock file: records what [`crate::manifest::DependencyEntry`]
//! resolved to, so a re-run that matches the lock is a no-op (spec §4.7).
//!
//! A small serde struct with a deterministic blake3 identity over sorted
//! fields, written atomically (temp-then-rename, fsync of the parent
//! directory), applied here to per-dependency resolution records instead
//! of a whole environment.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse lock file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("lock file digest mismatch: expected {expected}, computed {computed}")]
    DigestMismatch { expected: String, computed: String },
}

/// One resolved dependency: its source ref, content digest, and where it
/// landed on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockedDependency {
    pub name: String,
    pub resolved_ref: String,
    pub digest: String,
    pub install_path: String,
    pub mapping: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencyLock {
    pub lock_version: u32,
    pub entries: Vec<LockedDependency>,
}

impl DependencyLock {
    pub fn new(entries: Vec<LockedDependency>) -> Self {
        let mut entries = entries;
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            lock_version: 1,
            entries,
        }
    }

    /// Deterministic identity over the sorted entry list, used to decide
    /// whether a re-run matches the existing lock (a no-op) or must
    /// re-materialize.
    pub fn compute_digest(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for entry in &self.entries {
            hasher.update(entry.name.as_bytes());
            hasher.update(b"\0");
            hasher.update(entry.resolved_ref.as_bytes());
            hasher.update(b"\0");
            hasher.update(entry.digest.as_bytes());
            hasher.update(b"\0");
            hasher.update(entry.install_path.as_bytes());
            hasher.update(b"\0");
        }
        hasher.finalize().to_hex().to_string()
    }

    pub fn entry(&self, name: &str) -> Option<&LockedDependency> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Whether `self` would produce the same materialized set as `other`
    /// (matching digests and install path for every named dependency).
    pub fn matches(&self, other: &DependencyLock) -> bool {
        self.compute_digest() == other.compute_digest()
    }

    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), LockError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| LockError::Io(e.error))?;
        fsync_dir(parent)?;
        Ok(())
    }

    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, LockError> {
        let content = fs::read_to_string(path)?;
        let lock: DependencyLock = serde_json::from_str(&content)?;
        Ok(lock)
    }
}

fn fsync_dir(dir: &Path) -> std::io::Result<()> {
    let f = fs::File::open(dir)?;
    f.sync_all()
}

/// Diff two locks to find install paths present in `previous` but absent
/// from `current` — candidates for removal under `pruneOnInstall`.
pub fn stale_install_paths(previous: &DependencyLock, current: &DependencyLock) -> Vec<PathBuf> {
    let current_paths: std::collections::HashSet<&str> = current
        .entries
        .iter()
        .map(|e| e.install_path.as_str())
        .collect();
    previous
        .entries
        .iter()
        .filter(|e| !current_paths.contains(e.install_path.as_str()))
        .map(|e| PathBuf::from(&e.install_path))
        .collect()
}

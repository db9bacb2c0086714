//! Two lock granularities for `ConcurrencyGuard` (spec §4.9): a brief
//! whole-home *registry lock* for name reservation/enumeration, and a
//! per-instance lock held for the duration of `start`/`materialize` on one
//! instance. Never hold two instance locks at once (spec §5).
//!
//! An advisory `flock` via `fs2`, released on `Drop`, plus `ctrlc`-based
//! SIGINT handling, generalized here into two distinctly named lock types
//! instead of one.

use crate::CoreError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

fn open_lock_file(lock_path: &Path) -> Result<File, std::io::Error> {
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(lock_path)
}

/// Whole-home lock, held briefly to reserve an instance name or enumerate
/// the instance set (spec §4.4 `reserve`, §4.9 registry lock).
pub struct RegistryLock {
    lock_file: File,
}

impl RegistryLock {
    pub fn acquire(lock_path: &Path) -> Result<Self, CoreError> {
        let file = open_lock_file(lock_path)?;
        file.lock_exclusive()
            .map_err(|e| CoreError::Io(std::io::Error::new(std::io::ErrorKind::WouldBlock, e)))?;
        Ok(Self { lock_file: file })
    }

    pub fn try_acquire(lock_path: &Path) -> Result<Option<Self>, CoreError> {
        let file = open_lock_file(lock_path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { lock_file: file })),
            Err(_) => Ok(None),
        }
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
    }
}

/// Per-instance lock, held for the duration of `start`, `stop`, or
/// `materialize` on one instance (spec §4.9: "operations on a given
/// Instance are strictly sequential under its instance lock"). A
/// contending `start` fails fast with `InstanceBusy` rather than blocking.
pub struct InstanceLock {
    lock_file: File,
}

impl InstanceLock {
    /// Block until the lock is acquired (used for operations willing to wait).
    pub fn acquire(lock_path: &Path) -> Result<Self, CoreError> {
        let file = open_lock_file(lock_path)?;
        file.lock_exclusive()
            .map_err(|e| CoreError::Io(std::io::Error::new(std::io::ErrorKind::WouldBlock, e)))?;
        Ok(Self { lock_file: file })
    }

    /// Fail immediately (as `None`) if another process holds the lock —
    /// the caller turns this into `CoreError::InstanceBusy`.
    pub fn try_acquire(lock_path: &Path) -> Result<Option<Self>, CoreError> {
        let file = open_lock_file(lock_path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { lock_file: file })),
            Err(_) => Ok(None),
        }
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
    }
}

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Install a SIGINT handler: the first Ctrl-C requests a best-effort
/// rollback of the in-flight `start` (spec §4.9 Cancellation); a second
/// forces an immediate exit.
pub fn install_signal_handler() {
    let _ = ctrlc::set_handler(move || {
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            std::process::exit(1);
        }
        SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
        eprintln!("\nshutdown requested, rolling back in-flight operation...");
    });
}

pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lock_acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("registry.lock");
        {
            let _lock = RegistryLock::acquire(&lock_path).unwrap();
            assert!(lock_path.exists());
        }
        assert!(RegistryLock::try_acquire(&lock_path).unwrap().is_some());
    }

    #[test]
    fn instance_lock_try_acquire_returns_none_when_held() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("myapp.lock");
        let _lock = InstanceLock::acquire(&lock_path).unwrap();
        assert!(InstanceLock::try_acquire(&lock_path).unwrap().is_none());
    }

    #[test]
    fn instance_lock_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("myapp.lock");
        {
            let _lock = InstanceLock::acquire(&lock_path).unwrap();
        }
        assert!(InstanceLock::try_acquire(&lock_path).unwrap().is_some());
    }

    #[test]
    fn distinct_instance_locks_do_not_interfere() {
        let dir = tempfile::tempdir().unwrap();
        let a = InstanceLock::acquire(&dir.path().join("a.lock")).unwrap();
        let b = InstanceLock::acquire(&dir.path().join("b.lock")).unwrap();
        drop(a);
        drop(b);
    }
}

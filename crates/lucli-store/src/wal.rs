use crate::layout::StoreLayout;
use crate::metadata::{InstanceMetadata, InstanceState, InstanceStore};
use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

fn parse_instance_state(s: &str) -> Option<InstanceState> {
    match s {
        "Absent" | "absent" => Some(InstanceState::Absent),
        "ProvisionedStopped" | "provisioned-stopped" => Some(InstanceState::ProvisionedStopped),
        "Starting" | "starting" => Some(InstanceState::Starting),
        "Running" | "running" => Some(InstanceState::Running),
        "Stopping" | "stopping" => Some(InstanceState::Stopping),
        "Failed" | "failed" => Some(InstanceState::Failed),
        "Orphaned" | "orphaned" => Some(InstanceState::Orphaned),
        _ => None,
    }
}

/// A single rollback step that can undo part of an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RollbackStep {
    /// Remove a directory tree (e.g. a half-materialized instance config dir).
    RemoveDir(PathBuf),
    /// Remove a single file (e.g. metadata, a partially-written lock file).
    RemoveFile(PathBuf),
    /// Reset an instance's metadata state (e.g. Starting → Failed after crash).
    ResetState {
        name: String,
        target_state: String,
    },
}

/// The type of mutating operation being tracked (spec §2's control flow steps).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WalOpKind {
    Materialize,
    InstallDeps,
    Start,
    Stop,
    Prune,
    Destroy,
}

impl std::fmt::Display for WalOpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalOpKind::Materialize => write!(f, "materialize"),
            WalOpKind::InstallDeps => write!(f, "install-deps"),
            WalOpKind::Start => write!(f, "start"),
            WalOpKind::Stop => write!(f, "stop"),
            WalOpKind::Prune => write!(f, "prune"),
            WalOpKind::Destroy => write!(f, "destroy"),
        }
    }
}

/// A WAL entry representing an in-flight operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry {
    pub op_id: String,
    pub kind: WalOpKind,
    pub instance_name: String,
    pub timestamp: String,
    pub rollback_steps: Vec<RollbackStep>,
}

/// Write-ahead log for crash recovery.
///
/// Mutating `Engine` methods create a WAL entry before starting work,
/// append rollback steps as side effects occur, and remove the entry on
/// successful completion. On startup, incomplete entries are rolled back.
pub struct WriteAheadLog {
    wal_dir: PathBuf,
}

impl WriteAheadLog {
    pub fn new(layout: &StoreLayout) -> Self {
        let wal_dir = layout.root().join("store").join("wal");
        Self { wal_dir }
    }

    /// Ensure the WAL directory exists.
    pub fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.wal_dir)?;
        Ok(())
    }

    /// Begin a new WAL entry for an operation. Returns the op_id.
    pub fn begin(&self, kind: WalOpKind, instance_name: &str) -> Result<String, StoreError> {
        let op_id = format!(
            "{}-{}",
            chrono::Utc::now().format("%Y%m%d%H%M%S%3f"),
            &blake3::hash(instance_name.as_bytes()).to_hex()[..8]
        );
        let entry = WalEntry {
            op_id: op_id.clone(),
            kind,
            instance_name: instance_name.to_owned(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            rollback_steps: Vec::new(),
        };
        self.write_entry(&entry)?;
        debug!(
            "WAL begin: {} for {instance_name} (op_id={op_id})",
            entry.kind
        );
        Ok(op_id)
    }

    /// Append a rollback step to an existing WAL entry.
    pub fn add_rollback_step(&self, op_id: &str, step: RollbackStep) -> Result<(), StoreError> {
        let mut entry = self.read_entry(op_id)?;
        entry.rollback_steps.push(step);
        self.write_entry(&entry)?;
        Ok(())
    }

    /// Commit (remove) a WAL entry after successful completion.
    pub fn commit(&self, op_id: &str) -> Result<(), StoreError> {
        let path = self.entry_path(op_id);
        if path.exists() {
            fs::remove_file(&path)?;
            debug!("WAL commit: {op_id}");
        }
        Ok(())
    }

    /// List all incomplete WAL entries.
    pub fn list_incomplete(&self) -> Result<Vec<WalEntry>, StoreError> {
        if !self.wal_dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for dir_entry in fs::read_dir(&self.wal_dir)? {
            let dir_entry = dir_entry?;
            let path = dir_entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                match fs::read_to_string(&path) {
                    Ok(content) => match serde_json::from_str::<WalEntry>(&content) {
                        Ok(entry) => entries.push(entry),
                        Err(e) => {
                            warn!("corrupt WAL entry {}: {e}", path.display());
                            let _ = fs::remove_file(&path);
                        }
                    },
                    Err(e) => {
                        warn!("unreadable WAL entry {}: {e}", path.display());
                        let _ = fs::remove_file(&path);
                    }
                }
            }
        }
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(entries)
    }

    /// Roll back all incomplete WAL entries.
    /// Returns the number of entries rolled back.
    pub fn recover(&self) -> Result<usize, StoreError> {
        let entries = self.list_incomplete()?;
        let count = entries.len();
        for entry in &entries {
            info!(
                "WAL recovery: rolling back {} on {} (op_id={})",
                entry.kind, entry.instance_name, entry.op_id
            );
            self.rollback_entry(entry);
            let _ = fs::remove_file(self.entry_path(&entry.op_id));
        }
        if count > 0 {
            info!("WAL recovery complete: {count} entries rolled back");
        }
        Ok(count)
    }

    fn rollback_entry(&self, entry: &WalEntry) {
        for step in entry.rollback_steps.iter().rev() {
            match step {
                RollbackStep::RemoveDir(path) => {
                    if path.exists() {
                        if let Err(e) = fs::remove_dir_all(path) {
                            warn!("WAL rollback: failed to remove dir {}: {e}", path.display());
                        } else {
                            debug!("WAL rollback: removed dir {}", path.display());
                        }
                    }
                }
                RollbackStep::RemoveFile(path) => {
                    if path.exists() {
                        if let Err(e) = fs::remove_file(path) {
                            warn!(
                                "WAL rollback: failed to remove file {}: {e}",
                                path.display()
                            );
                        } else {
                            debug!("WAL rollback: removed file {}", path.display());
                        }
                    }
                }
                RollbackStep::ResetState { name, target_state } => {
                    let Some(new_state) = parse_instance_state(target_state) else {
                        warn!("WAL rollback: unknown target state '{target_state}' for {name}");
                        continue;
                    };

                    // wal_dir = <root>/store/wal
                    let Some(store_dir) = self.wal_dir.parent() else {
                        continue;
                    };
                    let Some(root_dir) = store_dir.parent() else {
                        continue;
                    };

                    let meta_path = store_dir.join("metadata").join(name);
                    if !meta_path.exists() {
                        continue;
                    }

                    let content = match fs::read_to_string(&meta_path) {
                        Ok(c) => c,
                        Err(e) => {
                            warn!("WAL rollback: failed to read metadata for {name}: {e}");
                            continue;
                        }
                    };

                    let mut meta: InstanceMetadata = match serde_json::from_str(&content) {
                        Ok(m) => m,
                        Err(e) => {
                            warn!("WAL rollback: failed to parse metadata for {name}: {e}");
                            continue;
                        }
                    };

                    meta.state = new_state;
                    meta.updated_at = chrono::Utc::now().to_rfc3339();
                    meta.checksum = None;

                    let layout = StoreLayout::new(root_dir);
                    let meta_store = InstanceStore::new(layout);
                    if let Err(e) = meta_store.put(&meta) {
                        warn!("WAL rollback: failed to persist metadata for {name}: {e}");
                    } else {
                        debug!("WAL rollback: reset {name} state to {target_state}");
                    }
                }
            }
        }
    }

    fn entry_path(&self, op_id: &str) -> PathBuf {
        self.wal_dir.join(format!("{op_id}.json"))
    }

    fn write_entry(&self, entry: &WalEntry) -> Result<(), StoreError> {
        fs::create_dir_all(&self.wal_dir)?;
        let content = serde_json::to_string_pretty(entry)?;
        let mut tmp = NamedTempFile::new_in(&self.wal_dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        let dest = self.entry_path(&entry.op_id);
        tmp.persist(&dest).map_err(|e| StoreError::Io(e.error))?;
        crate::fsync_dir(&self.wal_dir)?;
        Ok(())
    }

    fn read_entry(&self, op_id: &str) -> Result<WalEntry, StoreError> {
        let path = self.entry_path(op_id);
        let content = fs::read_to_string(&path)?;
        let entry: WalEntry = serde_json::from_str(&content)?;
        Ok(entry)
    }
}

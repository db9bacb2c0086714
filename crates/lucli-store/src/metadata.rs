use crate::layout::StoreLayout;
use crate::{fsync_dir, StoreError};
use lucli_schema::validate_instance_name as schema_validate_instance_name;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;

/// The seven lifecycle states an instance can occupy (spec §3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum InstanceState {
    Absent,
    ProvisionedStopped,
    Starting,
    Running,
    Stopping,
    Failed,
    Orphaned,
}

impl InstanceState {
    /// Whether `self -> next` is a legal transition under the spec §3 state machine.
    pub fn can_transition_to(self, next: InstanceState) -> bool {
        use InstanceState::*;
        matches!(
            (self, next),
            (Absent, ProvisionedStopped)
                | (ProvisionedStopped, Starting)
                | (Starting, Running)
                | (Starting, Failed)
                | (Running, Stopping)
                | (Running, Orphaned)
                | (Stopping, ProvisionedStopped)
                | (Stopping, Failed)
                | (Failed, ProvisionedStopped)
                | (Failed, Starting)
                | (Orphaned, ProvisionedStopped)
                | (Orphaned, Running)
                | (ProvisionedStopped, Absent)
        )
    }
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceState::Absent => write!(f, "absent"),
            InstanceState::ProvisionedStopped => write!(f, "provisioned-stopped"),
            InstanceState::Starting => write!(f, "starting"),
            InstanceState::Running => write!(f, "running"),
            InstanceState::Stopping => write!(f, "stopping"),
            InstanceState::Failed => write!(f, "failed"),
            InstanceState::Orphaned => write!(f, "orphaned"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceMetadata {
    pub name: String,
    #[serde(default)]
    pub env_tag: Option<String>,
    pub state: InstanceState,
    pub manifest_hash: String,
    pub project_dir: String,
    pub runtime_type: String,
    pub pid: Option<u32>,
    pub port: Option<u16>,
    pub created_at: String,
    pub updated_at: String,
    /// blake3 checksum for integrity verification. `None` for legacy metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl InstanceMetadata {
    /// Compute the checksum over the metadata content (excluding the checksum field itself).
    fn compute_checksum(&self) -> Result<String, StoreError> {
        let mut copy = self.clone();
        copy.checksum = None;
        let json = serde_json::to_string_pretty(&copy)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

pub fn validate_instance_name(name: &str) -> Result<(), StoreError> {
    if !schema_validate_instance_name(name) {
        return Err(StoreError::InvalidName(
            "instance name must be 1-64 characters matching [a-zA-Z0-9_-]".to_owned(),
        ));
    }
    Ok(())
}

pub struct InstanceStore {
    layout: StoreLayout,
}

impl InstanceStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    pub fn put(&self, meta: &InstanceMetadata) -> Result<(), StoreError> {
        let dest = self.layout.metadata_dir().join(&meta.name);

        let mut meta_with_checksum = meta.clone();
        meta_with_checksum.checksum = Some(meta_with_checksum.compute_checksum()?);
        let content = serde_json::to_string_pretty(&meta_with_checksum)?;

        let dir = self.layout.metadata_dir();
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&dest).map_err(|e| StoreError::Io(e.error))?;
        fsync_dir(&dir)?;

        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<InstanceMetadata, StoreError> {
        let path = self.layout.metadata_dir().join(name);
        if !path.exists() {
            return Err(StoreError::InstanceNotFound(name.to_owned()));
        }
        let content = fs::read_to_string(&path)?;
        let meta: InstanceMetadata = serde_json::from_str(&content)?;

        if let Some(ref expected) = meta.checksum {
            let actual = meta.compute_checksum()?;
            if actual != *expected {
                return Err(StoreError::IntegrityFailure {
                    hash: name.to_owned(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        Ok(meta)
    }

    /// Transition `name` to `new_state`, rejecting moves the spec §3 state
    /// machine forbids.
    pub fn transition(&self, name: &str, new_state: InstanceState) -> Result<(), StoreError> {
        let mut meta = self.get(name)?;
        if !meta.state.can_transition_to(new_state) {
            return Err(StoreError::IllegalTransition {
                name: name.to_owned(),
                from: meta.state.to_string(),
                to: new_state.to_string(),
            });
        }
        meta.state = new_state;
        meta.updated_at = chrono::Utc::now().to_rfc3339();
        self.put(&meta)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.layout.metadata_dir().join(name).exists()
    }

    pub fn remove(&self, name: &str) -> Result<(), StoreError> {
        let path = self.layout.metadata_dir().join(name);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<InstanceMetadata>, StoreError> {
        let dir = self.layout.metadata_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut results = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let name = entry.file_name();
                let name_str = name.to_str().unwrap_or("");
                if !name_str.starts_with('.') {
                    match self.get(name_str) {
                        Ok(meta) => results.push(meta),
                        Err(e) => {
                            tracing::warn!("skipping corrupted metadata entry '{name_str}': {e}");
                        }
                    }
                }
            }
        }
        results.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(results)
    }

    /// Like `list()`, but returns per-entry `Result`s so callers (e.g. the
    /// CLI's `status`/diagnostic path) can surface individual corruption
    /// errors instead of silently skipping them.
    #[allow(clippy::type_complexity)]
    pub fn list_with_errors(
        &self,
    ) -> Result<Vec<Result<InstanceMetadata, (String, StoreError)>>, StoreError> {
        let dir = self.layout.metadata_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut results = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let name = entry.file_name();
                let name_str = name.to_str().unwrap_or("").to_owned();
                if !name_str.starts_with('.') {
                    match self.get(&name_str) {
                        Ok(meta) => results.push(Ok(meta)),
                        Err(e) => results.push(Err((name_str, e))),
                    }
                }
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_instance_store() -> (tempfile::TempDir, InstanceStore) {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize().unwrap();
        (dir, InstanceStore::new(layout))
    }

    fn sample_meta() -> InstanceMetadata {
        InstanceMetadata {
            name: "myapp".to_owned(),
            env_tag: None,
            state: InstanceState::Absent,
            manifest_hash: "mhash".to_owned(),
            project_dir: "/srv/myapp".to_owned(),
            runtime_type: "embedded".to_owned(),
            pid: None,
            port: None,
            created_at: "2025-01-01T00:00:00Z".to_owned(),
            updated_at: "2025-01-01T00:00:00Z".to_owned(),
            checksum: None,
        }
    }

    #[test]
    fn metadata_roundtrip() {
        let (_dir, store) = test_instance_store();
        let meta = sample_meta();
        store.put(&meta).unwrap();
        let retrieved = store.get(&meta.name).unwrap();
        assert_eq!(meta.name, retrieved.name);
        assert_eq!(meta.state, retrieved.state);
        assert!(retrieved.checksum.is_some(), "put() must embed a checksum");
    }

    #[test]
    fn legal_transition_succeeds() {
        let (_dir, store) = test_instance_store();
        let mut meta = sample_meta();
        meta.state = InstanceState::ProvisionedStopped;
        store.put(&meta).unwrap();
        store
            .transition("myapp", InstanceState::Starting)
            .unwrap();
        assert_eq!(store.get("myapp").unwrap().state, InstanceState::Starting);
    }

    #[test]
    fn illegal_transition_rejected() {
        let (_dir, store) = test_instance_store();
        store.put(&sample_meta()).unwrap(); // Absent
        assert!(matches!(
            store.transition("myapp", InstanceState::Running),
            Err(StoreError::IllegalTransition { .. })
        ));
    }

    #[test]
    fn list_metadata() {
        let (_dir, store) = test_instance_store();
        store.put(&sample_meta()).unwrap();
        let list = store.list().unwrap();
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn exists_returns_true_for_known() {
        let (_dir, store) = test_instance_store();
        store.put(&sample_meta()).unwrap();
        assert!(store.exists("myapp"));
    }

    #[test]
    fn exists_returns_false_for_unknown() {
        let (_dir, store) = test_instance_store();
        assert!(!store.exists("unknown"));
    }

    #[test]
    fn remove_deletes_metadata() {
        let (_dir, store) = test_instance_store();
        store.put(&sample_meta()).unwrap();
        store.remove("myapp").unwrap();
        assert!(!store.exists("myapp"));
    }

    #[test]
    fn get_nonexistent_fails() {
        let (_dir, store) = test_instance_store();
        assert!(store.get("nonexistent").is_err());
    }

    #[test]
    fn validate_instance_name_valid_chars() {
        assert!(validate_instance_name("my-app_123").is_ok());
        assert!(validate_instance_name("a").is_ok());
        assert!(validate_instance_name(&"x".repeat(64)).is_ok());
    }

    #[test]
    fn validate_instance_name_rejects_bad_input() {
        assert!(validate_instance_name("").is_err());
        assert!(validate_instance_name(&"x".repeat(65)).is_err());
        assert!(validate_instance_name("has space").is_err());
        assert!(validate_instance_name("has/slash").is_err());
    }

    #[test]
    fn list_empty_store() {
        let (_dir, store) = test_instance_store();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn list_multiple_instances() {
        let (_dir, store) = test_instance_store();
        let mut m1 = sample_meta();
        m1.name = "app1".to_owned();
        store.put(&m1).unwrap();

        let mut m2 = sample_meta();
        m2.name = "app2".to_owned();
        store.put(&m2).unwrap();

        let list = store.list().unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn list_warns_on_corruption() {
        let (dir, store) = test_instance_store();
        store.put(&sample_meta()).unwrap();

        let corrupt_path = StoreLayout::new(dir.path())
            .metadata_dir()
            .join("corrupt_instance");
        fs::write(&corrupt_path, "NOT VALID JSON").unwrap();

        let list = store.list().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "myapp");
    }

    #[test]
    fn list_with_errors_surfaces_corruption() {
        let (dir, store) = test_instance_store();
        store.put(&sample_meta()).unwrap();

        let corrupt_path = StoreLayout::new(dir.path())
            .metadata_dir()
            .join("corrupt_instance");
        fs::write(&corrupt_path, "GARBAGE").unwrap();

        let results = store.list_with_errors().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
    }

    #[test]
    fn backward_compat_no_checksum_field() {
        let (_dir, store) = test_instance_store();
        let json = r#"{
            "name": "legacy",
            "state": "Absent",
            "manifest_hash": "mh",
            "project_dir": "/srv/legacy",
            "runtime_type": "embedded",
            "pid": null,
            "port": null,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        }"#;
        let dir = store.layout.metadata_dir();
        fs::write(dir.join("legacy"), json).unwrap();
        let meta = store.get("legacy").unwrap();
        assert_eq!(meta.name, "legacy");
        assert!(meta.checksum.is_none());
    }
}

use crate::layout::StoreLayout;
use crate::metadata::InstanceStore;
use crate::objects::ContentCache;
use crate::StoreError;

#[derive(Debug, Default)]
pub struct IntegrityReport {
    pub checked: usize,
    pub passed: usize,
    pub failed: Vec<IntegrityFailure>,
    pub metadata_checked: usize,
    pub metadata_passed: usize,
}

#[derive(Debug)]
pub struct IntegrityFailure {
    pub hash: String,
    pub reason: String,
}

/// Verify the content cache (blake3 content-addressed) and instance metadata
/// (embedded checksum) for silent on-disk corruption.
pub fn verify_store_integrity(layout: &StoreLayout) -> Result<IntegrityReport, StoreError> {
    let cache = ContentCache::new(layout.clone());
    let meta_store = InstanceStore::new(layout.clone());

    let all_entries = cache.list()?;
    let all_meta = meta_store.list()?;

    let mut report = IntegrityReport {
        checked: all_entries.len(),
        metadata_checked: all_meta.len(),
        ..Default::default()
    };

    for hash in &all_entries {
        match cache.get(hash) {
            Ok(_) => report.passed += 1,
            Err(StoreError::IntegrityFailure { actual, .. }) => {
                report.failed.push(IntegrityFailure {
                    hash: hash.clone(),
                    reason: format!("cache entry hash mismatch: got {actual}"),
                });
            }
            Err(e) => {
                report.failed.push(IntegrityFailure {
                    hash: hash.clone(),
                    reason: format!("cache entry read error: {e}"),
                });
            }
        }
    }

    for meta in &all_meta {
        match meta_store.get(&meta.name) {
            Ok(_) => report.metadata_passed += 1,
            Err(StoreError::IntegrityFailure { actual, .. }) => {
                report.failed.push(IntegrityFailure {
                    hash: meta.name.clone(),
                    reason: format!("metadata checksum mismatch: got {actual}"),
                });
            }
            Err(e) => {
                report.failed.push(IntegrityFailure {
                    hash: meta.name.clone(),
                    reason: format!("metadata read error: {e}"),
                });
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_store_passes_integrity() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize().unwrap();

        let cache = ContentCache::new(layout.clone());
        cache.put(b"data1").unwrap();
        cache.put(b"data2").unwrap();

        let report = verify_store_integrity(&layout).unwrap();
        assert_eq!(report.checked, 2);
        assert_eq!(report.passed, 2);
        assert!(report.failed.is_empty());
    }

    #[test]
    fn corrupted_entry_detected() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize().unwrap();

        let cache = ContentCache::new(layout.clone());
        let hash = cache.put(b"original").unwrap();

        std::fs::write(layout.cache_dir().join(&hash), b"corrupted").unwrap();

        let report = verify_store_integrity(&layout).unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].hash, hash);
    }

    #[test]
    fn verify_store_checks_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize().unwrap();

        let meta_store = InstanceStore::new(layout.clone());
        let meta = crate::InstanceMetadata {
            name: "test_instance".to_owned(),
            env_tag: None,
            state: crate::InstanceState::ProvisionedStopped,
            manifest_hash: "mhash".to_owned(),
            project_dir: "/srv/test".to_owned(),
            runtime_type: "embedded".to_owned(),
            pid: None,
            port: None,
            created_at: "2025-01-01T00:00:00Z".to_owned(),
            updated_at: "2025-01-01T00:00:00Z".to_owned(),
            checksum: None,
        };
        meta_store.put(&meta).unwrap();

        let report = verify_store_integrity(&layout).unwrap();
        assert_eq!(report.metadata_checked, 1);
        assert_eq!(report.metadata_passed, 1);
    }

    #[test]
    fn empty_store_passes() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize().unwrap();

        let report = verify_store_integrity(&layout).unwrap();
        assert_eq!(report.checked, 0);
        assert_eq!(report.metadata_checked, 0);
        assert!(report.failed.is_empty());
    }
}

use crate::layout::StoreLayout;
use crate::metadata::{InstanceState, InstanceStore};
use crate::objects::ContentCache;
use crate::StoreError;
use std::collections::HashSet;
use std::fs;

/// Implements `lucli server prune` (spec §4.4): removes provisioned-but-stopped
/// instances (optionally filtered by age or name) and any cached engine/dependency
/// artifacts no longer referenced by a remaining instance.
pub struct Pruner {
    layout: StoreLayout,
}

#[derive(Debug, Default)]
pub struct PruneReport {
    pub prunable_instances: Vec<String>,
    pub removed_instances: usize,
    pub orphaned_cache_entries: Vec<String>,
    pub removed_cache_entries: usize,
}

impl Pruner {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    pub fn collect(&self, dry_run: bool) -> Result<PruneReport, StoreError> {
        self.collect_with_selector(dry_run, || false, |_| true)
    }

    /// `selector` decides which `ProvisionedStopped` instances are eligible
    /// (e.g. a name filter or an age cutoff computed by the caller).
    pub fn collect_with_selector(
        &self,
        dry_run: bool,
        should_stop: impl Fn() -> bool,
        selector: impl Fn(&crate::metadata::InstanceMetadata) -> bool,
    ) -> Result<PruneReport, StoreError> {
        let meta_store = InstanceStore::new(self.layout.clone());
        let cache = ContentCache::new(self.layout.clone());

        let mut report = PruneReport::default();
        let all_meta = meta_store.list()?;

        let mut live_manifest_hashes: HashSet<String> = HashSet::new();
        for meta in &all_meta {
            let eligible = meta.state == InstanceState::ProvisionedStopped && selector(meta);
            if eligible {
                report.prunable_instances.push(meta.name.clone());
            } else {
                live_manifest_hashes.insert(meta.manifest_hash.clone());
            }
        }

        let all_cache_entries = cache.list()?;
        for hash in &all_cache_entries {
            if !live_manifest_hashes.contains(hash) {
                report.orphaned_cache_entries.push(hash.clone());
            }
        }

        if !dry_run {
            for name in &report.prunable_instances {
                if should_stop() {
                    break;
                }
                let instance_path = self.layout.instance_dir(name);
                if instance_path.exists() {
                    fs::remove_dir_all(&instance_path)?;
                }
                meta_store.remove(name)?;
                report.removed_instances += 1;
            }

            for hash in &report.orphaned_cache_entries {
                if should_stop() {
                    break;
                }
                cache.remove(hash)?;
                report.removed_cache_entries += 1;
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::InstanceMetadata;

    fn setup() -> (tempfile::TempDir, StoreLayout) {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize().unwrap();
        (dir, layout)
    }

    fn meta(name: &str, state: InstanceState, manifest_hash: &str) -> InstanceMetadata {
        InstanceMetadata {
            name: name.to_owned(),
            env_tag: None,
            state,
            manifest_hash: manifest_hash.to_owned(),
            project_dir: format!("/srv/{name}"),
            runtime_type: "embedded".to_owned(),
            pid: None,
            port: None,
            created_at: "2025-01-01T00:00:00Z".to_owned(),
            updated_at: "2025-01-01T00:00:00Z".to_owned(),
            checksum: None,
        }
    }

    #[test]
    fn prune_removes_provisioned_stopped_instances() {
        let (_dir, layout) = setup();
        let meta_store = InstanceStore::new(layout.clone());
        meta_store
            .put(&meta("stale", InstanceState::ProvisionedStopped, "mhash"))
            .unwrap();

        let pruner = Pruner::new(layout);
        let report = pruner.collect(false).unwrap();
        assert_eq!(report.removed_instances, 1);
    }

    #[test]
    fn prune_dry_run_does_not_remove() {
        let (_dir, layout) = setup();
        let meta_store = InstanceStore::new(layout.clone());
        meta_store
            .put(&meta("stale", InstanceState::ProvisionedStopped, "mhash"))
            .unwrap();

        let pruner = Pruner::new(layout.clone());
        let report = pruner.collect(true).unwrap();
        assert_eq!(report.prunable_instances.len(), 1);
        assert_eq!(report.removed_instances, 0);
        assert!(meta_store.exists("stale"));
    }

    #[test]
    fn prune_preserves_running_instances() {
        let (_dir, layout) = setup();
        let meta_store = InstanceStore::new(layout.clone());
        meta_store
            .put(&meta("active", InstanceState::Running, "mhash"))
            .unwrap();

        let pruner = Pruner::new(layout);
        let report = pruner.collect(false).unwrap();
        assert_eq!(report.removed_instances, 0);
        assert!(report.prunable_instances.is_empty());
    }

    #[test]
    fn prune_preserves_failed_instances() {
        let (_dir, layout) = setup();
        let meta_store = InstanceStore::new(layout.clone());
        meta_store
            .put(&meta("broken", InstanceState::Failed, "mhash"))
            .unwrap();

        let pruner = Pruner::new(layout);
        let report = pruner.collect(false).unwrap();
        assert_eq!(report.removed_instances, 0, "only provisioned-stopped instances are prunable");
    }

    #[test]
    fn prune_removes_orphaned_cache_entries() {
        let (_dir, layout) = setup();
        let cache = ContentCache::new(layout.clone());
        let hash = cache.put(b"unused-dependency-archive").unwrap();

        let pruner = Pruner::new(layout.clone());
        let report = pruner.collect(false).unwrap();
        assert_eq!(report.removed_cache_entries, 1);
        assert!(!cache.exists(&hash));
    }

    #[test]
    fn prune_preserves_cache_entries_referenced_by_live_instance() {
        let (_dir, layout) = setup();
        let cache = ContentCache::new(layout.clone());
        let hash = cache.put(b"manifest-bytes").unwrap();

        let meta_store = InstanceStore::new(layout.clone());
        meta_store
            .put(&meta("active", InstanceState::Running, &hash))
            .unwrap();

        let pruner = Pruner::new(layout);
        let report = pruner.collect(false).unwrap();
        assert!(report.orphaned_cache_entries.is_empty());
        assert!(cache.exists(&hash));
    }

    #[test]
    fn selector_can_narrow_to_a_single_name() {
        let (_dir, layout) = setup();
        let meta_store = InstanceStore::new(layout.clone());
        meta_store
            .put(&meta("keep-me", InstanceState::ProvisionedStopped, "h1"))
            .unwrap();
        meta_store
            .put(&meta("drop-me", InstanceState::ProvisionedStopped, "h2"))
            .unwrap();

        let pruner = Pruner::new(layout.clone());
        let report = pruner
            .collect_with_selector(false, || false, |m| m.name == "drop-me")
            .unwrap();
        assert_eq!(report.removed_instances, 1);
        assert!(meta_store.exists("keep-me"));
        assert!(!meta_store.exists("drop-me"));
    }
}

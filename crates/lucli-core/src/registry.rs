//! InstanceRegistry (spec §4.4, C4): locate/create/enumerate instance
//! directories, enforce naming and the one-running-server-per-project rule.
//!
//! Grounded in [`lucli_store::InstanceStore`] for the persisted inventory
//! and [`crate::concurrency::RegistryLock`] for the brief whole-home lock
//! spec §4.9 describes ("take the registry lock only briefly — name
//! reservation, enumeration").

use crate::concurrency::RegistryLock;
use crate::CoreError;
use lucli_store::{InstanceMetadata, InstanceState, InstanceStore, StoreLayout};
use std::path::{Path, PathBuf};

/// A view of one instance as the registry sees it, used by `list`/`status`.
#[derive(Debug, Clone)]
pub struct InstanceView {
    pub name: String,
    pub env_tag: Option<String>,
    pub state: InstanceState,
    pub pid: Option<u32>,
    pub port: Option<u16>,
    pub project_dir: String,
    pub runtime_type: String,
    pub sandbox: bool,
}

/// Result of [`InstanceRegistry::reserve`]: the persisted identity a
/// `start` should continue with.
pub struct ReserveOutcome {
    pub metadata: InstanceMetadata,
    pub instance_dir: PathBuf,
    pub freshly_created: bool,
}

pub struct InstanceRegistry {
    layout: StoreLayout,
    store: InstanceStore,
}

impl InstanceRegistry {
    pub fn new(layout: StoreLayout) -> Self {
        let store = InstanceStore::new(layout.clone());
        Self { layout, store }
    }

    fn sandbox_marker(&self, name: &str) -> PathBuf {
        self.layout.instance_dir(name).join(".sandbox")
    }

    fn environment_marker(&self, name: &str) -> PathBuf {
        self.layout.instance_dir(name).join(".environment")
    }

    pub fn is_sandbox(&self, name: &str) -> bool {
        self.sandbox_marker(name).exists()
    }

    /// Resolution order (spec §4.4): explicit `--name`, else `manifest.name`,
    /// else the basename of `project_dir`. If the chosen name already
    /// belongs to a *different* project and `force` is not set, fails with
    /// `NameConflict` and a disambiguated suggestion.
    pub fn resolve_name(
        &self,
        project_dir: &Path,
        manifest_name: Option<&str>,
        explicit_name: Option<&str>,
        force: bool,
    ) -> Result<String, CoreError> {
        let candidate = if let Some(n) = explicit_name.filter(|s| !s.is_empty()) {
            n.to_owned()
        } else if let Some(n) = manifest_name.filter(|s| !s.is_empty()) {
            n.to_owned()
        } else {
            project_dir
                .file_name()
                .and_then(|s| s.to_str())
                .map(str::to_owned)
                .ok_or_else(|| {
                    CoreError::NameConflict(
                        "could not derive an instance name from the project directory".to_owned(),
                    )
                })?
        };

        if !lucli_schema::validate_instance_name(&candidate) {
            return Err(CoreError::NameConflict(format!(
                "'{candidate}' is not a valid instance name (1-64 chars, [a-zA-Z0-9_-])"
            )));
        }

        if let Ok(existing) = self.store.get(&candidate) {
            let requested = lossy_canonical(project_dir);
            if existing.project_dir != requested && !force {
                let suggestion = self.suggest_name(&candidate);
                return Err(CoreError::NameConflict(format!(
                    "instance '{candidate}' already belongs to project '{}'; \
                     retry with --name={suggestion} or --force",
                    existing.project_dir
                )));
            }
        }

        Ok(candidate)
    }

    fn suggest_name(&self, base: &str) -> String {
        for n in 2..1000 {
            let candidate = format!("{base}-{n}");
            if !self.store.exists(&candidate) {
                return candidate;
            }
        }
        format!("{base}-{}", std::process::id())
    }

    /// Take the registry lock, enforce one-running-non-sandbox-instance-
    /// per-project, and persist (or refresh) the instance's metadata entry.
    /// Does not itself start anything; `start` continues from the returned
    /// instance directory under an `InstanceLock`.
    pub fn reserve(
        &self,
        name: &str,
        project_dir: &Path,
        manifest_hash: &str,
        runtime_type: &str,
        sandbox: bool,
        env_tag: Option<&str>,
    ) -> Result<ReserveOutcome, CoreError> {
        let _registry_lock = RegistryLock::acquire(&self.layout.lock_file())?;
        let project_dir_str = lossy_canonical(project_dir);

        if !sandbox {
            for meta in self.store.list()? {
                if meta.name != name
                    && meta.project_dir == project_dir_str
                    && !self.is_sandbox(&meta.name)
                    && matches!(
                        meta.state,
                        InstanceState::Starting | InstanceState::Running
                    )
                {
                    return Err(CoreError::InstanceBusy(format!(
                        "project already has a running instance '{}'",
                        meta.name
                    )));
                }
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        let (metadata, freshly_created) = match self.store.get(name) {
            Ok(mut existing) => {
                existing.manifest_hash = manifest_hash.to_owned();
                existing.project_dir = project_dir_str;
                existing.runtime_type = runtime_type.to_owned();
                existing.updated_at = now;
                (existing, false)
            }
            Err(_) => (
                InstanceMetadata {
                    name: name.to_owned(),
                    env_tag: env_tag.map(str::to_owned),
                    state: InstanceState::Absent,
                    manifest_hash: manifest_hash.to_owned(),
                    project_dir: project_dir_str,
                    runtime_type: runtime_type.to_owned(),
                    pid: None,
                    port: None,
                    created_at: now.clone(),
                    updated_at: now,
                    checksum: None,
                },
                true,
            ),
        };
        self.store.put(&metadata)?;

        let instance_dir = self.layout.instance_dir(name);
        std::fs::create_dir_all(&instance_dir)?;
        if sandbox {
            std::fs::write(self.sandbox_marker(name), b"")?;
        }
        if let Some(tag) = env_tag {
            std::fs::write(self.environment_marker(name), tag)?;
        } else {
            let _ = std::fs::remove_file(self.environment_marker(name));
        }

        Ok(ReserveOutcome {
            metadata,
            instance_dir,
            freshly_created,
        })
    }

    /// The instance directory for `name`, without touching the registry lock.
    pub fn instance_dir(&self, name: &str) -> PathBuf {
        self.layout.instance_dir(name)
    }

    pub fn metadata(&self, name: &str) -> Result<InstanceMetadata, CoreError> {
        Ok(self.store.get(name)?)
    }

    pub fn put_metadata(&self, meta: &InstanceMetadata) -> Result<(), CoreError> {
        Ok(self.store.put(meta)?)
    }

    pub fn transition(&self, name: &str, state: InstanceState) -> Result<(), CoreError> {
        Ok(self.store.transition(name, state)?)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.store.exists(name)
    }

    /// List all known instances (spec §4.4 `list`). Reported `state`/`pid`
    /// come from the persisted metadata as-is; liveness reconciliation
    /// (detecting `ORPHANED`) is the caller's job via `ProcessController`.
    pub fn list(&self) -> Result<Vec<InstanceView>, CoreError> {
        let mut views = Vec::new();
        for meta in self.store.list()? {
            views.push(InstanceView {
                sandbox: self.is_sandbox(&meta.name),
                name: meta.name,
                env_tag: meta.env_tag,
                state: meta.state,
                pid: meta.pid,
                port: meta.port,
                project_dir: meta.project_dir,
                runtime_type: meta.runtime_type,
            });
        }
        Ok(views)
    }

    /// Remove a `PROVISIONED_STOPPED` instance's directory and metadata
    /// entry. Selection of *which* instances to prune is the caller's job
    /// (current project, a specific name, or all); this removes exactly
    /// the one instance named.
    pub fn remove(&self, name: &str) -> Result<(), CoreError> {
        let dir = self.layout.instance_dir(name);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        self.store.remove(name)?;
        Ok(())
    }
}

fn lossy_canonical(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lucli_store::StoreLayout;

    fn registry() -> (tempfile::TempDir, InstanceRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize().unwrap();
        (dir, InstanceRegistry::new(layout))
    }

    #[test]
    fn resolve_name_falls_back_to_project_basename() {
        let (_dir, reg) = registry();
        let name = reg
            .resolve_name(Path::new("/tmp/projects/my-app"), None, None, false)
            .unwrap();
        assert_eq!(name, "my-app");
    }

    #[test]
    fn resolve_name_prefers_explicit_over_manifest() {
        let (_dir, reg) = registry();
        let name = reg
            .resolve_name(Path::new("/tmp/whatever"), Some("from-manifest"), Some("explicit"), false)
            .unwrap();
        assert_eq!(name, "explicit");
    }

    #[test]
    fn reserve_then_conflicting_project_fails_without_force() {
        let (_dir, reg) = registry();
        let project_a = tempfile::tempdir().unwrap();
        let project_b = tempfile::tempdir().unwrap();
        reg.reserve("demo", project_a.path(), "hash-a", "embedded", false, None)
            .unwrap();

        let err = reg
            .resolve_name(project_b.path(), Some("demo"), None, false)
            .unwrap_err();
        assert!(matches!(err, CoreError::NameConflict(_)));

        // With --force the caller may still resolve to the same name; the
        // one-running-per-project check in `reserve` is independent.
        let resolved = reg
            .resolve_name(project_b.path(), Some("demo"), None, true)
            .unwrap();
        assert_eq!(resolved, "demo");
    }

    #[test]
    fn reserve_rejects_second_non_sandbox_start_for_same_project() {
        let (_dir, reg) = registry();
        let project = tempfile::tempdir().unwrap();
        let outcome = reg
            .reserve("demo", project.path(), "hash", "embedded", false, None)
            .unwrap();
        reg.transition(&outcome.metadata.name, InstanceState::ProvisionedStopped)
            .unwrap();
        reg.transition(&outcome.metadata.name, InstanceState::Starting)
            .unwrap();

        let err = reg
            .reserve("demo-2", project.path(), "hash", "embedded", false, None)
            .unwrap_err();
        assert!(matches!(err, CoreError::InstanceBusy(_)));
    }

    #[test]
    fn list_reports_sandbox_flag() {
        let (_dir, reg) = registry();
        let project = tempfile::tempdir().unwrap();
        reg.reserve("sbx", project.path(), "hash", "embedded", true, None)
            .unwrap();
        let views = reg.list().unwrap();
        assert_eq!(views.len(), 1);
        assert!(views[0].sandbox);
    }
}

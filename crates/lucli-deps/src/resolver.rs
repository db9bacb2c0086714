//! Orchestrates dependency resolution across all declared entries: computes
//! install paths, fetches from the declared source, verifies against (or
//! extends) the lock file, and returns the virtual→physical mappings C6
//! needs to wire into the engine configuration.

use crate::backoff::BackoffPolicy;
use crate::DepsError;
use lucli_runtime::security::resolve_within;
use lucli_schema::lock::{stale_install_paths, DependencyLock, LockedDependency};
use lucli_schema::manifest::{DependencyEntry, DependencySettings, DependencySource};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A dependency materialized on disk, exposed to the CFML engine as a
/// virtual mount point (spec §3: "Dependency ... a computed install path
/// ... plus an optional CFML mapping name").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMapping {
    pub name: String,
    pub virtual_path: String,
    pub physical_path: PathBuf,
}

pub struct DependencyResolver {
    /// Root the instance's dependency installs must stay inside (spec §3:
    /// "paths must not escape those roots").
    instance_root: PathBuf,
    project_dir: PathBuf,
    backoff: BackoffPolicy,
}

impl DependencyResolver {
    pub fn new(instance_root: PathBuf, project_dir: PathBuf) -> Self {
        Self {
            instance_root,
            project_dir,
            backoff: BackoffPolicy::default(),
        }
    }

    /// Resolve every dependency in `entries` against `previous_lock` (if
    /// any), returning the new lock and the virtual mappings for C6.
    /// A re-run whose computed lock matches `previous_lock` performs no I/O
    /// beyond the digest recomputation (spec §4.7: "a re-run that matches
    /// the lock is a no-op").
    pub fn ensure(
        &self,
        entries: &BTreeMap<String, DependencyEntry>,
        settings: &DependencySettings,
        previous_lock: Option<&DependencyLock>,
    ) -> Result<(DependencyLock, Vec<ResolvedMapping>), DepsError> {
        let mut locked = Vec::with_capacity(entries.len());
        let mut mappings = Vec::with_capacity(entries.len());

        for (name, entry) in entries {
            let install_path = self.install_path_for(name, entry, settings)?;

            // Fetch into a staging entry beside the final install path, not
            // the install path itself, so a digest mismatch below never
            // leaves unverified content under the instance root (spec §4.7:
            // "digest mismatch is fatal" and §8: "no partial install").
            let parent = install_path.parent().ok_or_else(|| {
                DepsError::PathEscape(format!(
                    "install path for '{name}' has no parent directory"
                ))
            })?;
            std::fs::create_dir_all(parent)?;
            let staging = tempfile::Builder::new()
                .prefix(".deps-staging-")
                .tempdir_in(parent)
                .map_err(DepsError::Io)?;
            let staged_path = staging.path().join(name);

            let resolved_ref = self.fetch_entry(name, entry, &staged_path, settings)?;
            let digest = compute_tree_digest(&staged_path)?;

            if settings.verify_integrity {
                if let Some(prev) = previous_lock.and_then(|l| l.entry(name)) {
                    if prev.install_path == install_path.to_string_lossy()
                        && prev.resolved_ref == resolved_ref
                        && prev.digest != digest
                    {
                        // `staging` drops here, removing the unverified
                        // content; `install_path` was never touched.
                        return Err(DepsError::IntegrityFailed {
                            name: name.clone(),
                            expected: prev.digest.clone(),
                            actual: digest,
                        });
                    }
                }
            }

            let _ = std::fs::remove_file(&install_path);
            let _ = std::fs::remove_dir_all(&install_path);
            std::fs::rename(&staged_path, &install_path)?;
            drop(staging);

            locked.push(LockedDependency {
                name: name.clone(),
                resolved_ref,
                digest,
                install_path: install_path.to_string_lossy().into_owned(),
                mapping: entry.mapping.clone(),
            });

            if let Some(mapping) = &entry.mapping {
                mappings.push(ResolvedMapping {
                    name: name.clone(),
                    virtual_path: normalize_virtual_path(mapping),
                    physical_path: install_path,
                });
            }
        }

        let new_lock = DependencyLock::new(locked);

        if settings.prune_on_install {
            if let Some(prev) = previous_lock {
                for stale in stale_install_paths(prev, &new_lock) {
                    let _ = std::fs::remove_dir_all(&stale);
                    let _ = std::fs::remove_file(&stale);
                }
            }
        }

        Ok((new_lock, mappings))
    }

    fn install_path_for(
        &self,
        name: &str,
        entry: &DependencyEntry,
        settings: &DependencySettings,
    ) -> Result<PathBuf, DepsError> {
        let relative = entry
            .install_path
            .clone()
            .unwrap_or_else(|| format!("dependencies/{name}"));

        let base = match &settings.install_location {
            Some(custom) => self.project_dir.join(custom),
            None => self.instance_root.clone(),
        };
        let candidate = base.join(&relative);

        let guard_root = if settings.install_location.is_some() {
            &self.project_dir
        } else {
            &self.instance_root
        };

        resolve_within(
            &guard_root.to_string_lossy(),
            &candidate.to_string_lossy(),
        )
        .map_err(|e| DepsError::PathEscape(e.to_string()))?;

        Ok(candidate)
    }

    fn fetch_entry(
        &self,
        name: &str,
        entry: &DependencyEntry,
        install_path: &Path,
        settings: &DependencySettings,
    ) -> Result<String, DepsError> {
        match &entry.source {
            DependencySource::Git {
                url,
                git_ref,
                subpath,
            } => self.backoff.retry(|| {
                crate::git_source::fetch(url, git_ref, subpath.as_deref(), install_path)
            }),
            DependencySource::Http { url } => {
                let bytes = self.backoff.retry(|| crate::http_source::download(url))?;
                crate::http_source::extract(url, &bytes, install_path)?;
                Ok(digest_hex(&bytes))
            }
            DependencySource::File { path } => {
                let source = self.project_dir.join(path);
                crate::file_source::materialize(&source, install_path, &settings.install_method)?;
                Ok(format!("file:{path}"))
            }
            DependencySource::Maven { coordinates } => {
                let (bytes, url) = self
                    .backoff
                    .retry(|| crate::maven_source::fetch(coordinates, None))?;
                crate::http_source::extract(&url, &bytes, install_path)?;
                let _ = name;
                Ok(digest_hex(&bytes))
            }
        }
    }
}

fn digest_hex(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Hash the contents of every regular file under `dir`, in sorted path
/// order, so the digest is independent of filesystem iteration order.
fn compute_tree_digest(dir: &Path) -> Result<String, DepsError> {
    let mut paths = Vec::new();
    collect_files(dir, &mut paths)?;
    paths.sort();

    let mut hasher = blake3::Hasher::new();
    for path in paths {
        let relative = path.strip_prefix(dir).unwrap_or(&path);
        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update(b"\0");
        let content = std::fs::read(&path)?;
        hasher.update(&content);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    if dir.is_file() {
        out.push(dir.to_path_buf());
        return Ok(());
    }
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

fn normalize_virtual_path(mapping: &str) -> String {
    if mapping.ends_with('/') {
        mapping.to_owned()
    } else {
        format!("{mapping}/")
    }
}

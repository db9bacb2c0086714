use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Current store format version. Incremented on incompatible layout changes.
pub const STORE_FORMAT_VERSION: u32 = 1;
const VERSION_FILE: &str = "version";

/// Directory layout rooted at `LUCLI_HOME` (spec §2, §7).
///
/// Manages paths for instance metadata, the write-ahead log, the content
/// cache (downloaded engine distributions and dependency artifacts), and the
/// store version marker. All subdirectories are created lazily on
/// [`initialize`](Self::initialize).
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreVersion {
    format_version: u32,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join("store").join("metadata")
    }

    #[inline]
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("store").join("cache")
    }

    #[inline]
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join("store").join("staging")
    }

    #[inline]
    pub fn instances_dir(&self) -> PathBuf {
        self.root.join("instances")
    }

    #[inline]
    pub fn instance_dir(&self, name: &str) -> PathBuf {
        self.instances_dir().join(name)
    }

    /// Materialized server/web descriptors, JVM options, and keystore for an instance.
    #[inline]
    pub fn instance_config_dir(&self, name: &str) -> PathBuf {
        self.instance_dir(name).join("config")
    }

    /// Installed dependency artifacts for an instance.
    #[inline]
    pub fn instance_deps_dir(&self, name: &str) -> PathBuf {
        self.instance_dir(name).join("dependencies")
    }

    #[inline]
    pub fn lock_file(&self) -> PathBuf {
        self.root.join("store").join(".lock")
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(self.metadata_dir())?;
        fs::create_dir_all(self.cache_dir())?;
        fs::create_dir_all(self.staging_dir())?;
        fs::create_dir_all(self.instances_dir())?;

        let version_path = self.root.join("store").join(VERSION_FILE);
        if version_path.exists() {
            self.verify_version()?;
        } else {
            let ver = StoreVersion {
                format_version: STORE_FORMAT_VERSION,
            };
            let content = serde_json::to_string_pretty(&ver)?;
            let store_dir = self.root.join("store");
            let mut tmp = NamedTempFile::new_in(&store_dir)?;
            tmp.write_all(content.as_bytes())?;
            tmp.as_file().sync_all()?;
            tmp.persist(&version_path)
                .map_err(|e| StoreError::Io(e.error))?;
            crate::fsync_dir(&store_dir)?;
        }

        Ok(())
    }

    pub fn verify_version(&self) -> Result<(), StoreError> {
        let version_path = self.root.join("store").join(VERSION_FILE);
        let content = fs::read_to_string(&version_path)?;
        let ver: StoreVersion = serde_json::from_str(&content)?;

        if ver.format_version != STORE_FORMAT_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: STORE_FORMAT_VERSION,
                found: ver.format_version,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths_are_correct() {
        let layout = StoreLayout::new("/tmp/lucli-test");
        assert_eq!(
            layout.metadata_dir(),
            PathBuf::from("/tmp/lucli-test/store/metadata")
        );
        assert_eq!(
            layout.cache_dir(),
            PathBuf::from("/tmp/lucli-test/store/cache")
        );
        assert_eq!(
            layout.instances_dir(),
            PathBuf::from("/tmp/lucli-test/instances")
        );
        assert_eq!(
            layout.instance_dir("myapp"),
            PathBuf::from("/tmp/lucli-test/instances/myapp")
        );
        assert_eq!(
            layout.instance_config_dir("myapp"),
            PathBuf::from("/tmp/lucli-test/instances/myapp/config")
        );
    }

    #[test]
    fn initialize_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize().unwrap();

        assert!(layout.metadata_dir().is_dir());
        assert!(layout.cache_dir().is_dir());
        assert!(layout.instances_dir().is_dir());
    }

    #[test]
    fn initialize_writes_version() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize().unwrap();
        layout.verify_version().unwrap();
    }

    #[test]
    fn initialize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize().unwrap();
        layout.initialize().unwrap();
        layout.verify_version().unwrap();
    }
}

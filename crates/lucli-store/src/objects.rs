use crate::layout::StoreLayout;
use crate::{fsync_dir, StoreError};
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;

/// Content-addressable cache for downloaded engine distributions and
/// dependency artifacts (spec §4.5, §4.7 — "a re-fetch that would produce
/// identical bytes is a no-op").
///
/// Entries are stored as files named by their blake3 hash. Writes are atomic
/// via `NamedTempFile`, and reads verify integrity by recomputing the hash.
pub struct ContentCache {
    layout: StoreLayout,
}

impl ContentCache {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    /// Store data and return its blake3 hash. Idempotent — existing entries are skipped.
    pub fn put(&self, data: &[u8]) -> Result<String, StoreError> {
        let hash = blake3::hash(data).to_hex().to_string();
        let dest = self.layout.cache_dir().join(&hash);

        if dest.exists() {
            return Ok(hash);
        }

        let dir = self.layout.cache_dir();
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&dest).map_err(|e| StoreError::Io(e.error))?;
        fsync_dir(&dir)?;

        Ok(hash)
    }

    /// Retrieve data by hash, verifying integrity on read.
    pub fn get(&self, hash: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.layout.cache_dir().join(hash);
        if !path.exists() {
            return Err(StoreError::EntryNotFound(hash.to_owned()));
        }
        let data = fs::read(&path)?;

        let actual = blake3::hash(&data);
        let actual_hex = actual.to_hex();
        if actual_hex.as_str() != hash {
            return Err(StoreError::IntegrityFailure {
                hash: hash.to_owned(),
                expected: hash.to_owned(),
                actual: actual_hex.to_string(),
            });
        }

        Ok(data)
    }

    pub fn exists(&self, hash: &str) -> bool {
        self.layout.cache_dir().join(hash).exists()
    }

    pub fn remove(&self, hash: &str) -> Result<(), StoreError> {
        let path = self.layout.cache_dir().join(hash);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let dir = self.layout.cache_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut hashes = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    hashes.push(name.to_owned());
                }
            }
        }
        hashes.sort();
        Ok(hashes)
    }

    /// Total size in bytes of all cached entries (for `deps prune` reporting).
    pub fn total_size(&self) -> Result<u64, StoreError> {
        let dir = self.layout.cache_dir();
        if !dir.exists() {
            return Ok(0);
        }
        let mut total = 0u64;
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            total += entry.metadata()?.len();
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cache() -> (tempfile::TempDir, ContentCache) {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize().unwrap();
        let cache = ContentCache::new(layout);
        (dir, cache)
    }

    #[test]
    fn put_and_get_roundtrip() {
        let (_dir, cache) = test_cache();
        let data = b"lucee-5.3.9.zip bytes";
        let hash = cache.put(data).unwrap();
        let retrieved = cache.get(&hash).unwrap();
        assert_eq!(retrieved, data);
    }

    #[test]
    fn put_is_idempotent() {
        let (_dir, cache) = test_cache();
        let data = b"hello";
        let h1 = cache.put(data).unwrap();
        let h2 = cache.put(data).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn get_nonexistent_fails() {
        let (_dir, cache) = test_cache();
        assert!(cache.get("nonexistent").is_err());
    }

    #[test]
    fn integrity_check_on_read() {
        let (dir, cache) = test_cache();
        let data = b"test data";
        let hash = cache.put(data).unwrap();

        let obj_path = StoreLayout::new(dir.path()).cache_dir().join(&hash);
        fs::write(&obj_path, b"corrupted").unwrap();

        assert!(cache.get(&hash).is_err());
    }

    #[test]
    fn list_entries() {
        let (_dir, cache) = test_cache();
        cache.put(b"aaa").unwrap();
        cache.put(b"bbb").unwrap();
        let list = cache.list().unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn remove_entry() {
        let (_dir, cache) = test_cache();
        let hash = cache.put(b"data").unwrap();
        assert!(cache.exists(&hash));
        cache.remove(&hash).unwrap();
        assert!(!cache.exists(&hash));
    }

    #[test]
    fn put_empty_data() {
        let (_dir, cache) = test_cache();
        let hash = cache.put(b"").unwrap();
        let retrieved = cache.get(&hash).unwrap();
        assert!(retrieved.is_empty());
    }

    #[test]
    fn list_empty_cache() {
        let (_dir, cache) = test_cache();
        assert!(cache.list().unwrap().is_empty());
    }

    #[test]
    fn remove_nonexistent_is_ok() {
        let (_dir, cache) = test_cache();
        assert!(cache.remove("nonexistent").is_ok());
    }

    #[test]
    fn hash_is_deterministic() {
        let (_dir, cache) = test_cache();
        let h1 = cache.put(b"deterministic").unwrap();
        let h2 = cache.put(b"deterministic").unwrap();
        assert_eq!(h1, h2);
        let h3 = cache.put(b"different").unwrap();
        assert_ne!(h1, h3);
    }

    #[test]
    fn total_size_sums_entries() {
        let (_dir, cache) = test_cache();
        cache.put(b"1234").unwrap();
        cache.put(b"567890").unwrap();
        assert_eq!(cache.total_size().unwrap(), 10);
    }
}

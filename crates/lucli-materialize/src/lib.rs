//! Produces the concrete on-disk state of an instance directory so the
//! runtime can start correctly (spec §4.6, C6 ConfigMaterializer).
//!
//! Seven outputs, one module each: [`server_descriptor`] (XML connector
//! ports + HTTPS), [`web_descriptor`] (XML servlet registration), [`rewrite`]
//! (URL rewrite rule synthesis), [`engine_config`] (JSON deep-merge +
//! computed dependency mappings), [`jar_placement`] (engine JAR copy/link),
//! [`jvm_options`] (ordered JVM argument list rendered into a `setenv`
//! script), and [`keystore`] (self-signed HTTPS certificate generation).
//!
//! Every output is written via `NamedTempFile` + `persist` +
//! parent-directory fsync, the same three-step pattern used by
//! `lucli_schema::lock`/`lucli_store::layout`.

pub mod engine_config;
pub mod jar_placement;
pub mod jvm_options;
pub mod keystore;
pub mod rewrite;
pub mod server_descriptor;
pub mod web_descriptor;

use std::fs;
use std::io::Write as _;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize engine configuration: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("certificate generation failed: {0}")]
    CertGeneration(String),
    #[error("keystore packaging failed: {0}")]
    KeystorePackaging(String),
    #[error("template error: {0}")]
    Template(String),
}

/// Write `content` to `path` atomically: temp file in the same directory,
/// fsync the file, rename over the destination, fsync the parent directory.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), MaterializeError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| MaterializeError::Io(e.error))?;
    fsync_dir(parent)?;
    Ok(())
}

fn fsync_dir(dir: &Path) -> std::io::Result<()> {
    let f = fs::File::open(dir)?;
    f.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_creates_file_with_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        atomic_write(&path, b"hello").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"hello");
    }

    #[test]
    fn atomic_write_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
    }

    #[test]
    fn atomic_write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deep/out.txt");
        atomic_write(&path, b"hello").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"hello");
    }
}

//! `file` dependency source: copy or symlink from a local path declared in
//! the manifest.
//!
//! **Install methods.** `symlink` preferred (cheap, shared); `copy` fallback
//! when the target filesystem forbids links (spec §4.7).

use crate::DepsError;
use std::path::Path;

pub fn materialize(source: &Path, dest: &Path, install_method: &str) -> Result<(), DepsError> {
    if !source.exists() {
        return Err(DepsError::FetchFailed(
            source.display().to_string(),
            "source path does not exist".to_owned(),
        ));
    }

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let _ = std::fs::remove_file(dest);
    let _ = std::fs::remove_dir_all(dest);

    match install_method {
        "symlink" => match symlink(source, dest) {
            Ok(()) => Ok(()),
            Err(_) => copy_path(source, dest),
        },
        "copy" => copy_path(source, dest),
        other => Err(DepsError::UnsupportedInstallMethod(other.to_owned())),
    }
}

#[cfg(unix)]
fn symlink(source: &Path, dest: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, dest)
}

#[cfg(not(unix))]
fn symlink(_source: &Path, _dest: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "symlinks not supported on this platform",
    ))
}

fn copy_path(source: &Path, dest: &Path) -> Result<(), DepsError> {
    if source.is_dir() {
        copy_dir_recursive(source, dest)?;
    } else {
        std::fs::copy(source, dest)?;
    }
    Ok(())
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let dest_path = dst.join(entry.file_name());
        if file_type.is_dir() {
            copy_dir_recursive(&entry.path(), &dest_path)?;
        } else {
            std::fs::copy(entry.path(), &dest_path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn materialize_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = materialize(
            &dir.path().join("missing"),
            &dir.path().join("dest"),
            "copy",
        );
        assert!(result.is_err());
    }

    #[test]
    fn materialize_copy_duplicates_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.txt");
        std::fs::write(&source, b"payload").unwrap();
        let dest = dir.path().join("dest.txt");

        materialize(&source, &dest, "copy").unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
    }

    #[test]
    fn materialize_unsupported_install_method_fails() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.txt");
        std::fs::write(&source, b"payload").unwrap();
        let result = materialize(&source, &dir.path().join("dest.txt"), "hardlink");
        assert!(matches!(
            result,
            Err(DepsError::UnsupportedInstallMethod(_))
        ));
    }

    #[test]
    fn materialize_symlink_falls_back_to_copy_cross_device() {
        // Can't force an EXDEV in a unit test; verify symlink succeeds on
        // a normal same-filesystem tempdir and content is reachable.
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.txt");
        std::fs::write(&source, b"payload").unwrap();
        let dest = dir.path().join("dest.txt");
        materialize(&source, &dest, "symlink").unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "payload");
    }
}

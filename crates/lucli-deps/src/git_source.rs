//! `git` dependency source: shallow clone by ref, optionally extracting a subpath.

use crate::DepsError;
use std::path::Path;
use std::process::Command;

/// Shallow-clone `url` at `git_ref` into `dest`. If `subpath` is set, only
/// that subdirectory's contents are kept, copied up to `dest`'s root.
pub fn fetch(
    url: &str,
    git_ref: &str,
    subpath: Option<&str>,
    dest: &Path,
) -> Result<String, DepsError> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let _ = std::fs::remove_dir_all(dest);

    let clone_target = if subpath.is_some() {
        tempfile::tempdir().map_err(DepsError::Io)?.into_path()
    } else {
        dest.to_path_buf()
    };
    std::fs::create_dir_all(&clone_target)?;

    let output = Command::new("git")
        .args([
            "clone",
            "--depth",
            "1",
            "--branch",
            git_ref,
            url,
        ])
        .arg(&clone_target)
        .output()
        .map_err(|e| DepsError::CommandFailed("git clone".to_owned(), e.to_string()))?;

    if !output.status.success() {
        // `--branch` requires a ref that exists as a branch or tag; fall
        // back to a full clone + checkout for arbitrary commit SHAs.
        let _ = std::fs::remove_dir_all(&clone_target);
        std::fs::create_dir_all(&clone_target)?;
        let clone_output = Command::new("git")
            .arg("clone")
            .arg(url)
            .arg(&clone_target)
            .output()
            .map_err(|e| DepsError::CommandFailed("git clone".to_owned(), e.to_string()))?;
        if !clone_output.status.success() {
            return Err(DepsError::FetchFailed(
                url.to_owned(),
                String::from_utf8_lossy(&clone_output.stderr).into_owned(),
            ));
        }
        let checkout_output = Command::new("git")
            .arg("-C")
            .arg(&clone_target)
            .arg("checkout")
            .arg(git_ref)
            .output()
            .map_err(|e| DepsError::CommandFailed("git checkout".to_owned(), e.to_string()))?;
        if !checkout_output.status.success() {
            return Err(DepsError::FetchFailed(
                url.to_owned(),
                String::from_utf8_lossy(&checkout_output.stderr).into_owned(),
            ));
        }
    }

    let resolved_sha = resolve_head_sha(&clone_target)?;

    if let Some(subpath) = subpath {
        let source = clone_target.join(subpath);
        if !source.exists() {
            return Err(DepsError::FetchFailed(
                url.to_owned(),
                format!("subpath '{subpath}' not found in cloned repository"),
            ));
        }
        copy_dir_recursive(&source, dest)?;
        let _ = std::fs::remove_dir_all(&clone_target);
    }

    Ok(resolved_sha)
}

fn resolve_head_sha(repo_dir: &Path) -> Result<String, DepsError> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo_dir)
        .args(["rev-parse", "HEAD"])
        .output()
        .map_err(|e| DepsError::CommandFailed("git rev-parse".to_owned(), e.to_string()))?;
    if !output.status.success() {
        return Err(DepsError::FetchFailed(
            repo_dir.display().to_string(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
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
    fn copy_dir_recursive_copies_nested_files() {
        let src = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(src.path().join("nested")).unwrap();
        std::fs::write(src.path().join("top.txt"), b"top").unwrap();
        std::fs::write(src.path().join("nested/inner.txt"), b"inner").unwrap();

        let dst = tempfile::tempdir().unwrap();
        copy_dir_recursive(src.path(), dst.path()).unwrap();

        assert_eq!(
            std::fs::read_to_string(dst.path().join("top.txt")).unwrap(),
            "top"
        );
        assert_eq!(
            std::fs::read_to_string(dst.path().join("nested/inner.txt")).unwrap(),
            "inner"
        );
    }
}

//! `http` dependency source: download an archive and extract it.
//!
//! Uses `ureq::Agent` for plain HTTP GETs (no retries/redirect handling
//! beyond what `ureq` does by default; the bounded backoff around the
//! whole fetch lives in [`crate::backoff`]).

use crate::DepsError;
use std::io::Read as _;
use std::path::Path;

pub fn download(url: &str) -> Result<Vec<u8>, DepsError> {
    let agent = ureq::Agent::new_with_defaults();
    let response = agent
        .get(url)
        .call()
        .map_err(|e| DepsError::FetchFailed(url.to_owned(), e.to_string()))?;
    let mut bytes = Vec::new();
    response
        .into_body()
        .into_reader()
        .take(512 * 1024 * 1024)
        .read_to_end(&mut bytes)
        .map_err(|e| DepsError::FetchFailed(url.to_owned(), e.to_string()))?;
    Ok(bytes)
}

/// Extract `archive` (zip or gzipped tar, detected by `url`'s extension)
/// into `dest`, which is created if missing.
pub fn extract(url: &str, archive: &[u8], dest: &Path) -> Result<(), DepsError> {
    std::fs::create_dir_all(dest)?;
    if url.ends_with(".zip") {
        extract_zip(archive, dest)
    } else if url.ends_with(".tar.gz") || url.ends_with(".tgz") {
        extract_tar_gz(archive, dest)
    } else if url.ends_with(".tar") {
        extract_tar(archive, dest)
    } else {
        // No recognizable archive extension: treat the body as a single
        // file dependency (e.g. a bare .jar) and write it verbatim.
        let file_name = url.rsplit('/').next().unwrap_or("artifact");
        std::fs::write(dest.join(file_name), archive)?;
        Ok(())
    }
}

fn extract_zip(archive: &[u8], dest: &Path) -> Result<(), DepsError> {
    let cursor = std::io::Cursor::new(archive);
    let mut zip = zip::ZipArchive::new(cursor)
        .map_err(|e| DepsError::FetchFailed("zip archive".to_owned(), e.to_string()))?;
    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| DepsError::FetchFailed("zip entry".to_owned(), e.to_string()))?;
        let Some(relative) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            continue;
        };
        let out_path = dest.join(relative);
        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
        } else {
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out_file = std::fs::File::create(&out_path)?;
            std::io::copy(&mut entry, &mut out_file)?;
        }
    }
    Ok(())
}

fn extract_tar_gz(archive: &[u8], dest: &Path) -> Result<(), DepsError> {
    let decoder = flate2_decode(archive)?;
    let mut tar = tar::Archive::new(decoder.as_slice());
    tar.unpack(dest)
        .map_err(|e| DepsError::FetchFailed("tar.gz archive".to_owned(), e.to_string()))?;
    Ok(())
}

fn extract_tar(archive: &[u8], dest: &Path) -> Result<(), DepsError> {
    let mut tar = tar::Archive::new(archive);
    tar.unpack(dest)
        .map_err(|e| DepsError::FetchFailed("tar archive".to_owned(), e.to_string()))?;
    Ok(())
}

/// gzip-decode without adding a flate2 dependency: shells out to the system
/// `gzip` binary, mirroring this crate's broader preference (shared with
/// `lucli-runtime`) for invoking well-known system tools over vendoring
/// narrow-purpose decompression libraries.
fn flate2_decode(archive: &[u8]) -> Result<Vec<u8>, DepsError> {
    use std::io::Write as _;
    use std::process::{Command, Stdio};

    let mut child = Command::new("gzip")
        .arg("-d")
        .arg("-c")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|e| DepsError::CommandFailed("gzip".to_owned(), e.to_string()))?;

    let mut stdin = child.stdin.take().expect("piped stdin");
    let archive = archive.to_vec();
    let writer = std::thread::spawn(move || {
        let _ = stdin.write_all(&archive);
    });

    let output = child
        .wait_with_output()
        .map_err(|e| DepsError::CommandFailed("gzip".to_owned(), e.to_string()))?;
    let _ = writer.join();

    if !output.status.success() {
        return Err(DepsError::CommandFailed(
            "gzip".to_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ));
    }
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_plain_file_writes_verbatim() {
        let dest = tempfile::tempdir().unwrap();
        extract("https://example.com/fw1.jar", b"jar-bytes", dest.path()).unwrap();
        assert_eq!(
            std::fs::read(dest.path().join("fw1.jar")).unwrap(),
            b"jar-bytes"
        );
    }

    #[test]
    fn extract_zip_archive_unpacks_entries() {
        let mut buf = Vec::new();
        {
            let cursor = std::io::Cursor::new(&mut buf);
            let mut writer = zip::ZipWriter::new(cursor);
            writer
                .start_file("hello.txt", zip::write::SimpleFileOptions::default())
                .unwrap();
            use std::io::Write as _;
            writer.write_all(b"hello").unwrap();
            writer.finish().unwrap();
        }

        let dest = tempfile::tempdir().unwrap();
        extract("https://example.com/fw1.zip", &buf, dest.path()).unwrap();
        assert_eq!(
            std::fs::read_to_string(dest.path().join("hello.txt")).unwrap(),
            "hello"
        );
    }
}

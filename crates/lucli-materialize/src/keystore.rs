//! HTTPS keystore generation (spec §4.6 output 7): a self-signed
//! certificate with the configured `host` as CN and SAN, packaged into a
//! PKCS12 keystore.
//!
//! Certificate generation uses `rcgen`; PKCS12 packaging shells out to the
//! system `openssl` binary rather than adding a PKCS12-writing crate,
//! matching the broader preference (shared with `lucli-runtime` and
//! `lucli-deps`) for well-known system tools over narrow-purpose libraries.

use crate::MaterializeError;
use std::path::Path;
use std::process::Command;

pub struct GeneratedKeystore {
    pub keystore_path: std::path::PathBuf,
    pub password: String,
}

/// Generate a self-signed certificate for `host` and package it as a PKCS12
/// keystore at `dest`. `password` is caller-supplied (spec leaves keystore
/// password generation/storage to the caller, typically derived via
/// `lucli-secrets`).
pub fn generate(host: &str, dest: &Path, password: &str) -> Result<GeneratedKeystore, MaterializeError> {
    let certified = rcgen::generate_simple_self_signed(vec![host.to_owned()])
        .map_err(|e| MaterializeError::CertGeneration(e.to_string()))?;

    let cert_pem = certified.cert.pem();
    let key_pem = certified.key_pair.serialize_pem();

    let work_dir = tempfile::tempdir().map_err(MaterializeError::Io)?;
    let cert_path = work_dir.path().join("cert.pem");
    let key_path = work_dir.path().join("key.pem");
    std::fs::write(&cert_path, &cert_pem)?;
    std::fs::write(&key_path, &key_pem)?;

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_keystore = work_dir.path().join("keystore.p12");

    let output = Command::new("openssl")
        .args(["pkcs12", "-export"])
        .arg("-in")
        .arg(&cert_path)
        .arg("-inkey")
        .arg(&key_path)
        .arg("-out")
        .arg(&tmp_keystore)
        .arg("-password")
        .arg(format!("pass:{password}"))
        .arg("-name")
        .arg(host)
        .output()
        .map_err(|e| MaterializeError::KeystorePackaging(e.to_string()))?;

    if !output.status.success() {
        return Err(MaterializeError::KeystorePackaging(
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ));
    }

    let content = std::fs::read(&tmp_keystore)?;
    crate::atomic_write(dest, &content)?;

    Ok(GeneratedKeystore {
        keystore_path: dest.to_path_buf(),
        password: password.to_owned(),
    })
}

/// Whether regeneration should be skipped: an existing keystore is kept
/// unless the caller passed `--regenerate-keystore` (spec's Open Question
/// on HTTPS keystore lifecycle — resolved in `DESIGN.md` as: regeneration
/// requires that explicit flag; LuCLI never silently rotates a certificate
/// a running instance might depend on).
pub fn should_regenerate(existing_keystore: &Path, force_regenerate: bool) -> bool {
    force_regenerate || !existing_keystore.exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_regenerate_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(should_regenerate(&dir.path().join("absent.p12"), false));
    }

    #[test]
    fn should_not_regenerate_existing_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keystore.p12");
        std::fs::write(&path, b"existing").unwrap();
        assert!(!should_regenerate(&path, false));
    }

    #[test]
    fn should_regenerate_existing_with_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keystore.p12");
        std::fs::write(&path, b"existing").unwrap();
        assert!(should_regenerate(&path, true));
    }
}

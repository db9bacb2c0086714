//! Encrypted local key-value secret store for LuCLI (spec §4.3, C3).
//!
//! Secrets are persisted to a single file (by convention
//! `secrets/local.json` under `LUCLI_HOME`) encrypted with ChaCha20-Poly1305
//! under a key derived from a passphrase via Argon2. Plaintext never reaches
//! disk; the KDF salt and AEAD nonce travel alongside each entry's
//! ciphertext. The on-disk write follows the same atomic
//! temp-file-then-rename-then-fsync idiom used throughout this workspace's
//! store layer.

use argon2::Argon2;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse secret store: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
    #[error("encryption failed")]
    Encrypt,
    #[error("decryption failed (wrong key or corrupt entry)")]
    Decrypt,
    #[error("secret '{0}' not found")]
    NotFound(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SecretEntry {
    nonce: String,
    ciphertext: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SecretFile {
    kdf_salt: String,
    kdf_params: KdfParams,
    entries: BTreeMap<String, SecretEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct KdfParams {
    m_cost: u32,
    t_cost: u32,
    p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        // argon2 defaults (19 MiB, 2 passes, 1 lane) — conservative for a CLI
        // invoked once per command rather than a long-lived daemon.
        Self {
            m_cost: 19 * 1024,
            t_cost: 2,
            p_cost: 1,
        }
    }
}

/// Persistent, encrypted key-value secret store.
pub struct SecretStore {
    path: PathBuf,
    key: [u8; 32],
    file: SecretFile,
}

impl SecretStore {
    /// Open (or initialize) the secret store at `path`, deriving the
    /// encryption key from `passphrase`.
    pub fn open(path: impl Into<PathBuf>, passphrase: &[u8]) -> Result<Self, SecretError> {
        let path = path.into();
        let (file, is_new) = if path.exists() {
            let content = fs::read_to_string(&path)?;
            (serde_json::from_str::<SecretFile>(&content)?, false)
        } else {
            let mut salt = [0u8; 16];
            fill_random(&mut salt);
            (
                SecretFile {
                    kdf_salt: hex_encode(&salt),
                    kdf_params: KdfParams::default(),
                    entries: BTreeMap::new(),
                },
                true,
            )
        };

        let salt = hex_decode(&file.kdf_salt).map_err(|e| SecretError::KeyDerivation(e))?;
        let key = derive_key(passphrase, &salt, &file.kdf_params)?;

        let store = Self { path, key, file };
        if is_new {
            store.persist()?;
        }
        Ok(store)
    }

    /// Store `value` under `name`, overwriting any existing secret.
    pub fn put(&mut self, name: &str, value: &[u8]) -> Result<(), SecretError> {
        let mut nonce_bytes = [0u8; 12];
        fill_random(&mut nonce_bytes);
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&self.key));
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = cipher
            .encrypt(nonce, value)
            .map_err(|_| SecretError::Encrypt)?;
        self.file.entries.insert(
            name.to_owned(),
            SecretEntry {
                nonce: hex_encode(&nonce_bytes),
                ciphertext: hex_encode(&ciphertext),
            },
        );
        self.persist()
    }

    /// Retrieve and decrypt the secret named `name`, if present.
    pub fn get(&self, name: &str) -> Result<Option<Vec<u8>>, SecretError> {
        let Some(entry) = self.file.entries.get(name) else {
            return Ok(None);
        };
        let nonce_bytes = hex_decode(&entry.nonce).map_err(|_| SecretError::Decrypt)?;
        let ciphertext = hex_decode(&entry.ciphertext).map_err(|_| SecretError::Decrypt)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&self.key));
        let nonce = Nonce::from_slice(&nonce_bytes);
        let plaintext = cipher
            .decrypt(nonce, ciphertext.as_ref())
            .map_err(|_| SecretError::Decrypt)?;
        Ok(Some(plaintext))
    }

    /// Retrieve a secret as UTF-8, for substitution into manifest strings.
    /// Missing secret is reported as `NotFound` (spec §4.2: missing secret is fatal).
    pub fn require_utf8(&self, name: &str) -> Result<String, SecretError> {
        let bytes = self
            .get(name)?
            .ok_or_else(|| SecretError::NotFound(name.to_owned()))?;
        String::from_utf8(bytes).map_err(|_| SecretError::Decrypt)
    }

    pub fn list(&self) -> Vec<String> {
        self.file.entries.keys().cloned().collect()
    }

    pub fn delete(&mut self, name: &str) -> Result<bool, SecretError> {
        let removed = self.file.entries.remove(name).is_some();
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }

    fn persist(&self) -> Result<(), SecretError> {
        let content = serde_json::to_string_pretty(&self.file)?;
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| SecretError::Io(e.error))?;
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
        Ok(())
    }
}

fn derive_key(passphrase: &[u8], salt: &[u8], params: &KdfParams) -> Result<[u8; 32], SecretError> {
    let argon2_params = argon2::Params::new(params.m_cost, params.t_cost, params.p_cost, Some(32))
        .map_err(|e| SecretError::KeyDerivation(e.to_string()))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, argon2_params);
    let mut key = [0u8; 32];
    argon2
        .hash_password_into(passphrase, salt, &mut key)
        .map_err(|e| SecretError::KeyDerivation(e.to_string()))?;
    Ok(key)
}

fn fill_random(buf: &mut [u8]) {
    use std::time::{SystemTime, UNIX_EPOCH};
    // A CLI-invoked-per-command tool has no long-lived CSPRNG state to
    // seed from; draw from the OS random device directly rather than add
    // a `rand` dependency for a handful of nonce/salt bytes.
    if let Ok(mut f) = fs::File::open("/dev/urandom") {
        use std::io::Read;
        if f.read_exact(buf).is_ok() {
            return;
        }
    }
    // Fallback only reached in environments without /dev/urandom (not real
    // Linux targets); mix in the clock so repeated calls still differ.
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    for (i, b) in buf.iter_mut().enumerate() {
        *b = (seed >> (8 * (i % 16))) as u8 ^ (i as u8);
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> Result<Vec<u8>, String> {
    if s.len() % 2 != 0 {
        return Err("odd-length hex string".to_owned());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|e| e.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.json");
        let mut store = SecretStore::open(&path, b"passphrase").unwrap();
        store.put("db_password", b"hunter2").unwrap();
        assert_eq!(store.get("db_password").unwrap(), Some(b"hunter2".to_vec()));
    }

    #[test]
    fn missing_secret_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.json");
        let store = SecretStore::open(&path, b"passphrase").unwrap();
        assert_eq!(store.get("nope").unwrap(), None);
    }

    #[test]
    fn require_utf8_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.json");
        let store = SecretStore::open(&path, b"passphrase").unwrap();
        assert!(matches!(
            store.require_utf8("nope"),
            Err(SecretError::NotFound(_))
        ));
    }

    #[test]
    fn list_reflects_puts_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.json");
        let mut store = SecretStore::open(&path, b"passphrase").unwrap();
        store.put("a", b"1").unwrap();
        store.put("b", b"2").unwrap();
        assert_eq!(store.list().len(), 2);
        assert!(store.delete("a").unwrap());
        assert_eq!(store.list(), vec!["b".to_owned()]);
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.json");
        {
            let mut store = SecretStore::open(&path, b"passphrase").unwrap();
            store.put("k", b"v").unwrap();
        }
        let store2 = SecretStore::open(&path, b"passphrase").unwrap();
        assert_eq!(store2.get("k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn wrong_passphrase_fails_to_decrypt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.json");
        {
            let mut store = SecretStore::open(&path, b"correct").unwrap();
            store.put("k", b"v").unwrap();
        }
        let store2 = SecretStore::open(&path, b"wrong").unwrap();
        assert!(store2.get("k").is_err());
    }

    #[test]
    fn plaintext_never_appears_in_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.json");
        let mut store = SecretStore::open(&path, b"passphrase").unwrap();
        store.put("k", b"super-secret-value").unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("super-secret-value"));
    }
}

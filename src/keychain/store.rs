//! Secret persistence backends.

use crate::error::{AppError, AppResult};
use keyring::Entry;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Keychain service name
pub const SERVICE_NAME: &str = "sftp-explorer";

/// Keyed secret storage
pub trait SecretStore: Send + Sync {
    fn set(&self, key: &str, secret: &str) -> AppResult<()>;
    fn get(&self, key: &str) -> AppResult<Option<String>>;
    /// Removing a missing key is not an error.
    fn delete(&self, key: &str) -> AppResult<()>;
}

/// Process-local store
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemoryStore {
    fn set(&self, key: &str, secret: &str) -> AppResult<()> {
        self.entries.write().insert(key.to_string(), secret.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn delete(&self, key: &str) -> AppResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// AES-256-GCM sealed JSON map on disk.
/// WARNING: the key lives next to the data; this is weaker than an OS keychain.
pub struct EncryptedFileStore {
    dir: PathBuf,
    lock: parking_lot::Mutex<()>,
}

impl EncryptedFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: parking_lot::Mutex::new(()),
        }
    }

    fn secrets_path(&self) -> PathBuf {
        self.dir.join(".secrets.enc")
    }

    fn key_path(&self) -> PathBuf {
        self.dir.join(".keyfile")
    }

    /// The stored 32-byte key, if any. A key file of any other length is
    /// moved aside rather than replaced.
    fn read_key(&self) -> AppResult<Option<[u8; 32]>> {
        let key_path = self.key_path();
        let key_data = match fs::read(&key_path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::Keychain(format!("Failed to read key file: {}", e))),
        };

        match <[u8; 32]>::try_from(key_data.as_slice()) {
            Ok(key) => Ok(Some(key)),
            Err(_) => {
                tracing::warn!(
                    "Key file {:?} holds {} bytes instead of 32",
                    key_path,
                    key_data.len()
                );
                set_aside(&key_path)?;
                Ok(None)
            }
        }
    }

    fn get_or_create_key(&self) -> AppResult<[u8; 32]> {
        use rand::RngCore;

        if let Some(key) = self.read_key()? {
            return Ok(key);
        }

        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);

        let key_path = self.key_path();
        fs::create_dir_all(&self.dir)?;
        fs::write(&key_path, key)
            .map_err(|e| AppError::Keychain(format!("Failed to write key file: {}", e)))?;
        restrict_permissions(&key_path);

        Ok(key)
    }

    /// Decrypted map. A secrets file that cannot be opened with the current
    /// key is moved aside and the store starts empty.
    fn load(&self) -> AppResult<HashMap<String, String>> {
        use aes_gcm::{
            aead::{Aead, KeyInit},
            Aes256Gcm, Nonce,
        };

        let path = self.secrets_path();
        let encrypted_data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => {
                return Err(AppError::Keychain(format!("Failed to read secrets file: {}", e)))
            }
        };

        let key = match self.read_key()? {
            Some(key) if encrypted_data.len() >= 12 => key,
            _ => {
                tracing::warn!("Secrets file {:?} has no usable key; starting empty", path);
                set_aside(&path)?;
                return Ok(HashMap::new());
            }
        };

        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| AppError::Keychain(format!("Failed to create cipher: {}", e)))?;
        let nonce = Nonce::from_slice(&encrypted_data[..12]);

        let decoded: Option<HashMap<String, String>> = cipher
            .decrypt(nonce, &encrypted_data[12..])
            .ok()
            .and_then(|plaintext| serde_json::from_slice(&plaintext).ok());

        match decoded {
            Some(map) => Ok(map),
            None => {
                tracing::warn!("Secrets file {:?} does not decrypt with the current key; starting empty", path);
                set_aside(&path)?;
                Ok(HashMap::new())
            }
        }
    }

    fn save(&self, store: &HashMap<String, String>) -> AppResult<()> {
        use aes_gcm::{
            aead::{Aead, KeyInit},
            Aes256Gcm, Nonce,
        };
        use rand::RngCore;

        let key = self.get_or_create_key()?;
        let json = serde_json::to_vec(store)?;

        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| AppError::Keychain(format!("Failed to create cipher: {}", e)))?;

        let mut nonce_bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, json.as_slice())
            .map_err(|e| AppError::Keychain(format!("Failed to encrypt secrets: {}", e)))?;

        // Nonce is stored in front of the ciphertext
        let mut output = nonce_bytes.to_vec();
        output.extend(ciphertext);

        let path = self.secrets_path();
        fs::write(&path, &output)
            .map_err(|e| AppError::Keychain(format!("Failed to write secrets file: {}", e)))?;
        restrict_permissions(&path);

        Ok(())
    }
}

impl SecretStore for EncryptedFileStore {
    fn set(&self, key: &str, secret: &str) -> AppResult<()> {
        let _guard = self.lock.lock();
        let mut store = self.load()?;
        store.insert(key.to_string(), secret.to_string());
        self.save(&store)
    }

    fn get(&self, key: &str) -> AppResult<Option<String>> {
        let _guard = self.lock.lock();
        Ok(self.load()?.get(key).cloned())
    }

    fn delete(&self, key: &str) -> AppResult<()> {
        let _guard = self.lock.lock();
        let mut store = self.load()?;
        if store.remove(key).is_some() {
            self.save(&store)?;
        }
        Ok(())
    }
}

/// OS keychain with an encrypted-file fallback
pub struct KeyringStore {
    service: String,
    fallback: EncryptedFileStore,
}

impl KeyringStore {
    pub fn new(fallback_dir: impl Into<PathBuf>) -> Self {
        Self::with_service(SERVICE_NAME, fallback_dir)
    }

    pub fn with_service(service: impl Into<String>, fallback_dir: impl Into<PathBuf>) -> Self {
        Self {
            service: service.into(),
            fallback: EncryptedFileStore::new(fallback_dir),
        }
    }
}

impl SecretStore for KeyringStore {
    fn set(&self, key: &str, secret: &str) -> AppResult<()> {
        match Entry::new(&self.service, key) {
            Ok(entry) => match entry.set_password(secret) {
                Ok(()) => {
                    tracing::debug!("Stored secret in OS keychain: {}", key);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("OS keychain failed, using encrypted file fallback: {}", e);
                }
            },
            Err(e) => {
                tracing::warn!("OS keychain unavailable, using encrypted file fallback: {}", e);
            }
        }

        self.fallback.set(key, secret)
    }

    fn get(&self, key: &str) -> AppResult<Option<String>> {
        match Entry::new(&self.service, key) {
            Ok(entry) => match entry.get_password() {
                Ok(secret) => return Ok(Some(secret)),
                Err(keyring::Error::NoEntry) => {}
                Err(e) => {
                    tracing::debug!("OS keychain get failed, trying fallback: {}", e);
                }
            },
            Err(e) => {
                tracing::debug!("OS keychain unavailable for get, trying fallback: {}", e);
            }
        }

        self.fallback.get(key)
    }

    fn delete(&self, key: &str) -> AppResult<()> {
        if let Ok(entry) = Entry::new(&self.service, key) {
            match entry.delete_password() {
                Ok(()) => tracing::debug!("Deleted secret from OS keychain: {}", key),
                Err(keyring::Error::NoEntry) => {}
                Err(e) => tracing::debug!("OS keychain delete failed: {}", e),
            }
        }

        // The secret may have landed in the fallback on an earlier run
        self.fallback.delete(key)
    }
}

/// Rename `path` to `<path>.bak`, replacing any older backup.
fn set_aside(path: &Path) -> AppResult<()> {
    let mut backup = path.as_os_str().to_owned();
    backup.push(".bak");
    fs::rename(path, &backup)
        .map_err(|e| AppError::Keychain(format!("Failed to move {:?} aside: {}", path, e)))?;
    tracing::warn!("Moved {:?} to {:?}", path, backup);
    Ok(())
}

fn restrict_permissions(path: &std::path::Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o600);
        let _ = fs::set_permissions(path, perms);
    }
    #[cfg(not(unix))]
    let _ = path;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypted_file_round_trip_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = EncryptedFileStore::new(dir.path());

        assert_eq!(store.get("ssh-creds-a").unwrap(), None);
        store.set("ssh-creds-a", "{\"password\":\"pw\"}").unwrap();
        store.set("ssh-creds-b", "other").unwrap();

        let reopened = EncryptedFileStore::new(dir.path());
        assert_eq!(
            reopened.get("ssh-creds-a").unwrap().as_deref(),
            Some("{\"password\":\"pw\"}")
        );

        reopened.delete("ssh-creds-a").unwrap();
        reopened.delete("ssh-creds-a").unwrap();
        assert_eq!(reopened.get("ssh-creds-a").unwrap(), None);
        assert_eq!(reopened.get("ssh-creds-b").unwrap().as_deref(), Some("other"));
    }

    #[test]
    fn test_lost_key_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = EncryptedFileStore::new(dir.path());
        store.set("ssh-creds-p1", "one").unwrap();
        fs::remove_file(dir.path().join(".keyfile")).unwrap();

        assert_eq!(store.get("ssh-creds-p1").unwrap(), None);
        assert!(dir.path().join(".secrets.enc.bak").exists());

        store.set("ssh-creds-p2", "two").unwrap();
        assert_eq!(store.get("ssh-creds-p2").unwrap().as_deref(), Some("two"));
        assert_eq!(store.get("ssh-creds-p1").unwrap(), None);
    }

    #[test]
    fn test_short_key_file_is_kept_aside() {
        let dir = tempfile::tempdir().unwrap();
        let store = EncryptedFileStore::new(dir.path());
        store.set("ssh-creds-p1", "one").unwrap();
        fs::write(dir.path().join(".keyfile"), b"short").unwrap();

        assert_eq!(store.get("ssh-creds-p1").unwrap(), None);
        assert_eq!(fs::read(dir.path().join(".keyfile.bak")).unwrap(), b"short");

        store.set("ssh-creds-p2", "two").unwrap();
        assert_eq!(fs::read(dir.path().join(".keyfile")).unwrap().len(), 32);
        assert_eq!(store.get("ssh-creds-p2").unwrap().as_deref(), Some("two"));
    }

    #[test]
    fn test_encrypted_file_is_not_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let store = EncryptedFileStore::new(dir.path());
        store.set("k", "super-secret-value").unwrap();

        let raw = fs::read(dir.path().join(".secrets.enc")).unwrap();
        let needle = b"super-secret-value";
        assert!(!raw.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn test_memory_store_overwrites() {
        let store = MemoryStore::new();
        store.set("k", "one").unwrap();
        store.set("k", "two").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("two"));
        store.delete("missing").unwrap();
    }
}

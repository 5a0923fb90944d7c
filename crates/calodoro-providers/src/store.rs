//! Opaque key/value secret persistence.
//!
//! A [`SecretStore`] holds raw bytes under string keys. It knows nothing about
//! what it stores; the token layer above decides the encoding. Writes are full
//! replacements.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Durable byte storage keyed by a fixed identifier.
pub trait SecretStore: Send + Sync + fmt::Debug {
    /// Reads the value stored under `key`, or `None` if absent.
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Replaces the value stored under `key`.
    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Removes `key`. Removing a missing key is not an error.
    fn delete(&self, key: &str) -> StoreResult<()>;
}

/// Stores each key as one file inside a directory.
///
/// Files are written to a temporary sibling and renamed into place. On Unix
/// the temporary file is created with mode 0600, so the secret is never
/// readable by others.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    dir: PathBuf,
}

impl FileSecretStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the default store location (`<data_dir>/calodoro`).
    pub fn default_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("calodoro"))
    }

    /// Returns the directory holding the secrets.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", name))
    }
}

impl SecretStore for FileSecretStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no secret file");
                Ok(None)
            }
            Err(e) => Err(StoreError::io(key, e)),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(key, e))?;

        let path = self.path_for(key);
        let temp_path = path.with_extension("json.tmp");

        // A leftover temp file would keep its old mode, so start fresh.
        match fs::remove_file(&temp_path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                return Err(StoreError::io(key, e));
            }
            _ => {}
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(&temp_path)
            .map_err(|e| StoreError::io(key, e))?;
        file.write_all(value)
            .and_then(|()| file.sync_all())
            .map_err(|e| StoreError::io(key, e))?;
        drop(file);

        fs::rename(&temp_path, &path).map_err(|e| StoreError::io(key, e))?;
        debug!(path = %path.display(), "secret written");
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "secret removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(key, e)),
        }
    }
}

/// In-process store, lost on exit.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

/// Stores secrets in the platform keychain (Keychain, Credential Manager,
/// Secret Service).
#[cfg(feature = "keyring")]
#[derive(Debug, Clone)]
pub struct KeyringSecretStore {
    service: String,
}

#[cfg(feature = "keyring")]
impl KeyringSecretStore {
    /// Service name used when none is configured.
    pub const DEFAULT_SERVICE: &'static str = "calodoro";

    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> StoreResult<keyring::Entry> {
        keyring::Entry::new(&self.service, key)
            .map_err(|e| StoreError::Backend(format!("cannot open keyring entry '{}': {}", key, e)))
    }
}

#[cfg(feature = "keyring")]
impl Default for KeyringSecretStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SERVICE)
    }
}

#[cfg(feature = "keyring")]
impl SecretStore for KeyringSecretStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        match self.entry(key)?.get_secret() {
            Ok(bytes) => Ok(Some(bytes)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::Backend(format!(
                "failed to read '{}' from keyring: {}",
                key, e
            ))),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        debug!(service = %self.service, key, "storing secret in keyring");
        self.entry(key)?.set_secret(value).map_err(|e| {
            StoreError::Backend(format!("failed to write '{}' to keyring: {}", key, e))
        })
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StoreError::Backend(format!(
                "failed to delete '{}' from keyring: {}",
                key, e
            ))),
        }
    }
}

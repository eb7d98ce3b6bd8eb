//! Persistent storage for the session token.
//!
//! # Design
//! `TokenStore` is a tiny key/value contract so the host can pick the
//! backend per target. `MemoryTokenStore` lives only as long as the process;
//! `KeyringTokenStore` keeps the token in the OS credential store, and
//! `FileTokenStore` is the fallback for platforms without one: a JSON map on
//! disk that survives restarts until it is explicitly removed. None of them
//! adds expiry.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::ApiError;

/// Read/write/delete contract shared by every token backend.
pub trait TokenStore: Send + Sync {
    /// Stored value, or `None` if never set or removed.
    fn get(&self, key: &str) -> Result<Option<String>, ApiError>;

    /// Overwrites unconditionally.
    fn set(&self, key: &str, value: &str) -> Result<(), ApiError>;

    /// Deletes the value. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), ApiError>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ApiError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ApiError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.remove(key);
        Ok(())
    }
}

/// JSON-file store. Every call re-reads the file, so several processes (or
/// several stores over the same path) observe each other's writes.
///
/// Writes go to an owner-only temp file in the same directory that is then
/// renamed over the target, so readers never see a torn or world-readable
/// file. An unparseable file is treated as empty and replaced by the next
/// write.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store at `<data_local_dir>/tailor/session.json`.
    pub fn default_location() -> Result<Self, ApiError> {
        let dir = dirs::data_local_dir()
            .ok_or_else(|| ApiError::Storage("no local data directory on this platform".to_string()))?;
        Ok(Self::new(dir.join("tailor").join("session.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, ApiError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(values) => Ok(values),
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "token file is corrupt, treating as empty");
                    Ok(BTreeMap::new())
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(storage_error(&self.path, &e)),
        }
    }

    fn save(&self, values: &BTreeMap<String, String>) -> Result<(), ApiError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| storage_error(dir, &e))?;
        let raw = serde_json::to_string_pretty(values)
            .map_err(|e| ApiError::Serialization(e.to_string()))?;

        // NamedTempFile is created 0600 on unix.
        let mut file = NamedTempFile::new_in(dir).map_err(|e| storage_error(dir, &e))?;
        file.write_all(raw.as_bytes())
            .and_then(|()| file.as_file().sync_all())
            .map_err(|e| storage_error(file.path(), &e))?;
        file.persist(&self.path)
            .map_err(|e| storage_error(&self.path, &e.error))?;
        debug!(path = %self.path.display(), "token store written");
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ApiError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut values = self.load()?;
        values.insert(key.to_string(), value.to_string());
        self.save(&values)
    }

    fn remove(&self, key: &str) -> Result<(), ApiError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.path.exists() {
            return Ok(());
        }
        let mut values = self.load()?;
        values.remove(key);
        // Rewrite even when the key was absent so a corrupt file is replaced.
        self.save(&values)
    }
}

fn storage_error(path: &Path, err: &std::io::Error) -> ApiError {
    ApiError::Storage(format!("{}: {err}", path.display()))
}

/// Service name the keyring entries are filed under.
pub const KEYRING_SERVICE: &str = "tailor";

/// OS credential store: Keychain on macOS, Credential Manager on Windows,
/// the kernel keyring on Linux. Each key is one entry under `service`.
#[derive(Debug, Clone)]
pub struct KeyringTokenStore {
    service: String,
}

impl KeyringTokenStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, ApiError> {
        keyring::Entry::new(&self.service, key).map_err(keyring_error)
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new(KEYRING_SERVICE)
    }
}

impl TokenStore for KeyringTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        missing_as_none(self.entry(key)?.get_password())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ApiError> {
        self.entry(key)?.set_password(value).map_err(keyring_error)
    }

    fn remove(&self, key: &str) -> Result<(), ApiError> {
        missing_as_none(self.entry(key)?.delete_credential()).map(drop)
    }
}

/// Maps keyring's "no such entry" to `None`; every other failure is storage.
fn missing_as_none<T>(result: Result<T, keyring::Error>) -> Result<Option<T>, ApiError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(keyring_error(e)),
    }
}

fn keyring_error(err: keyring::Error) -> ApiError {
    ApiError::Storage(format!("keyring: {err}"))
}

/// Best store available on this machine: the OS keyring when it answers,
/// else the JSON file under the data directory, else process memory.
pub fn default_token_store(key: &str) -> Arc<dyn TokenStore> {
    let keyring = KeyringTokenStore::default();
    match keyring.get(key) {
        Ok(_) => return Arc::new(keyring),
        Err(e) => warn!(error = %e, "OS keyring unavailable, falling back to file store"),
    }
    match FileTokenStore::default_location() {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(error = %e, "no file location for tokens, session will not persist");
            Arc::new(MemoryTokenStore::new())
        }
    }
}

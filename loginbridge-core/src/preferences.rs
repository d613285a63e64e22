//! Secured key-value preferences holding the store unlock key.
//!
//! [`FilePreferences`] keeps values encrypted with AES-256-GCM in a JSON
//! file. The 32-byte device key lives in its own file, readable only by
//! the owner on Unix.

use crate::crypto::cipher::{decrypt_bytes, encrypt_bytes, EncryptedField};
use crate::crypto::CryptoError;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroizing;

/// Errors raised by a preference store
#[derive(Error, Debug)]
pub enum PreferencesError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed preferences file: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Device key at {0} is corrupt")]
    CorruptDeviceKey(PathBuf),

    #[error("Preferences lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, PreferencesError>;

/// Key-value store for secrets
pub trait SecurePreferences {
    /// Look up a value; `None` when the key was never set
    fn get_string(&self, key: &str) -> Result<Option<Zeroizing<String>>>;

    fn put_string(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    fn clear(&self) -> Result<()>;
}

/// Process-local preferences, mostly for tests and embedding
#[derive(Default)]
pub struct InMemoryPreferences {
    values: RwLock<HashMap<String, Zeroizing<String>>>,
}

impl InMemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preferences pre-populated with one value
    pub fn with_value(key: &str, value: &str) -> Self {
        let prefs = Self::new();
        if let Ok(mut values) = prefs.values.write() {
            values.insert(key.to_string(), Zeroizing::new(value.to_string()));
        }
        prefs
    }
}

impl SecurePreferences for InMemoryPreferences {
    fn get_string(&self, key: &str) -> Result<Option<Zeroizing<String>>> {
        let values = self.values.read().map_err(|_| PreferencesError::LockPoisoned)?;
        Ok(values.get(key).cloned())
    }

    fn put_string(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.write().map_err(|_| PreferencesError::LockPoisoned)?;
        values.insert(key.to_string(), Zeroizing::new(value.to_string()));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.write().map_err(|_| PreferencesError::LockPoisoned)?;
        values.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut values = self.values.write().map_err(|_| PreferencesError::LockPoisoned)?;
        values.clear();
        Ok(())
    }
}

/// Encrypted preferences persisted on disk
pub struct FilePreferences {
    path: PathBuf,
    device_key_path: PathBuf,
    write_lock: RwLock<()>,
}

impl FilePreferences {
    pub fn new(path: impl Into<PathBuf>, device_key_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            device_key_path: device_key_path.into(),
            write_lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, EncryptedField>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_entries(&self, entries: &BTreeMap<String, EncryptedField>) -> Result<()> {
        let json = serde_json::to_vec_pretty(entries)?;
        write_private(&self.path, &json)
    }

    /// Device key, created on first write
    fn device_key(&self, create: bool) -> Result<Option<Zeroizing<[u8; 32]>>> {
        match fs::read(&self.device_key_path) {
            Ok(bytes) => {
                let bytes = Zeroizing::new(bytes);
                let key: [u8; 32] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| PreferencesError::CorruptDeviceKey(self.device_key_path.clone()))?;
                Ok(Some(Zeroizing::new(key)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && create => {
                debug!("Creating device key at {:?}", self.device_key_path);
                let key = Zeroizing::new(rand::random::<[u8; 32]>());
                write_private(&self.device_key_path, key.as_slice())?;
                Ok(Some(key))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl SecurePreferences for FilePreferences {
    fn get_string(&self, key: &str) -> Result<Option<Zeroizing<String>>> {
        let _guard = self.write_lock.read().map_err(|_| PreferencesError::LockPoisoned)?;

        let entries = self.read_entries()?;
        let Some(field) = entries.get(key) else {
            return Ok(None);
        };
        let Some(device_key) = self.device_key(false)? else {
            return Ok(None);
        };

        let bytes = decrypt_bytes(&device_key, field)?;
        let value = String::from_utf8(bytes)
            .map_err(|_| CryptoError::DecryptionFailed("Invalid UTF-8".to_string()))?;
        Ok(Some(Zeroizing::new(value)))
    }

    fn put_string(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.write().map_err(|_| PreferencesError::LockPoisoned)?;

        let device_key = self
            .device_key(true)?
            .ok_or_else(|| PreferencesError::CorruptDeviceKey(self.device_key_path.clone()))?;
        let mut entries = self.read_entries()?;
        entries.insert(key.to_string(), encrypt_bytes(&device_key, value.as_bytes())?);
        self.write_entries(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.write().map_err(|_| PreferencesError::LockPoisoned)?;

        let mut entries = self.read_entries()?;
        if entries.remove(key).is_some() {
            self.write_entries(&entries)?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.write().map_err(|_| PreferencesError::LockPoisoned)?;
        self.write_entries(&BTreeMap::new())
    }
}

/// Write a file readable only by the current user
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    Ok(())
}

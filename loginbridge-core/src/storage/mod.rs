//! Credential storage layer.
//!
//! [`LoginStore`] is the client surface the bridge talks to. The store is
//! locked by default; it must be unlocked with the store key before any
//! record can be read or written.

pub mod schema;
pub mod sqlite;

pub use schema::Database;
pub use sqlite::SqliteLoginStore;

use crate::crypto::CryptoError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by a credential store
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Store is locked")]
    Locked,

    #[error("Invalid store key")]
    InvalidKey,

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("No record with id {0}")]
    NotFound(String),

    #[error("A record with id {0} already exists")]
    IdCollision(String),

    #[error("Unsupported schema version: {0}")]
    UnsupportedSchema(i32),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// A credential record as persisted by the store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub id: String,
    pub hostname: String,
    pub username: String,
    pub password: String,
    pub form_submit_url: Option<String>,
    pub http_realm: Option<String>,
    pub times_used: i64,
    /// Milliseconds since the Unix epoch.
    pub time_created: i64,
    pub time_last_used: i64,
    pub time_password_changed: i64,
}

impl StoredCredential {
    /// Check the fields the store requires before a write
    pub fn validate(&self) -> Result<()> {
        if self.hostname.is_empty() {
            return Err(StorageError::InvalidRecord("hostname is empty".to_string()));
        }
        if self.password.is_empty() {
            return Err(StorageError::InvalidRecord("password is empty".to_string()));
        }
        Ok(())
    }
}

/// Client interface of a key-protected credential store
pub trait LoginStore {
    /// Unlock with the base64 store key; no-op if already unlocked
    fn unlock(&mut self, key: &str) -> Result<()>;

    /// Drop key material from memory
    fn lock(&mut self) -> Result<()>;

    fn is_locked(&self) -> bool;

    /// Mark a record as used now
    fn touch(&mut self, id: &str) -> Result<()>;

    /// All records whose hostname equals `hostname`
    fn get_by_hostname(&self, hostname: &str) -> Result<Vec<StoredCredential>>;

    fn get(&self, id: &str) -> Result<Option<StoredCredential>>;

    /// Insert a record, assigning an id when `record.id` is empty
    fn add(&mut self, record: StoredCredential) -> Result<String>;

    /// Replace the record with the same id
    fn update(&mut self, record: StoredCredential) -> Result<()>;
}

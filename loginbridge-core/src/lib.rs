//! Login Bridge Core Library
//!
//! Connects a browser engine's login autofill hooks to a key-protected
//! credential store. The store is unlocked only for the duration of a
//! single operation, using a key held in secured preferences.

pub mod autofill;
pub mod bridge;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod login;
pub mod platform;
pub mod preferences;
pub mod prompt;
pub mod storage;

pub use bridge::{CredentialBridge, PASSWORDS_KEY};
pub use config::{BridgeConfig, ConfigError};
pub use crypto::{CryptoError, StoreKey};
pub use engine::{EngineLoginBinding, LoginDelegate};
pub use login::{Hint, Login};
pub use preferences::{FilePreferences, InMemoryPreferences, PreferencesError, SecurePreferences};
pub use storage::{LoginStore, SqliteLoginStore, StorageError, StoredCredential};

use thiserror::Error;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// General error type for bridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Preferences error: {0}")]
    Preferences(#[from] PreferencesError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Background task failed: {0}")]
    Task(String),
}

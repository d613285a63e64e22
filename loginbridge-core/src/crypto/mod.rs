//! Cryptographic primitives for the credential store.
//!
//! This module provides:
//! - AES-256-GCM field encryption
//! - The store key / data key hierarchy
//! - Zeroizing key material

pub mod cipher;
pub mod keyring;

pub use cipher::{decrypt_to_string, encrypt_string, DataEncryptionKey, EncryptedField};
pub use keyring::{KeyHierarchy, StoreKey, WrappedKey};

use thiserror::Error;

/// Errors that can occur in cryptographic operations
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    #[error("Authentication failed - data may have been tampered with")]
    AuthenticationFailed,
}

/// Result type for crypto operations
pub type Result<T> = std::result::Result<T, CryptoError>;

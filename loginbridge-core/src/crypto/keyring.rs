//! Key hierarchy for the credential store.
//!
//! Unlock key (from secured preferences) → wraps → DEK → encrypts fields.
//!
//! The unlock key is a random 32-byte secret, base64 encoded so it can be
//! kept as a preference string.

use crate::crypto::{
    cipher::{decrypt_bytes, encrypt_bytes, DataEncryptionKey, EncryptedField},
    CryptoError, Result,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroizing, ZeroizeOnDrop};

/// The key that unlocks a credential store
#[derive(ZeroizeOnDrop)]
pub struct StoreKey {
    key: [u8; 32],
}

impl StoreKey {
    /// Generate a fresh random store key
    pub fn generate() -> Self {
        Self { key: rand::random() }
    }

    pub fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Parse the base64 preference form of the key
    pub fn from_encoded(encoded: &str) -> Result<Self> {
        let decoded = Zeroizing::new(
            STANDARD
                .decode(encoded.trim())
                .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))?,
        );

        let key: [u8; 32] = decoded
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength {
                expected: 32,
                got: decoded.len(),
            })?;

        Ok(Self { key })
    }

    /// Encode the key for storage as a preference string
    pub fn encode(&self) -> Zeroizing<String> {
        Zeroizing::new(STANDARD.encode(self.key))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

/// A DEK wrapped with the store key, safe to persist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WrappedKey {
    pub wrapped: EncryptedField,
}

/// Holds the unwrapped DEK while a store is unlocked
#[derive(Default)]
pub struct KeyHierarchy {
    dek: Option<DataEncryptionKey>,
}

impl KeyHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a DEK for a new store and wrap it with the store key
    ///
    /// The hierarchy is left unlocked.
    pub fn initialize(&mut self, store_key: &StoreKey) -> Result<WrappedKey> {
        let dek = DataEncryptionKey::generate();
        let wrapped = encrypt_bytes(store_key.as_bytes(), dek.as_bytes())?;
        self.dek = Some(dek);
        Ok(WrappedKey { wrapped })
    }

    /// Unwrap the stored DEK with the store key
    pub fn unlock(&mut self, store_key: &StoreKey, wrapped: &WrappedKey) -> Result<()> {
        let dek_bytes = Zeroizing::new(decrypt_bytes(store_key.as_bytes(), &wrapped.wrapped)?);

        let dek: [u8; 32] = dek_bytes.as_slice().try_into().map_err(|_| {
            CryptoError::DecryptionFailed(format!("Invalid DEK length: {}", dek_bytes.len()))
        })?;

        self.dek = Some(DataEncryptionKey::from_bytes(dek));
        Ok(())
    }

    /// Drop the DEK from memory
    pub fn lock(&mut self) {
        self.dek.take();
    }

    pub fn is_unlocked(&self) -> bool {
        self.dek.is_some()
    }

    /// Get the DEK (only available when unlocked)
    pub fn dek(&self) -> Option<&DataEncryptionKey> {
        self.dek.as_ref()
    }
}

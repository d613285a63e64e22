//! AES-256-GCM encryption of individual credential fields.
//!
//! Every field gets its own random 96-bit nonce. Empty plaintext is
//! allowed: the store keeps empty usernames as real encrypted values.

use crate::crypto::{CryptoError, Result};
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

const TAG_LEN: usize = 16;

/// Data encryption key (DEK) protecting credential fields
///
/// Stored only in wrapped form; present in memory while the store is unlocked.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DataEncryptionKey {
    key: [u8; 32],
}

impl DataEncryptionKey {
    /// Generate a new random data encryption key
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(&mut OsRng);
        Self { key: key.into() }
    }

    pub fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Get the raw key bytes (use sparingly)
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

/// An encrypted field with its nonce and tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedField {
    pub nonce: [u8; 12],
    pub ciphertext: Vec<u8>,
    pub auth_tag: [u8; 16],
}

/// Encrypt bytes under a 32-byte key
pub fn encrypt_bytes(key: &[u8; 32], plaintext: &[u8]) -> Result<EncryptedField> {
    let cipher = Aes256Gcm::new(key.into());
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let mut sealed = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    // AES-GCM appends the tag to the ciphertext
    if sealed.len() < TAG_LEN {
        return Err(CryptoError::EncryptionFailed(
            "Ciphertext too short - missing auth tag".to_string(),
        ));
    }
    let tag_start = sealed.len() - TAG_LEN;
    let auth_tag: [u8; 16] = sealed[tag_start..]
        .try_into()
        .map_err(|_| CryptoError::EncryptionFailed("Invalid auth tag length".to_string()))?;
    sealed.truncate(tag_start);

    Ok(EncryptedField {
        nonce: nonce.into(),
        ciphertext: sealed,
        auth_tag,
    })
}

/// Decrypt and authenticate a field
pub fn decrypt_bytes(key: &[u8; 32], field: &EncryptedField) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(key.into());
    let nonce = Nonce::from(field.nonce);

    let mut sealed = Vec::with_capacity(field.ciphertext.len() + TAG_LEN);
    sealed.extend_from_slice(&field.ciphertext);
    sealed.extend_from_slice(&field.auth_tag);

    cipher
        .decrypt(&nonce, sealed.as_slice())
        .map_err(|_| CryptoError::AuthenticationFailed)
}

/// Encrypt a string field with the DEK
pub fn encrypt_string(dek: &DataEncryptionKey, plaintext: &str) -> Result<EncryptedField> {
    encrypt_bytes(dek.as_bytes(), plaintext.as_bytes())
}

/// Decrypt a string field with the DEK
pub fn decrypt_to_string(dek: &DataEncryptionKey, field: &EncryptedField) -> Result<String> {
    let bytes = decrypt_bytes(dek.as_bytes(), field)?;
    String::from_utf8(bytes).map_err(|_| CryptoError::DecryptionFailed("Invalid UTF-8".to_string()))
}

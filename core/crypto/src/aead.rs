//! Authenticated encryption using AES-256-GCM.
//!
//! AES-GCM provides both confidentiality and authenticity. Decryption
//! fails closed whenever the tag does not verify.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key,
};

use crate::keys::{Nonce, RecordKey};
use trouprive_common::{Error, Result};

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// Encrypt plaintext under a record key and nonce.
///
/// # Postconditions
/// - Returns ciphertext || tag
/// - The output length is plaintext length + TAG_SIZE
///
/// # Security
/// - Caller is responsible for never reusing `nonce` with `key`
pub fn encrypt(key: &RecordKey, nonce: &Nonce, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    cipher
        .encrypt(aes_gcm::Nonce::from_slice(nonce.as_bytes()), plaintext)
        .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))
}

/// Decrypt ciphertext || tag under a record key and nonce.
///
/// # Errors
/// - Returns `Decryption` if the input is shorter than a tag
/// - Returns `Decryption` if authentication fails (wrong key or tampered data)
pub fn decrypt(key: &RecordKey, nonce: &Nonce, ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() < TAG_SIZE {
        return Err(Error::Decryption);
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    cipher
        .decrypt(aes_gcm::Nonce::from_slice(nonce.as_bytes()), ciphertext)
        .map_err(|_| Error::Decryption)
}

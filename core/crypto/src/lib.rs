//! Cryptographic primitives for the Trouprive vault.
//!
//! This module provides:
//! - Key derivation using PBKDF2-HMAC-SHA256
//! - Authenticated encryption using AES-256-GCM
//! - The self-describing encrypted record format (salt, iv, ciphertext)
//! - Base64 helpers for the record fields
//!
//! # Security Guarantees
//! - Every encryption uses a fresh random salt and nonce
//! - Derived keys are never cached and are zeroized on drop
//! - Decryption failures are reported without saying why
//! - No plaintext or key material is ever logged

pub mod aead;
pub mod codec;
pub mod engine;
pub mod kdf;
pub mod keys;
pub mod record;

pub use engine::{decrypt, encrypt};
pub use kdf::{derive_key, KdfParams};
pub use keys::{Nonce, RecordKey, Salt};
pub use record::EncryptedRecord;

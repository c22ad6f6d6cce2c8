//! Common error types for the vault core.

use thiserror::Error;

/// Message shown for every record decryption failure.
///
/// Wrong password, tampered ciphertext and malformed input all map here.
pub const DECRYPTION_FAILED: &str = "Decryption failed. Invalid password or corrupted data.";

/// Top-level error type for vault operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Key derivation could not run.
    #[error("Key derivation error: {0}")]
    Derivation(String),

    /// Encryption failed, or the worker running a crypto task died.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// A record could not be decrypted.
    #[error("{}", DECRYPTION_FAILED)]
    Decryption,

    /// A record failed to decrypt while re-encrypting the vault.
    #[error("Re-encryption aborted: item {item_id} could not be decrypted with the current password")]
    Rekey { item_id: String },

    /// Decrypted content does not have the shape its item type requires.
    #[error("Item {item_id} has malformed content: {reason}")]
    Parse { item_id: String, reason: String },

    /// Some records in a full pass could not be decrypted.
    #[error(
        "Failed to decrypt {} item(s). They may be placeholders, corrupted, or were encrypted with a different password.",
        .failed.len()
    )]
    PartialDecryption { failed: Vec<String> },

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation not permitted in the current session state.
    #[error("Not permitted: {0}")]
    NotPermitted(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the caller must treat the session as compromised and lock it.
    pub fn requires_lock(&self) -> bool {
        matches!(self, Error::Rekey { .. })
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

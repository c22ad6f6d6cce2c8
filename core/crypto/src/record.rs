//! Serialized form of an encrypted record.
//!
//! ```json
//! { "iv": "<base64>", "salt": "<base64>", "ciphertext": "<base64 of ciphertext||tag>" }
//! ```

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::keys::{Nonce, Salt, NONCE_LENGTH, SALT_LENGTH};
use trouprive_common::{Error, Result};

/// A self-describing encrypted record.
///
/// Carries everything needed to decrypt except the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedRecord {
    /// Base64 AES-GCM nonce. Older writers call it `nonce`.
    #[serde(alias = "nonce")]
    pub iv: String,
    /// Base64 PBKDF2 salt.
    pub salt: String,
    /// Base64 ciphertext with the authentication tag appended.
    pub ciphertext: String,
}

impl EncryptedRecord {
    /// Build a record from raw parts.
    pub fn new(salt: &Salt, nonce: &Nonce, ciphertext: &[u8]) -> Self {
        Self {
            iv: codec::encode(nonce.as_bytes()),
            salt: codec::encode(salt.as_bytes()),
            ciphertext: codec::encode(ciphertext),
        }
    }

    /// Decode the base64 fields.
    ///
    /// # Errors
    /// - Returns `Decryption` if any field is not valid base64
    /// - Returns `Decryption` if the salt or nonce has the wrong length
    pub fn decode(&self) -> Result<(Salt, Nonce, Vec<u8>)> {
        let salt = codec::decode_array::<SALT_LENGTH>(&self.salt).map_err(|_| Error::Decryption)?;
        let nonce = codec::decode_array::<NONCE_LENGTH>(&self.iv).map_err(|_| Error::Decryption)?;
        let ciphertext = codec::decode(&self.ciphertext).map_err(|_| Error::Decryption)?;

        Ok((Salt::from_bytes(salt), Nonce::from_bytes(nonce), ciphertext))
    }

    /// Serialize to the JSON string stored in `encryptedContent`.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Parse a stored record.
    ///
    /// Malformed input is reported as `Decryption`, never as a parse
    /// error, so callers cannot tell it apart from a wrong password.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|_| Error::Decryption)
    }
}

//! Key derivation using PBKDF2-HMAC-SHA256.
//!
//! PBKDF2 is deliberately slow: every encrypt and decrypt pays the full
//! iteration count, which is what makes offline guessing expensive.

use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::keys::{RecordKey, Salt, KEY_LENGTH};
use trouprive_common::{Error, Result};

/// Iteration count used by the persisted record format.
pub const DEFAULT_ITERATIONS: u32 = 150_000;

/// Lowest iteration count accepted for derivation.
pub const MIN_ITERATIONS: u32 = 100_000;

/// Parameters for PBKDF2 key derivation.
///
/// Records do not carry their parameters, so a vault must always be read
/// with the parameters it was written with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Number of HMAC-SHA256 iterations.
    pub iterations: u32,
}

impl KdfParams {
    /// Create parameters with an explicit iteration count.
    ///
    /// # Errors
    /// - Returns error if `iterations` is below [`MIN_ITERATIONS`]
    pub fn new(iterations: u32) -> Result<Self> {
        let params = Self { iterations };
        params.validate()?;
        Ok(params)
    }

    /// Parameters matching the existing record format (150,000 rounds).
    pub fn standard() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }

    /// Stronger parameters for new vaults that do not need to interoperate.
    pub fn hardened() -> Self {
        Self {
            iterations: 600_000,
        }
    }

    /// Check the parameters are usable.
    pub fn validate(&self) -> Result<()> {
        if self.iterations < MIN_ITERATIONS {
            return Err(Error::Derivation(format!(
                "Iteration count {} is below the minimum of {}",
                self.iterations, MIN_ITERATIONS
            )));
        }
        Ok(())
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::standard()
    }
}

/// Derive a record key from a password and salt using PBKDF2-HMAC-SHA256.
///
/// # Preconditions
/// - `password` must not be empty
/// - `params` must pass [`KdfParams::validate`]
///
/// # Postconditions
/// - Returns a 256-bit key
/// - The derived key is deterministic given the same inputs
///
/// # Errors
/// - Returns `InvalidInput` if password is empty
/// - Returns `Derivation` if the iteration count is too low
pub fn derive_key(password: &[u8], salt: &Salt, params: &KdfParams) -> Result<RecordKey> {
    if password.is_empty() {
        return Err(Error::InvalidInput("Password cannot be empty".to_string()));
    }
    params.validate()?;

    let mut key_bytes = [0u8; KEY_LENGTH];
    pbkdf2_hmac::<Sha256>(password, salt.as_bytes(), params.iterations, &mut key_bytes);

    let key = RecordKey::from_bytes(key_bytes);
    key_bytes.zeroize();
    Ok(key)
}

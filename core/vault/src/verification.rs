//! Vault verification record.
//!
//! A fixed string encrypted under the master password when the vault is
//! first configured. Checking a password against it works whether or not
//! the vault holds any items.

use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::cipher::SecretCipher;
use trouprive_common::Result;

/// Plaintext sealed into the verification record.
pub const VERIFICATION_PLAINTEXT: &str = "trouprive-vault-check";

/// Encrypt a verification record under `password`.
pub async fn seal_verification(cipher: &dyn SecretCipher, password: &str) -> Result<String> {
    cipher.encrypt(VERIFICATION_PLAINTEXT, password).await
}

/// Check `password` opens `record` to the verification plaintext.
pub async fn check_verification(cipher: &dyn SecretCipher, record: &str, password: &str) -> bool {
    match cipher.decrypt(record, password).await {
        Ok(plaintext) => {
            let plaintext = Zeroizing::new(plaintext);
            plaintext
                .as_bytes()
                .ct_eq(VERIFICATION_PLAINTEXT.as_bytes())
                .into()
        }
        Err(_) => false,
    }
}

//! Password-based encryption of text records.
//!
//! Each call derives a fresh key from the password and a new random salt,
//! then seals the UTF-8 bytes with AES-256-GCM under a new random nonce.
//! Nothing is cached between calls.

use zeroize::Zeroize;

use crate::aead;
use crate::kdf::{derive_key, KdfParams};
use crate::keys::{Nonce, Salt, SALT_LENGTH};
use crate::record::EncryptedRecord;
use trouprive_common::{Error, Result};

/// Encrypt bytes into a record.
///
/// # Postconditions
/// - Salt and nonce are freshly generated
/// - The derived key is dropped (and zeroized) before returning
pub fn seal(plaintext: &[u8], password: &[u8], params: &KdfParams) -> Result<EncryptedRecord> {
    let salt = Salt::generate();
    let nonce = Nonce::generate();

    let key = derive_key(password, &salt, params)?;
    let ciphertext = aead::encrypt(&key, &nonce, plaintext)?;

    Ok(EncryptedRecord::new(&salt, &nonce, &ciphertext))
}

/// Decrypt a record into bytes.
///
/// Malformed records still pay for a key derivation before they are
/// rejected, so timing does not separate them from a wrong password.
pub fn open(record: &EncryptedRecord, password: &[u8], params: &KdfParams) -> Result<Vec<u8>> {
    let (salt, nonce, ciphertext) = match record.decode() {
        Ok(parts) => parts,
        Err(e) => return Err(reject_malformed(password, params, e)),
    };
    let key = derive_key(password, &salt, params)?;
    aead::decrypt(&key, &nonce, &ciphertext)
}

/// Run a throwaway derivation, then hand back `error`.
fn reject_malformed(password: &[u8], params: &KdfParams, error: Error) -> Error {
    let _ = derive_key(password, &Salt::from_bytes([0u8; SALT_LENGTH]), params);
    error
}

/// Encrypt text and serialize the record as JSON.
///
/// # Errors
/// - Returns `InvalidInput` if password is empty
/// - Returns `Derivation` if `params` are rejected
/// - Returns `Crypto` if encryption fails
pub fn encrypt(plaintext: &str, password: &[u8], params: &KdfParams) -> Result<String> {
    seal(plaintext.as_bytes(), password, params)?.to_json()
}

/// Parse a serialized record and decrypt it to text.
///
/// # Errors
/// - Returns `Decryption` for a wrong password, tampered data, malformed
///   JSON or base64, wrong field lengths, or non-UTF-8 plaintext. The
///   cause is not reported.
pub fn decrypt(serialized: &str, password: &[u8], params: &KdfParams) -> Result<String> {
    let record = match EncryptedRecord::from_json(serialized) {
        Ok(record) => record,
        Err(e) => return Err(reject_malformed(password, params, e)),
    };
    let plaintext = open(&record, password, params)?;

    String::from_utf8(plaintext).map_err(|e| {
        e.into_bytes().zeroize();
        Error::Decryption
    })
}

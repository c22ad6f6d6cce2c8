//! Base64 helpers for record fields.
//!
//! Standard alphabet with padding, matching what browsers produce with `btoa`.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use trouprive_common::{Error, Result};

/// Encode bytes as padded standard base64.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode padded standard base64.
pub fn decode(encoded: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(encoded)
        .map_err(|e| Error::Serialization(format!("Invalid base64: {}", e)))
}

/// Decode base64 into a fixed-size array.
///
/// # Errors
/// - Returns error if the input is not valid base64
/// - Returns error if the decoded length is not exactly `N`
pub fn decode_array<const N: usize>(encoded: &str) -> Result<[u8; N]> {
    let bytes = decode(encoded)?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        Error::Serialization(format!(
            "Invalid length: expected {} bytes, got {}",
            N,
            bytes.len()
        ))
    })
}

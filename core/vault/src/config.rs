//! Vault engine configuration.

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;

use crate::content::ContentParsing;
use trouprive_common::{Error, Result};
use trouprive_crypto::KdfParams;

/// Fallback concurrency when the host parallelism is unknown.
const FALLBACK_CONCURRENCY: usize = 4;

/// Tunables shared by the cipher, rekeyer and view.
///
/// Missing fields take their defaults, so an empty JSON object is a valid
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Key derivation parameters. Must match those the vault was written with.
    pub kdf_params: KdfParams,
    /// Upper bound on records derived and decrypted at once.
    pub max_concurrency: usize,
    /// How decrypted plaintext is interpreted.
    pub content_parsing: ContentParsing,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            kdf_params: KdfParams::standard(),
            max_concurrency: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(FALLBACK_CONCURRENCY),
            content_parsing: ContentParsing::default(),
        }
    }
}

impl VaultConfig {
    /// Set key derivation parameters.
    pub fn with_kdf_params(mut self, params: KdfParams) -> Self {
        self.kdf_params = params;
        self
    }

    /// Set the concurrency bound.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Set the content parsing mode.
    pub fn with_content_parsing(mut self, parsing: ContentParsing) -> Self {
        self.content_parsing = parsing;
        self
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        self.kdf_params.validate()?;
        if self.max_concurrency == 0 {
            return Err(Error::InvalidInput(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Serialize configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize and validate configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Deserialize and validate configuration from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let config: Self =
            serde_json::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file.
    ///
    /// # Errors
    /// - File cannot be read
    /// - Invalid JSON or invalid values
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

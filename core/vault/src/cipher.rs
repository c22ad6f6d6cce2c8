//! Async encryption seam used by the session, rekeyer and view.
//!
//! Key derivation is deliberately slow, so [`PasswordCipher`] runs every
//! operation on tokio's blocking pool and the caller simply awaits it.

use async_trait::async_trait;
use zeroize::Zeroizing;

use crate::config::VaultConfig;
use trouprive_common::{Error, Password, Result};
use trouprive_crypto::{engine, KdfParams};

/// Password-based encryption of record text.
///
/// Implementations must fail every bad decryption with
/// [`Error::Decryption`] and must not cache derived keys.
#[async_trait]
pub trait SecretCipher: Send + Sync {
    /// Encrypt `plaintext` under `password`, returning the serialized record.
    async fn encrypt(&self, plaintext: &str, password: &str) -> Result<String>;

    /// Decrypt a serialized record with `password`.
    async fn decrypt(&self, serialized: &str, password: &str) -> Result<String>;
}

/// [`SecretCipher`] backed by PBKDF2 + AES-256-GCM.
#[derive(Debug, Clone, Default)]
pub struct PasswordCipher {
    params: KdfParams,
}

impl PasswordCipher {
    /// Create a cipher with explicit derivation parameters.
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }

    /// Create a cipher from vault configuration.
    pub fn from_config(config: &VaultConfig) -> Self {
        Self::new(config.kdf_params.clone())
    }

    /// Derivation parameters in use.
    pub fn params(&self) -> &KdfParams {
        &self.params
    }
}

#[async_trait]
impl SecretCipher for PasswordCipher {
    async fn encrypt(&self, plaintext: &str, password: &str) -> Result<String> {
        let plaintext = Zeroizing::new(plaintext.to_owned());
        let password = Password::new(password);
        let params = self.params.clone();

        run_blocking(move || engine::encrypt(&plaintext, password.as_bytes(), &params)).await
    }

    async fn decrypt(&self, serialized: &str, password: &str) -> Result<String> {
        let serialized = serialized.to_owned();
        let password = Password::new(password);
        let params = self.params.clone();

        run_blocking(move || engine::decrypt(&serialized, password.as_bytes(), &params)).await
    }
}

async fn run_blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| Error::Crypto(format!("Crypto task failed: {}", e)))?
}

//! Master password change.
//!
//! Every item is decrypted with the old password and re-encrypted with the
//! new one. The result is all-or-nothing: either every item comes back
//! under the new password or the caller gets an error and keeps its
//! unchanged collection.

use futures::stream::{self, StreamExt, TryStreamExt};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::cipher::SecretCipher;
use crate::config::VaultConfig;
use crate::item::VaultItem;
use trouprive_common::{Error, Password, Result};

/// A user's request to change the master password.
#[derive(Clone)]
pub struct PasswordChange {
    current: Password,
    new_password: Password,
    confirmation: Password,
}

impl PasswordChange {
    /// Build a request from the three form fields.
    pub fn new(current: &str, new_password: &str, confirmation: &str) -> Self {
        Self {
            current: Password::new(current),
            new_password: Password::new(new_password),
            confirmation: Password::new(confirmation),
        }
    }

    /// Password the user claims is current.
    pub fn current(&self) -> &str {
        self.current.as_str()
    }

    /// Requested new password.
    pub fn new_password(&self) -> &str {
        self.new_password.as_str()
    }

    /// Check the request against the session password.
    ///
    /// # Errors
    /// - Any field empty
    /// - Confirmation differs from the new password
    /// - New password equals the current one
    /// - Current password does not match `session_password`
    pub fn validate(&self, session_password: &Password) -> Result<()> {
        if self.current.is_empty() || self.new_password.is_empty() || self.confirmation.is_empty()
        {
            return Err(Error::InvalidInput("All fields are required.".to_string()));
        }
        if !self.new_password.matches(self.confirmation.as_str()) {
            return Err(Error::InvalidInput(
                "New passwords do not match.".to_string(),
            ));
        }
        if self.new_password.matches(self.current.as_str()) {
            return Err(Error::InvalidInput(
                "New password must be different from the current password.".to_string(),
            ));
        }
        if !session_password.matches(self.current.as_str()) {
            return Err(Error::InvalidInput(
                "The current password you entered is incorrect.".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for PasswordChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordChange").finish_non_exhaustive()
    }
}

/// Re-encrypts a whole item collection under a new password.
#[derive(Clone)]
pub struct VaultRekeyer {
    cipher: Arc<dyn SecretCipher>,
    concurrency: usize,
}

impl VaultRekeyer {
    /// Create a rekeyer running at most `concurrency` items at once.
    pub fn new(cipher: Arc<dyn SecretCipher>, concurrency: usize) -> Self {
        Self {
            cipher,
            concurrency: concurrency.max(1),
        }
    }

    /// Create a rekeyer using the configured concurrency bound.
    pub fn from_config(cipher: Arc<dyn SecretCipher>, config: &VaultConfig) -> Self {
        Self::new(cipher, config.max_concurrency)
    }

    /// Re-encrypt every item from `old_password` to `new_password`.
    ///
    /// # Postconditions
    /// - On success, the output has the same items in the same order with
    ///   only `encrypted_content` replaced
    /// - On failure, nothing is returned and `items` is untouched
    ///
    /// # Errors
    /// - Returns `InvalidInput` if either password is empty
    /// - Returns `Rekey` naming the first item that could not be decrypted
    /// - Returns the cipher's error if re-encryption itself fails
    pub async fn reencrypt_all(
        &self,
        old_password: &str,
        new_password: &str,
        items: &[VaultItem],
    ) -> Result<Vec<VaultItem>> {
        if old_password.is_empty() || new_password.is_empty() {
            return Err(Error::InvalidInput(
                "Both the old and new password are required".to_string(),
            ));
        }

        debug!(items = items.len(), "Re-encrypting vault items");

        let tasks: Vec<_> = items
            .iter()
            .map(|item| self.rekey_item(item, old_password, new_password))
            .collect();

        stream::iter(tasks)
            .buffered(self.concurrency)
            .try_collect::<Vec<_>>()
            .await
            .inspect_err(|e| warn!(error = %e, "Re-encryption aborted"))
    }

    async fn rekey_item(
        &self,
        item: &VaultItem,
        old_password: &str,
        new_password: &str,
    ) -> Result<VaultItem> {
        let plaintext = match self.cipher.decrypt(&item.encrypted_content, old_password).await {
            Ok(plaintext) => Zeroizing::new(plaintext),
            Err(_) => {
                return Err(Error::Rekey {
                    item_id: item.id.clone(),
                })
            }
        };
        let encrypted = self.cipher.encrypt(&plaintext, new_password).await?;

        Ok(item.with_encrypted_content(encrypted))
    }
}

impl fmt::Debug for VaultRekeyer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultRekeyer")
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

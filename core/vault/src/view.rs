//! Decrypted view of the vault.
//!
//! The view decrypts the whole collection in one pass and caches the
//! result until the password or the collection changes. It fails closed:
//! if any item cannot be decrypted or parsed, nothing is shown.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use futures::stream::{self, StreamExt};
use rand::RngCore;
use std::fmt;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::cipher::SecretCipher;
use crate::config::VaultConfig;
use crate::content::{ContentParsing, DecryptedContent};
use crate::item::{ItemKind, VaultItem};
use crate::session::SessionAuthenticator;
use trouprive_common::{Error, Password, Result};

type Fingerprint = [u8; 32];

const FINGERPRINT_KEY_LENGTH: usize = 32;

/// A vault item with its content decrypted and parsed.
#[derive(Debug, Clone)]
pub struct DecryptedItem {
    pub id: String,
    pub name: String,
    pub kind: ItemKind,
    pub website: Option<String>,
    pub content: DecryptedContent,
}

/// Decrypt and parse every item with `password`.
///
/// At most `concurrency` items are decrypted at once. Output order matches
/// `items`.
///
/// # Errors
/// - Returns `PartialDecryption` listing every item that failed to decrypt
/// - Returns `Parse` for the first item whose content does not match its kind
pub async fn decrypt_all(
    cipher: &dyn SecretCipher,
    password: &str,
    items: &[VaultItem],
    parsing: ContentParsing,
    concurrency: usize,
) -> Result<Vec<DecryptedItem>> {
    let tasks: Vec<_> = items
        .iter()
        .map(|item| decrypt_item(cipher, password, item))
        .collect();
    let outcomes: Vec<(&VaultItem, Result<Zeroizing<String>>)> = stream::iter(tasks)
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let failed: Vec<String> = outcomes
        .iter()
        .filter(|(_, plaintext)| plaintext.is_err())
        .map(|(item, _)| item.id.clone())
        .collect();
    if !failed.is_empty() {
        warn!(
            failed = failed.len(),
            total = items.len(),
            "Some items could not be decrypted"
        );
        return Err(Error::PartialDecryption { failed });
    }

    outcomes
        .into_iter()
        .map(|(item, plaintext)| {
            let plaintext = plaintext?;
            let content =
                DecryptedContent::from_plaintext(&item.id, item.kind, &plaintext, parsing)?;
            Ok(DecryptedItem {
                id: item.id.clone(),
                name: item.name.clone(),
                kind: item.kind,
                website: item.website.clone(),
                content,
            })
        })
        .collect()
}

async fn decrypt_item<'a>(
    cipher: &dyn SecretCipher,
    password: &str,
    item: &'a VaultItem,
) -> (&'a VaultItem, Result<Zeroizing<String>>) {
    let plaintext = cipher
        .decrypt(&item.encrypted_content, password)
        .await
        .map(Zeroizing::new);
    (item, plaintext)
}

/// Cached decrypted view over the item collection.
pub struct DecryptedView {
    cipher: Arc<dyn SecretCipher>,
    parsing: ContentParsing,
    concurrency: usize,
    fingerprint_key: Zeroizing<[u8; FINGERPRINT_KEY_LENGTH]>,
    fingerprint: Option<Fingerprint>,
    items: Vec<DecryptedItem>,
    error: Option<String>,
}

impl DecryptedView {
    /// Create an empty view.
    pub fn new(cipher: Arc<dyn SecretCipher>, config: &VaultConfig) -> Self {
        let mut fingerprint_key = Zeroizing::new([0u8; FINGERPRINT_KEY_LENGTH]);
        rand::thread_rng().fill_bytes(&mut *fingerprint_key);

        Self {
            cipher,
            parsing: config.content_parsing,
            concurrency: config.max_concurrency.max(1),
            fingerprint_key,
            fingerprint: None,
            items: Vec::new(),
            error: None,
        }
    }

    /// Bring the view up to date with the session password and `items`.
    ///
    /// A locked session empties the view without decrypting anything.
    pub async fn refresh(
        &mut self,
        session: &SessionAuthenticator,
        items: &[VaultItem],
    ) -> Result<&[DecryptedItem]> {
        let password = session.current_password().await;
        self.refresh_with(password.as_ref().map(Password::as_str), items)
            .await
    }

    /// Bring the view up to date with an explicit password.
    ///
    /// # Errors
    /// - Returns `PartialDecryption` or `Parse`; the view is emptied and
    ///   [`DecryptedView::error`] holds the message
    pub async fn refresh_with(
        &mut self,
        password: Option<&str>,
        items: &[VaultItem],
    ) -> Result<&[DecryptedItem]> {
        let Some(password) = password.filter(|p| !p.is_empty()) else {
            self.clear();
            return Ok(&self.items);
        };

        let fingerprint = fingerprint(&self.fingerprint_key, password, items);
        let unchanged = self
            .fingerprint
            .as_ref()
            .is_some_and(|cached| bool::from(cached.as_slice().ct_eq(fingerprint.as_slice())));
        if unchanged {
            debug!("Vault view is current");
            return Ok(&self.items);
        }

        let result = decrypt_all(
            self.cipher.as_ref(),
            password,
            items,
            self.parsing,
            self.concurrency,
        )
        .await;

        match result {
            Ok(decrypted) => {
                debug!(items = decrypted.len(), "Vault view refreshed");
                self.items = decrypted;
                self.fingerprint = Some(fingerprint);
                self.error = None;
                Ok(&self.items)
            }
            Err(e) => {
                self.items.clear();
                self.fingerprint = None;
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Decrypted items, in collection order.
    pub fn items(&self) -> &[DecryptedItem] {
        &self.items
    }

    /// Look up a decrypted item by id.
    pub fn get(&self, id: &str) -> Option<&DecryptedItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Message of the last failed refresh.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Drop all decrypted content.
    pub fn clear(&mut self) {
        self.items.clear();
        self.fingerprint = None;
        self.error = None;
    }
}

impl fmt::Debug for DecryptedView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptedView")
            .field("parsing", &self.parsing)
            .field("concurrency", &self.concurrency)
            .field("items", &self.items.len())
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

/// Keyed digest of everything a view depends on. Fields are
/// length-prefixed; the key is random per view and never leaves it.
fn fingerprint(
    key: &[u8; FINGERPRINT_KEY_LENGTH],
    password: &str,
    items: &[VaultItem],
) -> Fingerprint {
    let mut hasher = Blake2b::<U32>::new();
    let mut field = |bytes: &[u8]| {
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    };

    field(key.as_slice());
    field(password.as_bytes());
    for item in items {
        field(item.id.as_bytes());
        field(item.name.as_bytes());
        field(item.kind.as_str().as_bytes());
        field(item.website.as_deref().unwrap_or_default().as_bytes());
        field(item.encrypted_content.as_bytes());
    }

    hasher.finalize().into()
}

//! Vault session management.
//!
//! The session holds the master password in memory and nothing else. Keys
//! are derived per record on demand and never kept. The password is
//! zeroized when the session is locked or dropped.

use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::cipher::SecretCipher;
use crate::content::{DecryptedContent, ItemDraft};
use crate::item::VaultItem;
use crate::rekey::{PasswordChange, VaultRekeyer};
use crate::verification::{check_verification, seal_verification};
use trouprive_common::{Error, Password, Result};

/// Session handle for correlating log lines of one unlock.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandle(String);

impl SessionHandle {
    /// Generate a new unique session handle.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the handle string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// State of the vault session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No password held.
    Locked,
    /// A candidate password is being checked.
    Verifying,
    /// Password held and usable.
    Unlocked,
}

#[derive(Default)]
struct SessionInner {
    password: Option<Password>,
    handle: Option<SessionHandle>,
    verifying: bool,
    verification_error: Option<String>,
    /// Bumped on every lock. Operations started before a lock must not
    /// unlock after it.
    epoch: u64,
}

impl SessionInner {
    fn state(&self) -> SessionState {
        if self.verifying {
            SessionState::Verifying
        } else if self.password.is_some() {
            SessionState::Unlocked
        } else {
            SessionState::Locked
        }
    }

    fn lock(&mut self) {
        // Password zeroizes on drop.
        self.password = None;
        self.handle = None;
        self.verifying = false;
        self.epoch = self.epoch.wrapping_add(1);
    }
}

/// What a candidate password is checked against.
enum Reference<'a> {
    /// Nothing to check, first-time setup.
    Empty,
    /// Any item record; decrypting it is enough.
    Item(&'a str),
    /// The vault verification record.
    Verification(&'a str),
}

/// Owner of the in-memory master password.
///
/// Create one per running application and pass it to whatever needs the
/// vault. Dropping it forgets the password.
pub struct SessionAuthenticator {
    cipher: Arc<dyn SecretCipher>,
    inner: RwLock<SessionInner>,
}

impl SessionAuthenticator {
    /// Create a locked session.
    pub fn new(cipher: Arc<dyn SecretCipher>) -> Self {
        Self {
            cipher,
            inner: RwLock::new(SessionInner::default()),
        }
    }

    /// The cipher this session encrypts and verifies with.
    pub fn cipher(&self) -> &Arc<dyn SecretCipher> {
        &self.cipher
    }

    /// Current session state.
    pub async fn state(&self) -> SessionState {
        self.inner.read().await.state()
    }

    /// Check if a password is held.
    pub async fn is_unlocked(&self) -> bool {
        self.state().await == SessionState::Unlocked
    }

    /// Handle of the current unlock, if any.
    pub async fn handle(&self) -> Option<SessionHandle> {
        self.inner.read().await.handle.clone()
    }

    /// Message from the last failed verification.
    pub async fn verification_error(&self) -> Option<String> {
        self.inner.read().await.verification_error.clone()
    }

    /// The session password.
    ///
    /// # Errors
    /// - Returns `NotPermitted` if the session is locked
    pub async fn password(&self) -> Result<Password> {
        self.current_password()
            .await
            .ok_or_else(|| Error::NotPermitted("Vault is locked".to_string()))
    }

    pub(crate) async fn current_password(&self) -> Option<Password> {
        let inner = self.inner.read().await;
        if inner.verifying {
            return None;
        }
        inner.password.clone()
    }

    /// Check `candidate` against the vault and unlock on success.
    ///
    /// Only the first item is decrypted, however many there are. With no
    /// items there is nothing to check against, so any non-empty password
    /// is accepted and becomes the vault password.
    ///
    /// # Postconditions
    /// - On `true`, the session is unlocked with `candidate`
    /// - On `false`, the session is locked and `candidate` is not retained
    /// - A [`clear_password`](Self::clear_password) during the check wins:
    ///   the session stays locked and `false` is returned
    pub async fn verify_and_set_password(&self, candidate: &str, items: &[VaultItem]) -> bool {
        let reference = match items.first() {
            Some(item) => Reference::Item(&item.encrypted_content),
            None => Reference::Empty,
        };
        self.verify(candidate, reference).await
    }

    /// Check `candidate` against a verification record from
    /// [`set_initial_password`](Self::set_initial_password) and unlock on
    /// success. Same postconditions as
    /// [`verify_and_set_password`](Self::verify_and_set_password).
    pub async fn verify_with_record(&self, candidate: &str, verification: &str) -> bool {
        self.verify(candidate, Reference::Verification(verification)).await
    }

    /// Configure a new vault: seal a verification record under `password`
    /// and unlock with it. The host persists the returned record.
    ///
    /// # Errors
    /// - Returns `InvalidInput` if `password` is empty
    /// - Encryption failure
    pub async fn set_initial_password(&self, password: &str) -> Result<String> {
        if password.is_empty() {
            return Err(Error::InvalidInput("Password cannot be empty".to_string()));
        }

        let record = seal_verification(self.cipher.as_ref(), password).await?;
        self.unlock(Password::new(password)).await;
        info!("Vault configured");
        Ok(record)
    }

    async fn verify(&self, candidate: &str, reference: Reference<'_>) -> bool {
        if candidate.is_empty() {
            self.fail_verification("Password cannot be empty.").await;
            return false;
        }

        let epoch = {
            let mut inner = self.inner.write().await;
            inner.verifying = true;
            inner.verification_error = None;
            inner.epoch
        };

        let verified = match reference {
            Reference::Empty => {
                debug!("No items to verify against, accepting password for new vault");
                true
            }
            Reference::Item(record) => self
                .cipher
                .decrypt(record, candidate)
                .await
                .map(Zeroizing::new)
                .is_ok(),
            Reference::Verification(record) => {
                check_verification(self.cipher.as_ref(), record, candidate).await
            }
        };

        if verified {
            return self.unlock_if_current(epoch, Password::new(candidate)).await;
        }

        warn!("Password verification failed");
        self.fail_verification("Invalid password.").await;
        false
    }

    /// Re-enter the unlocked state with a password the host kept for this
    /// browser/app session. Not verified; a stale password simply fails
    /// later decryptions.
    ///
    /// # Errors
    /// - Returns `InvalidInput` if `password` is empty
    pub async fn restore(&self, password: &str) -> Result<()> {
        if password.is_empty() {
            return Err(Error::InvalidInput("Password cannot be empty".to_string()));
        }
        self.unlock(Password::new(password)).await;
        Ok(())
    }

    /// Forget the password. Safe to call in any state.
    pub async fn clear_password(&self) {
        let mut inner = self.inner.write().await;
        if let Some(handle) = inner.handle.as_ref() {
            info!(session = %handle, "Vault locked");
        }
        inner.lock();
    }

    /// Encrypt a new entry under the session password.
    ///
    /// # Errors
    /// - Draft fails validation
    /// - Session is locked
    /// - Encryption failure
    pub async fn seal_item(&self, draft: &ItemDraft) -> Result<VaultItem> {
        draft.validate()?;
        let password = self.password().await.map_err(|_| {
            Error::NotPermitted("Vault is locked. Cannot add item.".to_string())
        })?;

        let plaintext = draft.content.to_plaintext()?;
        let encrypted = self.cipher.encrypt(&plaintext, password.as_str()).await?;

        Ok(VaultItem::new(
            draft.name.trim(),
            draft.content.kind(),
            encrypted,
            draft.website.clone(),
        ))
    }

    /// Replace an item's content, keeping its id and metadata.
    ///
    /// # Errors
    /// - `content` is of a different kind than `item`
    /// - Session is locked
    /// - Encryption failure
    pub async fn reseal_item(
        &self,
        item: &VaultItem,
        content: &DecryptedContent,
    ) -> Result<VaultItem> {
        if content.kind() != item.kind {
            return Err(Error::InvalidInput(format!(
                "Cannot store {} content in a {} item",
                content.kind(),
                item.kind
            )));
        }
        let password = self.password().await?;

        let plaintext = content.to_plaintext()?;
        let encrypted = self.cipher.encrypt(&plaintext, password.as_str()).await?;

        Ok(item.with_encrypted_content(encrypted))
    }

    /// Change the master password, re-encrypting every item.
    ///
    /// # Preconditions
    /// - Session must be unlocked
    ///
    /// # Postconditions
    /// - On success, the session holds the new password and the returned
    ///   items must be persisted in one write. If the session was locked
    ///   while re-encrypting, the items are still returned but the session
    ///   stays locked
    /// - On re-encryption failure, the session is locked and `items` is
    ///   still the authoritative collection
    ///
    /// # Errors
    /// - Session is locked
    /// - Request fails validation (session stays unlocked)
    /// - Any item fails to re-encrypt (session is locked)
    pub async fn change_password(
        &self,
        change: &PasswordChange,
        rekeyer: &VaultRekeyer,
        items: &[VaultItem],
    ) -> Result<Vec<VaultItem>> {
        let (current, epoch) = {
            let inner = self.inner.read().await;
            let current = inner.password.clone().filter(|_| !inner.verifying);
            (current, inner.epoch)
        };
        let current = current.ok_or_else(|| {
            Error::NotPermitted("Vault is locked. Cannot verify current password.".to_string())
        })?;
        change.validate(&current)?;

        match rekeyer
            .reencrypt_all(change.current(), change.new_password(), items)
            .await
        {
            Ok(rekeyed) => {
                if self
                    .unlock_if_current(epoch, Password::new(change.new_password()))
                    .await
                {
                    info!(items = rekeyed.len(), "Master password changed");
                } else {
                    warn!(
                        items = rekeyed.len(),
                        "Master password changed after the vault was locked, staying locked"
                    );
                }
                Ok(rekeyed)
            }
            Err(e) => {
                warn!(error = %e, "Password change failed, locking vault");
                self.clear_password().await;
                Err(e)
            }
        }
    }

    async fn unlock(&self, password: Password) {
        let handle = SessionHandle::new();
        info!(session = %handle, "Vault unlocked");

        let mut inner = self.inner.write().await;
        inner.password = Some(password);
        inner.handle = Some(handle);
        inner.verifying = false;
        inner.verification_error = None;
    }

    /// Unlock unless the session was locked since `epoch` was read.
    async fn unlock_if_current(&self, epoch: u64, password: Password) -> bool {
        let mut inner = self.inner.write().await;
        if inner.epoch != epoch {
            debug!("Session was locked while the password was in use, not unlocking");
            return false;
        }

        let handle = SessionHandle::new();
        info!(session = %handle, "Vault unlocked");
        inner.password = Some(password);
        inner.handle = Some(handle);
        inner.verifying = false;
        inner.verification_error = None;
        true
    }

    async fn fail_verification(&self, message: &str) {
        let mut inner = self.inner.write().await;
        inner.lock();
        inner.verification_error = Some(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::testing::{sealed_item, CountingCipher, GatedCipher};
    use crate::cipher::PasswordCipher;
    use crate::item::ItemKind;

    fn session() -> SessionAuthenticator {
        SessionAuthenticator::new(Arc::new(PasswordCipher::default()))
    }

    async fn vault(password: &str, count: usize) -> Vec<VaultItem> {
        let mut items = Vec::with_capacity(count);
        for i in 0..count {
            items.push(sealed_item(&i.to_string(), ItemKind::Secret, "s", password).await);
        }
        items
    }

    #[tokio::test]
    async fn test_new_session_is_locked() {
        let session = session();

        assert_eq!(session.state().await, SessionState::Locked);
        assert!(session.password().await.is_err());
        assert!(session.handle().await.is_none());
    }

    #[tokio::test]
    async fn test_verify_correct_password() {
        let session = session();
        let items = vault("abc123", 2).await;

        assert!(session.verify_and_set_password("abc123", &items).await);
        assert!(session.is_unlocked().await);
        assert_eq!(session.password().await.unwrap().as_str(), "abc123");
        assert!(session.handle().await.is_some());
        assert!(session.verification_error().await.is_none());
    }

    #[tokio::test]
    async fn test_verify_wrong_password_locks() {
        let session = session();
        let items = vault("abc123", 1).await;

        assert!(session.verify_and_set_password("abc123", &items).await);
        assert!(!session.verify_and_set_password("wrong", &items).await);

        assert_eq!(session.state().await, SessionState::Locked);
        assert!(session.password().await.is_err());
        assert_eq!(
            session.verification_error().await.as_deref(),
            Some("Invalid password.")
        );
    }

    #[tokio::test]
    async fn test_verify_decrypts_only_first_item() {
        let cipher = CountingCipher::shared();
        let session = SessionAuthenticator::new(cipher.clone());
        let items = vault("abc123", 8).await;

        assert!(session.verify_and_set_password("abc123", &items).await);
        assert_eq!(cipher.decrypts(), 1);

        cipher.reset();
        assert!(!session.verify_and_set_password("wrong", &items).await);
        assert_eq!(cipher.decrypts(), 1);
        assert_eq!(cipher.encrypts(), 0);
    }

    #[tokio::test]
    async fn test_verification_ignores_later_items() {
        let session = session();
        let mut items = vault("abc123", 1).await;
        items.push(sealed_item("other", ItemKind::Secret, "s", "different").await);

        // Only the first record is checked; the mismatch surfaces later.
        assert!(session.verify_and_set_password("abc123", &items).await);
    }

    #[tokio::test]
    async fn test_empty_vault_accepts_any_password() {
        let cipher = CountingCipher::shared();
        let session = SessionAuthenticator::new(cipher.clone());

        assert!(session.verify_and_set_password("first-password", &[]).await);
        assert_eq!(session.password().await.unwrap().as_str(), "first-password");
        assert_eq!(cipher.decrypts(), 0);
    }

    #[tokio::test]
    async fn test_empty_candidate_rejected() {
        let session = session();

        assert!(!session.verify_and_set_password("", &[]).await);
        assert_eq!(session.state().await, SessionState::Locked);
        assert_eq!(
            session.verification_error().await.as_deref(),
            Some("Password cannot be empty.")
        );
    }

    #[tokio::test]
    async fn test_clear_password_is_idempotent() {
        let session = session();
        session.clear_password().await;

        assert!(session.verify_and_set_password("pw", &[]).await);
        session.clear_password().await;
        session.clear_password().await;

        assert_eq!(session.state().await, SessionState::Locked);
        assert!(session.password().await.is_err());
    }

    #[tokio::test]
    async fn test_restore_skips_verification() {
        let cipher = CountingCipher::shared();
        let session = SessionAuthenticator::new(cipher.clone());

        session.restore("remembered").await.unwrap();
        assert!(session.is_unlocked().await);
        assert_eq!(cipher.decrypts(), 0);

        assert!(session.restore("").await.is_err());
    }

    #[tokio::test]
    async fn test_each_unlock_gets_new_handle() {
        let session = session();

        session.restore("pw").await.unwrap();
        let first = session.handle().await.unwrap();
        session.restore("pw").await.unwrap();
        let second = session.handle().await.unwrap();

        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_seal_item_requires_unlock() {
        let session = session();
        let draft = ItemDraft::new("Note", DecryptedContent::secret("hello"));

        assert!(matches!(
            session.seal_item(&draft).await,
            Err(Error::NotPermitted(_))
        ));
    }

    #[tokio::test]
    async fn test_seal_item_encrypts_under_session_password() {
        let session = session();
        session.restore("abc123").await.unwrap();

        let draft = ItemDraft::new(
            " OpenAI ",
            DecryptedContent::api_key("sk-1", Some("prod".to_string())),
        )
        .with_website("https://openai.com");
        let item = session.seal_item(&draft).await.unwrap();

        assert_eq!(item.name, "OpenAI");
        assert_eq!(item.kind, ItemKind::ApiKey);
        assert_eq!(item.website.as_deref(), Some("https://openai.com"));

        let plaintext = session
            .cipher()
            .decrypt(&item.encrypted_content, "abc123")
            .await
            .unwrap();
        assert_eq!(plaintext, r#"{"key":"sk-1","notes":"prod"}"#);
    }

    #[tokio::test]
    async fn test_reseal_item_keeps_identity() {
        let session = session();
        session.restore("abc123").await.unwrap();
        let item = sealed_item("7", ItemKind::Secret, "old", "abc123").await;

        let updated = session
            .reseal_item(&item, &DecryptedContent::secret("new"))
            .await
            .unwrap();
        assert_eq!(updated.id, "7");
        assert_ne!(updated.encrypted_content, item.encrypted_content);

        let wrong_kind = session
            .reseal_item(&item, &DecryptedContent::login("me", None))
            .await;
        assert!(matches!(wrong_kind, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_change_password_success_switches_session() {
        let session = session();
        let items = vault("abc123", 3).await;
        assert!(session.verify_and_set_password("abc123", &items).await);

        let rekeyer = VaultRekeyer::new(session.cipher().clone(), 2);
        let change = PasswordChange::new("abc123", "def456", "def456");
        let rekeyed = session
            .change_password(&change, &rekeyer, &items)
            .await
            .unwrap();

        assert_eq!(rekeyed.len(), 3);
        assert_eq!(session.password().await.unwrap().as_str(), "def456");
        assert!(session.verify_and_set_password("def456", &rekeyed).await);
    }

    #[tokio::test]
    async fn test_change_password_validation_keeps_session() {
        let session = session();
        session.restore("abc123").await.unwrap();
        let rekeyer = VaultRekeyer::new(session.cipher().clone(), 2);

        let mismatch = PasswordChange::new("abc123", "def456", "def457");
        assert!(matches!(
            session.change_password(&mismatch, &rekeyer, &[]).await,
            Err(Error::InvalidInput(_))
        ));

        let wrong_current = PasswordChange::new("nope", "def456", "def456");
        assert!(session
            .change_password(&wrong_current, &rekeyer, &[])
            .await
            .is_err());

        assert_eq!(session.password().await.unwrap().as_str(), "abc123");
    }

    #[tokio::test]
    async fn test_change_password_failure_locks_session() {
        let session = session();
        let mut items = vault("abc123", 2).await;
        items.push(sealed_item("stray", ItemKind::Secret, "s", "other").await);
        assert!(session.verify_and_set_password("abc123", &items).await);

        let rekeyer = VaultRekeyer::new(session.cipher().clone(), 2);
        let change = PasswordChange::new("abc123", "def456", "def456");
        let before = items.clone();

        let err = session
            .change_password(&change, &rekeyer, &items)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Rekey { ref item_id } if item_id == "stray"));
        assert!(err.requires_lock());
        assert_eq!(session.state().await, SessionState::Locked);
        assert_eq!(items, before);
    }

    #[tokio::test]
    async fn test_change_password_requires_unlock() {
        let session = session();
        let rekeyer = VaultRekeyer::new(session.cipher().clone(), 1);
        let change = PasswordChange::new("a", "b", "b");

        assert!(matches!(
            session.change_password(&change, &rekeyer, &[]).await,
            Err(Error::NotPermitted(_))
        ));
    }

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn test_state_is_verifying_during_check() {
        let cipher = GatedCipher::shared();
        let session = Arc::new(SessionAuthenticator::new(cipher.clone()));
        let items = vault("abc123", 1).await;

        let task = {
            let session = session.clone();
            let items = items.clone();
            tokio::spawn(async move { session.verify_and_set_password("abc123", &items).await })
        };

        cipher.entered().await;
        assert_eq!(session.state().await, SessionState::Verifying);
        assert!(matches!(
            session.password().await,
            Err(Error::NotPermitted(_))
        ));

        cipher.release(1);
        assert!(task.await.unwrap());
        assert_eq!(session.state().await, SessionState::Unlocked);
    }

    #[tokio::test]
    async fn test_wrong_password_leaves_verifying_for_locked() {
        let cipher = GatedCipher::shared();
        let session = Arc::new(SessionAuthenticator::new(cipher.clone()));
        let items = vault("abc123", 1).await;

        let task = {
            let session = session.clone();
            let items = items.clone();
            tokio::spawn(async move { session.verify_and_set_password("wrong", &items).await })
        };

        cipher.entered().await;
        assert_eq!(session.state().await, SessionState::Verifying);

        cipher.release(1);
        assert!(!task.await.unwrap());
        assert_eq!(session.state().await, SessionState::Locked);
    }

    #[tokio::test]
    async fn test_lock_during_verification_wins() {
        let cipher = GatedCipher::shared();
        let session = Arc::new(SessionAuthenticator::new(cipher.clone()));
        let items = vault("abc123", 1).await;

        let task = {
            let session = session.clone();
            let items = items.clone();
            tokio::spawn(async move { session.verify_and_set_password("abc123", &items).await })
        };

        cipher.entered().await;
        session.clear_password().await;
        cipher.release(1);

        assert!(!task.await.unwrap());
        assert_eq!(session.state().await, SessionState::Locked);
        assert!(session.password().await.is_err());
    }

    #[tokio::test]
    async fn test_lock_during_password_change_wins() {
        let cipher = GatedCipher::shared();
        let session = Arc::new(SessionAuthenticator::new(cipher.clone()));
        session.restore("abc123").await.unwrap();
        let items = vault("abc123", 1).await;
        let rekeyer = VaultRekeyer::new(cipher.clone(), 1);

        let task = {
            let session = session.clone();
            let items = items.clone();
            tokio::spawn(async move {
                let change = PasswordChange::new("abc123", "def456", "def456");
                session.change_password(&change, &rekeyer, &items).await
            })
        };

        cipher.entered().await;
        session.clear_password().await;
        assert_eq!(session.state().await, SessionState::Locked);
        cipher.release(2);

        let rekeyed = task.await.unwrap().unwrap();
        assert_eq!(rekeyed.len(), 1);
        assert_eq!(session.state().await, SessionState::Locked);
        assert!(session.password().await.is_err());

        let plaintext = PasswordCipher::default()
            .decrypt(&rekeyed[0].encrypted_content, "def456")
            .await
            .unwrap();
        assert_eq!(plaintext, "s");
    }

    #[tokio::test]
    async fn test_change_password_future_is_send() {
        let session = Arc::new(session());
        session.restore("abc123").await.unwrap();
        let items = vault("abc123", 2).await;
        let rekeyer = VaultRekeyer::new(session.cipher().clone(), 2);
        let change = PasswordChange::new("abc123", "def456", "def456");

        let future = session.change_password(&change, &rekeyer, &items);
        assert_send(&future);
        drop(future);

        let task = {
            let session = session.clone();
            tokio::spawn(async move { session.change_password(&change, &rekeyer, &items).await })
        };
        assert_eq!(task.await.unwrap().unwrap().len(), 2);
        assert_eq!(session.password().await.unwrap().as_str(), "def456");
    }

    #[tokio::test]
    async fn test_initial_password_and_verification_record() {
        let session = session();
        let record = session.set_initial_password("abc123").await.unwrap();
        assert!(session.is_unlocked().await);

        session.clear_password().await;
        assert!(!session.verify_with_record("other", &record).await);
        assert_eq!(
            session.verification_error().await.as_deref(),
            Some("Invalid password.")
        );

        assert!(session.verify_with_record("abc123", &record).await);
        assert_eq!(session.password().await.unwrap().as_str(), "abc123");

        assert!(matches!(
            session.set_initial_password("").await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_verification_record_guards_empty_vault() {
        let session = session();
        let record = session.set_initial_password("abc123").await.unwrap();
        session.clear_password().await;

        // No items left, but the record still pins the password.
        assert!(!session.verify_with_record("new-password", &record).await);
        assert_eq!(session.state().await, SessionState::Locked);
    }
}

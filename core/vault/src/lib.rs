//! Vault engine for Trouprive.
//!
//! This module provides:
//! - The vault item model the host application persists
//! - An async cipher seam over the password-based record encryption
//! - Session handling with single-record password verification
//! - A verification record for vaults that may hold no items
//! - All-or-nothing re-encryption when the master password changes
//! - A cached, typed view of decrypted items
//!
//! # Architecture
//! The vault never touches storage. The host hands in the current item
//! collection and receives new collections back, persisting them itself.

pub mod cipher;
pub mod config;
pub mod content;
pub mod item;
pub mod rekey;
pub mod session;
pub mod verification;
pub mod view;

pub use cipher::{PasswordCipher, SecretCipher};
pub use config::VaultConfig;
pub use content::{ApiKeyEntry, ContentParsing, DecryptedContent, ItemDraft, LoginEntry};
pub use item::{ItemKind, VaultItem};
pub use rekey::{PasswordChange, VaultRekeyer};
pub use session::{SessionAuthenticator, SessionHandle, SessionState};
pub use verification::{check_verification, seal_verification, VERIFICATION_PLAINTEXT};
pub use view::{decrypt_all, DecryptedItem, DecryptedView};

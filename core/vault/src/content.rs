//! Typed content of decrypted vault items.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::item::ItemKind;
use trouprive_common::{Error, Result};

/// How decrypted plaintext is turned into [`DecryptedContent`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentParsing {
    /// Parse according to the item's declared kind. Malformed structured
    /// content is an error.
    #[default]
    Typed,
    /// Ignore the declared kind and guess from the plaintext, falling back
    /// to a raw secret. Matches records written by the first web client.
    Sniffed,
}

/// Decrypted API key entry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct ApiKeyEntry {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl fmt::Debug for ApiKeyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyEntry")
            .field("key", &"[REDACTED]")
            .field("notes", &self.notes.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Decrypted login entry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct LoginEntry {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl fmt::Debug for LoginEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginEntry")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Plaintext of a vault item, keyed by kind.
#[derive(Clone, PartialEq, Eq)]
pub enum DecryptedContent {
    Secret(Zeroizing<String>),
    ApiKey(ApiKeyEntry),
    Login(LoginEntry),
}

impl DecryptedContent {
    /// Free-form secret.
    pub fn secret(text: impl Into<String>) -> Self {
        DecryptedContent::Secret(Zeroizing::new(text.into()))
    }

    /// API key with optional notes.
    pub fn api_key(key: impl Into<String>, notes: Option<String>) -> Self {
        DecryptedContent::ApiKey(ApiKeyEntry {
            key: key.into(),
            notes,
        })
    }

    /// Login with optional password.
    pub fn login(username: impl Into<String>, password: Option<String>) -> Self {
        DecryptedContent::Login(LoginEntry {
            username: username.into(),
            password,
        })
    }

    /// The item kind this content belongs to.
    pub fn kind(&self) -> ItemKind {
        match self {
            DecryptedContent::Secret(_) => ItemKind::Secret,
            DecryptedContent::ApiKey(_) => ItemKind::ApiKey,
            DecryptedContent::Login(_) => ItemKind::Login,
        }
    }

    pub fn as_secret(&self) -> Option<&str> {
        match self {
            DecryptedContent::Secret(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn as_api_key(&self) -> Option<&ApiKeyEntry> {
        match self {
            DecryptedContent::ApiKey(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn as_login(&self) -> Option<&LoginEntry> {
        match self {
            DecryptedContent::Login(entry) => Some(entry),
            _ => None,
        }
    }

    /// Parse plaintext strictly by kind.
    ///
    /// Secrets are taken verbatim, even when they happen to be JSON.
    pub fn parse(kind: ItemKind, plaintext: &str) -> std::result::Result<Self, serde_json::Error> {
        Ok(match kind {
            ItemKind::Secret => Self::secret(plaintext),
            ItemKind::ApiKey => DecryptedContent::ApiKey(serde_json::from_str(plaintext)?),
            ItemKind::Login => DecryptedContent::Login(serde_json::from_str(plaintext)?),
        })
    }

    /// Guess the shape from the plaintext alone. Never fails.
    pub fn sniff(plaintext: &str) -> Self {
        if let Ok(entry) = serde_json::from_str::<ApiKeyEntry>(plaintext) {
            return DecryptedContent::ApiKey(entry);
        }
        if let Ok(entry) = serde_json::from_str::<LoginEntry>(plaintext) {
            return DecryptedContent::Login(entry);
        }
        Self::secret(plaintext)
    }

    /// Interpret decrypted plaintext for the item `item_id`.
    ///
    /// # Errors
    /// - Returns `Parse` under [`ContentParsing::Typed`] when structured
    ///   content is not valid JSON of the expected shape
    pub fn from_plaintext(
        item_id: &str,
        kind: ItemKind,
        plaintext: &str,
        parsing: ContentParsing,
    ) -> Result<Self> {
        match parsing {
            ContentParsing::Typed => Self::parse(kind, plaintext).map_err(|e| Error::Parse {
                item_id: item_id.to_string(),
                reason: e.to_string(),
            }),
            ContentParsing::Sniffed => Ok(Self::sniff(plaintext)),
        }
    }

    /// Text that gets encrypted for this content.
    ///
    /// Structured kinds become compact JSON; secrets are stored verbatim.
    pub fn to_plaintext(&self) -> Result<Zeroizing<String>> {
        let plaintext = match self {
            DecryptedContent::Secret(text) => text.to_string(),
            DecryptedContent::ApiKey(entry) => serde_json::to_string(entry)
                .map_err(|e| Error::Serialization(e.to_string()))?,
            DecryptedContent::Login(entry) => serde_json::to_string(entry)
                .map_err(|e| Error::Serialization(e.to_string()))?,
        };
        Ok(Zeroizing::new(plaintext))
    }
}

impl fmt::Debug for DecryptedContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecryptedContent::Secret(_) => write!(f, "Secret([REDACTED])"),
            DecryptedContent::ApiKey(entry) => f.debug_tuple("ApiKey").field(entry).finish(),
            DecryptedContent::Login(entry) => f.debug_tuple("Login").field(entry).finish(),
        }
    }
}

/// A new entry the user wants to add, before encryption.
#[derive(Debug, Clone)]
pub struct ItemDraft {
    pub name: String,
    pub website: Option<String>,
    pub content: DecryptedContent,
}

impl ItemDraft {
    /// Draft without a website.
    pub fn new(name: impl Into<String>, content: DecryptedContent) -> Self {
        Self {
            name: name.into(),
            website: None,
            content,
        }
    }

    /// Attach a website. Blank input clears it.
    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        let website = website.into();
        self.website = if website.trim().is_empty() {
            None
        } else {
            Some(website)
        };
        self
    }

    /// Check the draft has everything its kind needs.
    ///
    /// # Errors
    /// - Name missing
    /// - Login without website, username or password
    /// - API key without key or website
    /// - Secret without content
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Please provide a name for the item.".to_string(),
            ));
        }

        let has_website = self
            .website
            .as_deref()
            .is_some_and(|w| !w.trim().is_empty());

        match &self.content {
            DecryptedContent::Login(entry) => {
                let has_password = entry.password.as_deref().is_some_and(|p| !p.is_empty());
                if !has_website || entry.username.is_empty() || !has_password {
                    return Err(Error::InvalidInput(
                        "Please fill out Website, Username, and Password for logins.".to_string(),
                    ));
                }
            }
            DecryptedContent::ApiKey(entry) => {
                if entry.key.is_empty() || !has_website {
                    return Err(Error::InvalidInput(
                        "Please fill out Key/Secret and Website for API Keys.".to_string(),
                    ));
                }
            }
            DecryptedContent::Secret(text) => {
                if text.is_empty() {
                    return Err(Error::InvalidInput(
                        "Please provide the secret content.".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

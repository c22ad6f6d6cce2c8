//! Vault items as persisted by the host application.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of secret an item holds.
///
/// Determines how the decrypted plaintext is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemKind {
    /// Free-form text.
    Secret,
    /// JSON `{key, notes?}`.
    ApiKey,
    /// JSON `{username, password?}`.
    Login,
}

impl ItemKind {
    /// The tag stored in the item's `type` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Secret => "secret",
            ItemKind::ApiKey => "apiKey",
            ItemKind::Login => "login",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored vault entry.
///
/// Only `encrypted_content` is secret. The rest is plaintext metadata the
/// host shows while the vault is locked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultItem {
    /// Stable identifier.
    pub id: String,
    /// Display label.
    pub name: String,
    /// Content kind.
    #[serde(rename = "type")]
    pub kind: ItemKind,
    /// Serialized encrypted record.
    pub encrypted_content: String,
    /// Associated site, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

impl VaultItem {
    /// Create an item with a freshly generated id.
    pub fn new(
        name: impl Into<String>,
        kind: ItemKind,
        encrypted_content: String,
        website: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            kind,
            encrypted_content,
            website,
        }
    }

    /// Copy of this item with its encrypted content replaced.
    ///
    /// Items are never edited in place; edits and re-encryption both go
    /// through here.
    pub fn with_encrypted_content(&self, encrypted_content: String) -> Self {
        Self {
            encrypted_content,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_json_shape() {
        let item = VaultItem {
            id: "1700000000000".to_string(),
            name: "GitHub".to_string(),
            kind: ItemKind::ApiKey,
            encrypted_content: "{}".to_string(),
            website: None,
        };

        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": "1700000000000",
                "name": "GitHub",
                "type": "apiKey",
                "encryptedContent": "{}"
            })
        );
    }

    #[test]
    fn test_item_parses_host_json() {
        let json = r#"{"id":"1","name":"Mail","type":"login","encryptedContent":"x","website":"https://mail.example"}"#;
        let item: VaultItem = serde_json::from_str(json).unwrap();

        assert_eq!(item.kind, ItemKind::Login);
        assert_eq!(item.website.as_deref(), Some("https://mail.example"));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let json = r#"{"id":"1","name":"x","type":"note","encryptedContent":"x"}"#;
        assert!(serde_json::from_str::<VaultItem>(json).is_err());
    }

    #[test]
    fn test_new_items_get_unique_ids() {
        let a = VaultItem::new("a", ItemKind::Secret, String::new(), None);
        let b = VaultItem::new("a", ItemKind::Secret, String::new(), None);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_with_encrypted_content_keeps_metadata() {
        let item = VaultItem::new(
            "Mail",
            ItemKind::Login,
            "old".to_string(),
            Some("https://mail.example".to_string()),
        );
        let replaced = item.with_encrypted_content("new".to_string());

        assert_eq!(replaced.id, item.id);
        assert_eq!(replaced.name, item.name);
        assert_eq!(replaced.kind, item.kind);
        assert_eq!(replaced.website, item.website);
        assert_eq!(replaced.encrypted_content, "new");
        assert_eq!(item.encrypted_content, "old");
    }
}

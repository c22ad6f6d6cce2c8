//! JSON file holding the item collection.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use trouprive_vault::VaultItem;

/// On-disk vault file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultStore {
    pub items: Vec<VaultItem>,
    /// Record proving which password the vault was set up with. Files
    /// written before it existed do not have one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<String>,
}

impl VaultStore {
    /// Read a vault file.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| {
            format!(
                "Failed to read vault file {} (run `init` first?)",
                path.display()
            )
        })?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("Vault file {} is not valid", path.display()))
    }

    /// Write the vault file.
    ///
    /// The new content goes to a temporary file in the same directory which
    /// then replaces the old file, so readers never see a partial write.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let json = serde_json::to_vec_pretty(self).context("Failed to serialize vault")?;
        let mut file = NamedTempFile::new_in(dir).context("Failed to create temporary file")?;
        file.write_all(&json)
            .context("Failed to write temporary file")?;
        file.as_file()
            .sync_all()
            .context("Failed to flush temporary file")?;
        file.persist(path)
            .with_context(|| format!("Failed to replace vault file {}", path.display()))?;

        Ok(())
    }

    /// Remove an item by id. Returns whether it existed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        self.items.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trouprive_vault::ItemKind;

    fn item(id: &str) -> VaultItem {
        VaultItem {
            id: id.to_string(),
            name: format!("item {}", id),
            kind: ItemKind::Secret,
            encrypted_content: "{}".to_string(),
            website: None,
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.json");

        let store = VaultStore {
            items: vec![item("1"), item("2")],
            verification: Some("{}".to_string()),
        };
        store.save(&path).unwrap();

        assert_eq!(VaultStore::load(&path).unwrap(), store);
    }

    #[test]
    fn test_save_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.json");

        VaultStore {
            items: vec![item("1")],
            ..Default::default()
        }
        .save(&path)
        .unwrap();
        VaultStore::default().save(&path).unwrap();

        assert!(VaultStore::load(&path).unwrap().items.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.json");
        VaultStore {
            items: vec![item("1")],
            ..Default::default()
        }
        .save(&path)
        .unwrap();

        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["items"][0]["type"], "secret");
        assert_eq!(value["items"][0]["encryptedContent"], "{}");
        assert!(value.get("verification").is_none());
    }

    #[test]
    fn test_legacy_file_without_verification() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.json");
        std::fs::write(&path, r#"{"items":[]}"#).unwrap();

        let store = VaultStore::load(&path).unwrap();
        assert!(store.items.is_empty());
        assert!(store.verification.is_none());
    }

    #[test]
    fn test_load_missing_or_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.json");
        assert!(VaultStore::load(&path).is_err());

        std::fs::write(&path, "not json").unwrap();
        assert!(VaultStore::load(&path).is_err());
    }

    #[test]
    fn test_remove() {
        let mut store = VaultStore {
            items: vec![item("1"), item("2")],
            verification: Some("record".to_string()),
        };

        assert!(store.remove("1"));
        assert!(!store.remove("1"));
        assert!(store.remove("2"));
        assert!(store.items.is_empty());
        assert_eq!(store.verification.as_deref(), Some("record"));
    }
}

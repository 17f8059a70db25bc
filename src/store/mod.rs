//! Persisted configuration entries
//!
//! One JSON file holding every `ConfigEntry`. Writes go to a sibling
//! `.tmp` file that is renamed over the original. Memory only changes
//! once the file write succeeded.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::models::{ConfigEntry, Integration, Token};

pub struct ConfigStore {
    path: Option<PathBuf>,
    entries: RwLock<Vec<ConfigEntry>>,
}

impl ConfigStore {
    /// Load entries from `path`; a missing file is an empty store
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => Vec::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::info!("Loaded {} config entries from {}", entries.len(), path.display());

        Ok(Self {
            path: Some(path),
            entries: RwLock::new(entries),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: RwLock::new(Vec::new()),
        }
    }

    pub async fn entries(&self) -> Vec<ConfigEntry> {
        self.entries.read().await.clone()
    }

    pub async fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries
            .read()
            .await
            .iter()
            .find(|e| e.entry_id == entry_id)
            .cloned()
    }

    pub async fn contains(&self, integration: Integration, unique_id: &str) -> bool {
        self.entries
            .read()
            .await
            .iter()
            .any(|e| e.integration == integration && e.unique_id.eq_ignore_ascii_case(unique_id))
    }

    /// Rejects a second entry with the same `(integration, unique_id)`
    pub async fn insert(&self, entry: ConfigEntry) -> Result<ConfigEntry, StoreError> {
        let mut entries = self.entries.write().await;
        if entries.iter().any(|e| {
            e.integration == entry.integration && e.unique_id.eq_ignore_ascii_case(&entry.unique_id)
        }) {
            return Err(StoreError::Duplicate {
                integration: entry.integration.to_string(),
                unique_id: entry.unique_id,
            });
        }

        let mut updated = entries.clone();
        updated.push(entry.clone());
        self.persist(&updated).await?;
        *entries = updated;

        tracing::info!(
            "Created {} entry '{}' ({})",
            entry.integration,
            entry.title,
            entry.entry_id
        );
        Ok(entry)
    }

    pub async fn remove(&self, entry_id: &str) -> Result<ConfigEntry, StoreError> {
        let mut entries = self.entries.write().await;
        let index = entries
            .iter()
            .position(|e| e.entry_id == entry_id)
            .ok_or_else(|| StoreError::NotFound(entry_id.to_string()))?;

        let mut updated = entries.clone();
        let removed = updated.remove(index);
        self.persist(&updated).await?;
        *entries = updated;

        tracing::info!("Removed {} entry '{}'", removed.integration, removed.title);
        Ok(removed)
    }

    /// Returns whether the stored token actually changed
    pub async fn update_token(&self, entry_id: &str, token: Token) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().await;
        let index = entries
            .iter()
            .position(|e| e.entry_id == entry_id)
            .ok_or_else(|| StoreError::NotFound(entry_id.to_string()))?;

        if entries[index].account.token.as_ref() == Some(&token) {
            return Ok(false);
        }
        let mut updated = entries.clone();
        updated[index].account.token = Some(token);
        self.persist(&updated).await?;
        *entries = updated;

        tracing::debug!("Stored refreshed token for entry {}", entry_id);
        Ok(true)
    }

    async fn persist(&self, entries: &[ConfigEntry]) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(entries)?;
        let tmp = tmp_path(path);
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Account, DeviceRecord};
    use tokio_test::assert_ok;

    fn entry(integration: Integration, unique_id: &str) -> ConfigEntry {
        ConfigEntry::new(
            integration,
            unique_id,
            unique_id,
            Account {
                identifier: Some(unique_id.to_string()),
                token: Some(Token::new("t1")),
                devices: vec![DeviceRecord::new("Kobold", "S1")],
            },
        )
    }

    #[tokio::test]
    async fn test_rejects_duplicate_unique_id() {
        let store = ConfigStore::in_memory();
        assert_ok!(store.insert(entry(Integration::Vorwerk, "a@b.com")).await);

        let err = store
            .insert(entry(Integration::Vorwerk, "A@B.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));

        // Same identifier under another integration is a different entry
        assert_ok!(store.insert(entry(Integration::JDownloader, "a@b.com")).await);
        assert_eq!(store.entries().await.len(), 2);
    }

    #[tokio::test]
    async fn test_remove_and_contains() {
        let store = ConfigStore::in_memory();
        let created = store.insert(entry(Integration::Vorwerk, "a@b.com")).await.unwrap();
        assert!(store.contains(Integration::Vorwerk, "a@b.com").await);

        assert_ok!(store.remove(&created.entry_id).await);
        assert!(!store.contains(Integration::Vorwerk, "a@b.com").await);
        assert!(matches!(
            store.remove(&created.entry_id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_token_reports_change() {
        let store = ConfigStore::in_memory();
        let created = store.insert(entry(Integration::Vorwerk, "a@b.com")).await.unwrap();

        assert!(!store.update_token(&created.entry_id, Token::new("t1")).await.unwrap());
        assert!(store.update_token(&created.entry_id, Token::new("t2")).await.unwrap());

        let stored = store.get(&created.entry_id).await.unwrap();
        assert_eq!(stored.account.token, Some(Token::new("t2")));
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("bridge-store-{}", uuid::Uuid::new_v4()));
        let path = dir.join("entries.json");

        let store = ConfigStore::open(&path).await.unwrap();
        assert!(store.entries().await.is_empty());
        let created = store.insert(entry(Integration::Vorwerk, "a@b.com")).await.unwrap();

        let reopened = ConfigStore::open(&path).await.unwrap();
        assert_eq!(reopened.entries().await, vec![created]);
        assert!(!tmp_path(&path).exists());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_entries_untouched() {
        let dir = std::env::temp_dir().join(format!("bridge-store-{}", uuid::Uuid::new_v4()));
        let path = dir.join("entries.json");

        let store = ConfigStore::open(&path).await.unwrap();
        let kept = store.insert(entry(Integration::Vorwerk, "a@b.com")).await.unwrap();

        // A regular file where the directory was makes every write fail
        std::fs::remove_dir_all(&dir).unwrap();
        std::fs::write(&dir, b"not a directory").unwrap();

        assert!(matches!(
            store.insert(entry(Integration::Vorwerk, "c@d.com")).await,
            Err(StoreError::Io(_))
        ));
        assert!(!store.contains(Integration::Vorwerk, "c@d.com").await);

        assert!(store.remove(&kept.entry_id).await.is_err());
        assert!(store.contains(Integration::Vorwerk, "a@b.com").await);

        assert!(store.update_token(&kept.entry_id, Token::new("t2")).await.is_err());
        let stored = store.get(&kept.entry_id).await.unwrap();
        assert_eq!(stored.account.token, Some(Token::new("t1")));

        let _ = std::fs::remove_file(dir);
    }
}

//! File-backed JSON key-value store.
//!
//! All persisted state (persona record, API credential, per-profile chat
//! histories) lives as string-keyed JSON values in a single file. There is no
//! schema versioning: a missing file reads as an empty map, unknown keys are
//! preserved as-is.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

/// Key holding the user's persona customization record.
pub const KEY_PERSONALITY: &str = "user_personality";
/// Key holding the raw API credential string.
pub const KEY_API_KEY: &str = "api_key";

/// Storage key for a profile's chat history list.
pub fn history_key(profile_key: &str) -> String {
    format!("chat_history_{}", profile_key)
}

pub struct JsonStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the backing file.
    lock: Mutex<()>,
}

impl JsonStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    async fn read_map(&self) -> Map<String, Value> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => match serde_json::from_str::<Map<String, Value>>(&content) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!("Store file is not a JSON object, starting empty: {}", e);
                    Map::new()
                }
            },
            Err(_) => Map::new(),
        }
    }

    async fn write_map(&self, map: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let content = serde_json::to_string_pretty(map)?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }

    /// Read and deserialize one value. Missing key or undecodable value is `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let _guard = self.lock.lock().await;
        let map = self.read_map().await;
        map.get(key)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
    }

    /// Write one value under `key`, preserving all other keys.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await;
        map.insert(key.to_string(), serde_json::to_value(value)?);
        self.write_map(&map).await
    }

    /// Remove one key. Removing an absent key is not an error.
    pub async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await;
        map.remove(key);
        self.write_map(&map).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, JsonStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("state.json"));
        (dir, store)
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let (_dir, store) = temp_store();
        let value: Option<String> = store.get("nothing").await;
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let (_dir, store) = temp_store();
        store.set(KEY_API_KEY, &"abc-123".to_string()).await.unwrap();
        let value: Option<String> = store.get(KEY_API_KEY).await;
        assert_eq!(value.as_deref(), Some("abc-123"));
    }

    #[tokio::test]
    async fn test_set_preserves_other_keys() {
        let (_dir, store) = temp_store();
        store.set("a", &1u32).await.unwrap();
        store.set("b", &2u32).await.unwrap();
        assert_eq!(store.get::<u32>("a").await, Some(1));
        assert_eq!(store.get::<u32>("b").await, Some(2));
    }

    #[tokio::test]
    async fn test_remove() {
        let (_dir, store) = temp_store();
        store.set("a", &vec!["x", "y"]).await.unwrap();
        store.remove("a").await.unwrap();
        assert!(store.get::<Vec<String>>("a").await.is_none());
    }

    #[test]
    fn test_history_key_shape() {
        assert_eq!(history_key("jane-doe"), "chat_history_jane-doe");
    }
}

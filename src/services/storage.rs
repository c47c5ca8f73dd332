// Key-Value Persistence
// Async key/value collaborator shared by the response cache, stats and settings.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

pub const STORE_FILE_NAME: &str = "store.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("storage task failed: {0}")]
    Join(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::Join(err.to_string())
    }
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Process-local store, nothing survives a restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Map<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// All keys in one JSON object file; every write replaces the file atomically
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<Option<Map<String, Value>>>,
}

impl JsonFileStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            path: data_dir.join(STORE_FILE_NAME),
            entries: Mutex::new(None),
        }
    }

    /// Get default data directory
    pub fn default_data_dir() -> Option<PathBuf> {
        dirs::data_local_dir().map(|p| p.join("tweetguard"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_file(&self) -> Result<Map<String, Value>, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&content)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }

    async fn write_file(&self, map: &Map<String, Value>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(map)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes)).await??;
        debug!(path = %self.path.display(), "[STORE] flushed");
        Ok(())
    }

    async fn update<F>(&self, mutate: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Map<String, Value>) + Send,
    {
        let mut guard = self.entries.lock().await;
        let mut map = match guard.take() {
            Some(map) => map,
            None => self.read_file().await?,
        };
        mutate(&mut map);
        let written = self.write_file(&map).await;
        *guard = Some(map);
        written
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let mut guard = self.entries.lock().await;
        if guard.is_none() {
            *guard = Some(self.read_file().await?);
        }
        Ok(guard.as_ref().and_then(|map| map.get(key).cloned()))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let key = key.to_string();
        self.update(move |map| {
            map.insert(key, value);
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|map| {
            map.remove(key);
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("stats").await.unwrap(), None);
        store.set("stats", json!({"totalAnalyzed": 3})).await.unwrap();
        assert_eq!(
            store.get("stats").await.unwrap(),
            Some(json!({"totalAnalyzed": 3}))
        );
        store.remove("stats").await.unwrap();
        assert_eq!(store.get("stats").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().to_path_buf());
        store.set("aiCache", json!({"t1": {"score": 40}})).await.unwrap();
        store.set("stats", json!({"hiddenCount": 2})).await.unwrap();
        assert!(store.path().exists());
        assert!(!dir.path().join("store.json.tmp").exists());

        let reopened = JsonFileStore::new(dir.path().to_path_buf());
        assert_eq!(
            reopened.get("aiCache").await.unwrap(),
            Some(json!({"t1": {"score": 40}}))
        );
        reopened.remove("aiCache").await.unwrap();

        let third = JsonFileStore::new(dir.path().to_path_buf());
        assert_eq!(third.get("aiCache").await.unwrap(), None);
        assert_eq!(third.get("stats").await.unwrap(), Some(json!({"hiddenCount": 2})));
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested"));
        assert_eq!(store.get("settings").await.unwrap(), None);
        store.set("settings", json!({"threshold": 80})).await.unwrap();
        assert!(dir.path().join("nested").join(STORE_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(STORE_FILE_NAME), "{not json").unwrap();
        let store = JsonFileStore::new(dir.path().to_path_buf());
        assert!(matches!(store.get("stats").await, Err(StoreError::Json(_))));
    }
}

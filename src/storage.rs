//! Durable key-value storage backing the draft store.

use crate::error::EngineError;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::{collections::HashMap, io::ErrorKind, path::PathBuf};
use tokio::{
    fs,
    io::{AsyncWriteExt, BufWriter},
    sync::Mutex,
};

/// Byte store that survives process restarts.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the bytes stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, EngineError>;
    /// Store or replace the bytes under `key`.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), EngineError>;
    /// Remove `key`; removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), EngineError>;
    /// Every key currently stored.
    async fn keys(&self) -> Result<Vec<String>, EngineError>;
}

fn store_err(e: impl std::fmt::Display) -> EngineError {
    EngineError::DraftStore {
        message: e.to_string(),
    }
}

/// Stores records in a single local JSON file.
///
/// The whole map is read and rewritten per operation; record values are
/// base64 strings so the file stays valid JSON regardless of payload.
pub struct FileStore {
    /// Location of the store on disk.
    path: PathBuf,
}

impl FileStore {
    /// Create a store backed by the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the entire record map from disk.
    async fn load_map(&self) -> Result<HashMap<String, String>, EngineError> {
        match fs::read(&self.path).await {
            Ok(data) => {
                if data.is_empty() {
                    return Ok(HashMap::new());
                }
                serde_json::from_slice(&data).map_err(store_err)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(store_err(e)),
        }
    }

    /// Persist the record map to disk, creating directories if needed.
    async fn save_map(&self, map: &HashMap<String, String>) -> Result<(), EngineError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(store_err)?;
            }
        }
        let data = serde_json::to_vec_pretty(map).map_err(store_err)?;
        let file = fs::File::create(&self.path).await.map_err(store_err)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&data).await.map_err(store_err)?;
        writer.flush().await.map_err(store_err)?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, EngineError> {
        let map = self.load_map().await?;
        match map.get(key) {
            Some(encoded) => STANDARD.decode(encoded).map(Some).map_err(store_err),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), EngineError> {
        let mut map = self.load_map().await?;
        map.insert(key.to_string(), STANDARD.encode(value));
        self.save_map(&map).await
    }

    async fn delete(&self, key: &str) -> Result<(), EngineError> {
        let mut map = self.load_map().await?;
        // Skip the rewrite when there was nothing to remove.
        if map.remove(key).is_none() {
            return Ok(());
        }
        self.save_map(&map).await
    }

    async fn keys(&self) -> Result<Vec<String>, EngineError> {
        let map = self.load_map().await?;
        Ok(map.keys().cloned().collect())
    }
}

/// In-memory store for hosts that preview executions and for tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, EngineError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), EngineError> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), EngineError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, EngineError> {
        Ok(self.entries.lock().await.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_store_path() -> PathBuf {
        std::env::temp_dir().join(format!("checklist-engine-test-{}.json", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let store = FileStore::new(temp_store_path());
        store.set("a", b"hello".to_vec()).await.unwrap();
        store.set("b", b"world".to_vec()).await.unwrap();

        assert_eq!(store.get("a").await.unwrap(), Some(b"hello".to_vec()));
        let mut keys = store.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_file_store_missing_file_reads_empty() {
        let store = FileStore::new(temp_store_path());
        assert_eq!(store.get("nope").await.unwrap(), None);
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_delete_is_idempotent() {
        let store = FileStore::new(temp_store_path());
        store.set("k", b"v".to_vec()).await.unwrap();

        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let path = temp_store_path();
        {
            let store = FileStore::new(&path);
            store.set("k", b"persisted".to_vec()).await.unwrap();
        }
        let reopened = FileStore::new(&path);
        assert_eq!(
            reopened.get("k").await.unwrap(),
            Some(b"persisted".to_vec())
        );
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        store.set("k", b"v".to_vec()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by local-store adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// String-keyed, JSON-valued store with browser-local-storage semantics.
///
/// Higher-level wrappers ([`crate::SnapshotStore`], [`crate::Preferences`])
/// own the key layout and the serialization; implementations only move
/// strings.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Fetch the value under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be written.
    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be written.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Remove every key starting with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be written.
    async fn clear_prefix(&self, prefix: &str) -> Result<(), StorageError>;
}

/// In-memory store for tests and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(key);
        Ok(())
    }

    async fn clear_prefix(&self, prefix: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }
}

/// Aggregates the local store behind a trait object for backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub local: Arc<dyn LocalStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            local: Arc::new(InMemoryStore::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_remove_round_trip() {
        let store = InMemoryStore::new();

        assert_eq!(store.get("missing").await.unwrap(), None);

        store.put("ui.language", "bn").await.unwrap();
        assert_eq!(
            store.get("ui.language").await.unwrap().as_deref(),
            Some("bn")
        );

        store.put("ui.language", "en").await.unwrap();
        assert_eq!(
            store.get("ui.language").await.unwrap().as_deref(),
            Some("en")
        );

        store.remove("ui.language").await.unwrap();
        assert_eq!(store.get("ui.language").await.unwrap(), None);

        // Removing again is fine.
        store.remove("ui.language").await.unwrap();
    }

    #[tokio::test]
    async fn clear_prefix_leaves_other_keys_alone() {
        let store = InMemoryStore::new();
        store.put("auth.user", "{}").await.unwrap();
        store.put("auth.token", "t").await.unwrap();
        store.put("ui.language", "bn").await.unwrap();

        store.clear_prefix("auth.").await.unwrap();

        assert_eq!(store.get("auth.user").await.unwrap(), None);
        assert_eq!(store.get("auth.token").await.unwrap(), None);
        assert_eq!(
            store.get("ui.language").await.unwrap().as_deref(),
            Some("bn")
        );
    }
}

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::keys;
use crate::repository::{LocalStore, StorageError};

/// Signed-in user as remembered between launches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredUser {
    pub id: u64,
    pub display_name: String,
    pub email: String,
}

/// Reads and writes auth and UI preferences in the local store.
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn LocalStore>,
}

impl Preferences {
    #[must_use]
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// Load the remembered user; unparseable data is discarded.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` only for store access failures.
    pub async fn load_user(&self) -> Result<Option<StoredUser>, StorageError> {
        let Some(json) = self.store.get(keys::CURRENT_USER).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&json) {
            Ok(user) => Ok(Some(user)),
            Err(err) => {
                log::warn!("discarding unparseable stored user: {err}");
                self.store.remove(keys::CURRENT_USER).await?;
                Ok(None)
            }
        }
    }

    /// Remember the signed-in user and their bearer token.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if serialization or the write fails.
    pub async fn save_user(&self, user: &StoredUser, token: &str) -> Result<(), StorageError> {
        let json = serde_json::to_string(user)?;
        self.store.put(keys::CURRENT_USER, &json).await?;
        self.store.put(keys::AUTH_TOKEN, token).await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    pub async fn load_token(&self) -> Result<Option<String>, StorageError> {
        self.store.get(keys::AUTH_TOKEN).await
    }

    /// Forget user and token, as on logout or a 401 from the backend.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be written.
    pub async fn clear_user(&self) -> Result<(), StorageError> {
        self.store.clear_prefix(keys::AUTH_PREFIX).await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    pub async fn load_language(&self) -> Result<Option<String>, StorageError> {
        self.store.get(keys::LANGUAGE).await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be written.
    pub async fn save_language(&self, code: &str) -> Result<(), StorageError> {
        self.store.put(keys::LANGUAGE, code).await
    }
}

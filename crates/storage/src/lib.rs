#![forbid(unsafe_code)]

pub mod keys;
pub mod preferences;
pub mod repository;
pub mod snapshot;
pub mod sqlite;

pub use preferences::{Preferences, StoredUser};
pub use repository::{InMemoryStore, LocalStore, Storage, StorageError};
pub use snapshot::{CachedResult, SessionSnapshot, SnapshotStore};
pub use sqlite::{SqliteInitError, SqliteStore};

//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::SessionError;
use storage::{SqliteInitError, StorageError};

/// Errors from the GraphQL boundary, classified by the failure taxonomy the
/// rest of the client reacts to (401 forces a logout, everything else
/// becomes a notification plus a safe fallback value).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("not signed in or session expired")]
    Unauthorized,

    #[error("operation not allowed")]
    Forbidden,

    #[error("resource not found")]
    NotFound,

    #[error("server fault (status {0})")]
    Server(u16),

    #[error("request rejected (status {0})")]
    Rejected(u16),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Errors emitted by the session flow.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FlowError {
    /// The attempt carried no playable questions; callers redirect away
    /// from the play screen.
    #[error("attempt has no questions to play")]
    EmptyAttempt,

    /// Nothing in the local store to rehydrate from.
    #[error("no stored attempt to resume")]
    NothingToResume,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Errors emitted while bootstrapping the application context.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ContextError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

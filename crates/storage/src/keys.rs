//! Well-known keys in the local store.
//!
//! The store is string-keyed and JSON-valued, mirroring the browser local
//! storage layout the quiz client persists into.

/// Shared prefix of all auth-related keys; cleared as one unit on logout.
pub const AUTH_PREFIX: &str = "auth.";

/// Currently signed-in user, JSON-encoded [`crate::StoredUser`].
pub const CURRENT_USER: &str = "auth.user";

/// Bearer token for the GraphQL endpoint, stored verbatim.
pub const AUTH_TOKEN: &str = "auth.token";

/// Preferred UI language code (for example `en` or `bn`).
pub const LANGUAGE: &str = "ui.language";

/// In-progress attempt snapshot, JSON-encoded [`crate::SessionSnapshot`].
pub const QUIZ_SNAPSHOT: &str = "quiz.snapshot";

/// Cached result of the last submitted attempt, JSON-encoded
/// [`crate::CachedResult`].
pub const QUIZ_RESULT: &str = "quiz.result";

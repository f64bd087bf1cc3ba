use std::sync::Arc;

use tokio::sync::watch;

use storage::{Preferences, SnapshotStore, Storage, StoredUser};

use crate::chat_service::ChatService;
use crate::client::GraphqlClient;
use crate::error::{ApiError, ContextError};
use crate::profile_service::ProfileService;
use crate::quiz_service::QuizService;
use crate::Clock;

const DEFAULT_LANGUAGE: &str = "en";

/// Assembles the service layer and holds app-wide reactive state.
///
/// Auth and language live in watch channels so late subscribers immediately
/// see the current value instead of waiting for the next change.
#[derive(Clone)]
pub struct AppContext {
    clock: Clock,
    preferences: Preferences,
    snapshots: SnapshotStore,
    client: Arc<GraphqlClient>,
    quiz: Arc<QuizService>,
    chat: Arc<ChatService>,
    profile: Arc<ProfileService>,
    auth: Arc<watch::Sender<Option<StoredUser>>>,
    language: Arc<watch::Sender<String>>,
}

impl AppContext {
    /// Build the context backed by `SQLite` storage, restoring the persisted
    /// user, token and language.
    ///
    /// # Errors
    ///
    /// Returns `ContextError` if storage initialization or the initial reads
    /// fail.
    pub async fn new_sqlite(
        db_url: &str,
        endpoint: &str,
        clock: Clock,
    ) -> Result<Self, ContextError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::new(storage, endpoint, clock).await
    }

    /// Build the context over an already constructed storage backend.
    ///
    /// # Errors
    ///
    /// Returns `ContextError` if the initial reads fail.
    pub async fn new(storage: Storage, endpoint: &str, clock: Clock) -> Result<Self, ContextError> {
        let preferences = Preferences::new(Arc::clone(&storage.local));
        let snapshots = SnapshotStore::new(Arc::clone(&storage.local));

        let user = preferences.load_user().await?;
        let token = preferences.load_token().await?;
        let language = preferences
            .load_language()
            .await?
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_owned());

        let client = Arc::new(GraphqlClient::new(endpoint));
        client.set_token(token).await;

        let quiz = Arc::new(QuizService::new(Arc::clone(&client)));
        let chat = Arc::new(ChatService::new(Arc::clone(&client)));
        let profile = Arc::new(ProfileService::new(Arc::clone(&client)));

        let (auth, _) = watch::channel(user);
        let (language, _) = watch::channel(language);

        Ok(Self {
            clock,
            preferences,
            snapshots,
            client,
            quiz,
            chat,
            profile,
            auth: Arc::new(auth),
            language: Arc::new(language),
        })
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn snapshots(&self) -> SnapshotStore {
        self.snapshots.clone()
    }

    #[must_use]
    pub fn quiz(&self) -> Arc<QuizService> {
        Arc::clone(&self.quiz)
    }

    #[must_use]
    pub fn chat(&self) -> Arc<ChatService> {
        Arc::clone(&self.chat)
    }

    #[must_use]
    pub fn profile(&self) -> Arc<ProfileService> {
        Arc::clone(&self.profile)
    }

    /// Current user plus future changes. The receiver starts out holding the
    /// present value.
    #[must_use]
    pub fn subscribe_auth(&self) -> watch::Receiver<Option<StoredUser>> {
        self.auth.subscribe()
    }

    /// Current UI language plus future changes.
    #[must_use]
    pub fn subscribe_language(&self) -> watch::Receiver<String> {
        self.language.subscribe()
    }

    #[must_use]
    pub fn current_user(&self) -> Option<StoredUser> {
        self.auth.borrow().clone()
    }

    #[must_use]
    pub fn current_language(&self) -> String {
        self.language.borrow().clone()
    }

    /// Persist and broadcast a language change.
    ///
    /// # Errors
    ///
    /// Returns `ContextError` if the preference cannot be written.
    pub async fn set_language(&self, code: &str) -> Result<(), ContextError> {
        self.preferences.save_language(code).await?;
        self.language.send_replace(code.to_owned());
        Ok(())
    }

    /// Remember a signed-in user, install their token and broadcast the
    /// change.
    ///
    /// # Errors
    ///
    /// Returns `ContextError` if the credentials cannot be persisted.
    pub async fn sign_in(&self, user: StoredUser, token: &str) -> Result<(), ContextError> {
        self.preferences.save_user(&user, token).await?;
        self.client.set_token(Some(token.to_owned())).await;
        self.auth.send_replace(Some(user));
        Ok(())
    }

    /// Forget the user, drop the token and broadcast the signed-out state.
    ///
    /// # Errors
    ///
    /// Returns `ContextError` if the stored credentials cannot be removed.
    pub async fn sign_out(&self) -> Result<(), ContextError> {
        self.preferences.clear_user().await?;
        self.client.set_token(None).await;
        self.auth.send_replace(None);
        Ok(())
    }

    /// Central reaction to API failures: a 401 means the stored credentials
    /// are stale, so the user is signed out everywhere at once.
    pub async fn handle_api_error(&self, error: &ApiError) {
        if matches!(error, ApiError::Unauthorized) {
            log::info!("backend rejected credentials, signing out");
            if let Err(err) = self.sign_out().await {
                log::warn!("sign-out after 401 failed: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_user() -> StoredUser {
        StoredUser {
            id: 9,
            display_name: "Ayesha".into(),
            email: "ayesha@example.com".into(),
        }
    }

    async fn build_context() -> AppContext {
        AppContext::new(
            Storage::in_memory(),
            "http://localhost/graphql",
            Clock::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn late_subscribers_see_current_values() {
        let context = build_context().await;
        context.sign_in(build_user(), "token-1").await.unwrap();
        context.set_language("bn").await.unwrap();

        // Subscriptions opened after the changes still start at the
        // current state.
        assert_eq!(context.subscribe_auth().borrow().clone(), Some(build_user()));
        assert_eq!(context.subscribe_language().borrow().as_str(), "bn");
    }

    #[tokio::test]
    async fn sign_out_broadcasts_none() {
        let context = build_context().await;
        context.sign_in(build_user(), "token-1").await.unwrap();

        let mut auth = context.subscribe_auth();
        context.sign_out().await.unwrap();

        auth.changed().await.unwrap();
        assert_eq!(auth.borrow().clone(), None);
        assert_eq!(context.current_user(), None);
    }

    #[tokio::test]
    async fn unauthorized_error_forces_sign_out() {
        let context = build_context().await;
        context.sign_in(build_user(), "token-1").await.unwrap();

        context.handle_api_error(&ApiError::Unauthorized).await;
        assert_eq!(context.current_user(), None);

        // Other failure classes leave the signed-in state alone.
        context.sign_in(build_user(), "token-2").await.unwrap();
        context.handle_api_error(&ApiError::Server(502)).await;
        assert_eq!(context.current_user(), Some(build_user()));
    }

    #[tokio::test]
    async fn language_defaults_to_english_and_persists() {
        let storage = Storage::in_memory();
        let context =
            AppContext::new(storage.clone(), "http://localhost/graphql", Clock::default())
                .await
                .unwrap();
        assert_eq!(context.current_language(), "en");

        context.set_language("bn").await.unwrap();

        // A fresh context over the same storage picks the saved language up.
        let reloaded = AppContext::new(storage, "http://localhost/graphql", Clock::default())
            .await
            .unwrap();
        assert_eq!(reloaded.current_language(), "bn");
    }
}

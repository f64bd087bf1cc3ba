use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use quiz_core::model::{AttemptId, AttemptScore, Question, SubjectId};

use crate::keys;
use crate::repository::{LocalStore, StorageError};

/// Persisted shape of an in-progress attempt.
///
/// Saved on every meaningful session mutation and on the autosave interval
/// so a page reload can restore an in-flight attempt. The subject id,
/// question count and time limit double as re-fetch parameters when the
/// snapshot itself turns out to be unusable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub attempt_id: AttemptId,
    pub subject_id: SubjectId,
    pub time_limit_secs: u32,
    pub question_count: u32,
    pub elapsed_secs: u32,
    pub questions: Vec<Question>,
    pub saved_at: DateTime<Utc>,
}

impl SessionSnapshot {
    /// A snapshot is usable only when its question payload matches the
    /// recorded count and is non-empty.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        !self.questions.is_empty() && self.questions.len() as u64 == u64::from(self.question_count)
    }
}

/// Cached result of the last submitted attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResult {
    pub attempt_id: AttemptId,
    pub score: AttemptScore,
    pub submitted_at: DateTime<Utc>,
}

/// Reads and writes attempt snapshots in the local store.
///
/// Corruption is non-fatal by design: an unparseable or inconsistent
/// snapshot is discarded and reported as absent, which pushes callers onto
/// the re-fetch path instead of crashing.
#[derive(Clone)]
pub struct SnapshotStore {
    store: Arc<dyn LocalStore>,
}

impl SnapshotStore {
    #[must_use]
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// Persist the snapshot, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if serialization or the write fails.
    pub async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), StorageError> {
        let json = serde_json::to_string(snapshot)?;
        self.store.put(keys::QUIZ_SNAPSHOT, &json).await
    }

    /// Load the stored snapshot, if a usable one exists.
    ///
    /// Unparseable or inconsistent data is removed and reported as `None`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` only for store access failures.
    pub async fn load(&self) -> Result<Option<SessionSnapshot>, StorageError> {
        let Some(json) = self.store.get(keys::QUIZ_SNAPSHOT).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<SessionSnapshot>(&json) {
            Ok(snapshot) if snapshot.is_consistent() => Ok(Some(snapshot)),
            Ok(snapshot) => {
                log::warn!(
                    "discarding inconsistent snapshot for attempt {}",
                    snapshot.attempt_id
                );
                self.store.remove(keys::QUIZ_SNAPSHOT).await?;
                Ok(None)
            }
            Err(err) => {
                log::warn!("discarding unparseable snapshot: {err}");
                self.store.remove(keys::QUIZ_SNAPSHOT).await?;
                Ok(None)
            }
        }
    }

    /// Cache the result returned by a successful submission.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if serialization or the write fails.
    pub async fn save_result(&self, result: &CachedResult) -> Result<(), StorageError> {
        let json = serde_json::to_string(result)?;
        self.store.put(keys::QUIZ_RESULT, &json).await
    }

    /// Load the cached result of the last submitted attempt, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` only for store access failures.
    pub async fn load_result(&self) -> Result<Option<CachedResult>, StorageError> {
        let Some(json) = self.store.get(keys::QUIZ_RESULT).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&json) {
            Ok(result) => Ok(Some(result)),
            Err(err) => {
                log::warn!("discarding unparseable cached result: {err}");
                self.store.remove(keys::QUIZ_RESULT).await?;
                Ok(None)
            }
        }
    }

    /// Remove the snapshot. Called on successful submission and on explicit
    /// abandonment.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be written.
    pub async fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(keys::QUIZ_SNAPSHOT).await
    }

    /// Remove the snapshot and the cached result.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be written.
    pub async fn clear_all(&self) -> Result<(), StorageError> {
        self.store.remove(keys::QUIZ_SNAPSHOT).await?;
        self.store.remove(keys::QUIZ_RESULT).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryStore;
    use quiz_core::model::{AnswerOption, Difficulty, LocalizedText, OptionId, QuestionId};
    use quiz_core::time::fixed_now;

    fn build_question(id: u64) -> Question {
        Question::new(
            QuestionId::new(id),
            LocalizedText::new(format!("Q{id}")),
            Difficulty::Easy,
            vec![
                AnswerOption::new(OptionId::new(id * 10 + 1), LocalizedText::new("a"), true, 0),
                AnswerOption::new(OptionId::new(id * 10 + 2), LocalizedText::new("b"), false, 1),
            ],
            None,
        )
        .unwrap()
    }

    fn build_snapshot(attempt: u64, question_count: u32) -> SessionSnapshot {
        SessionSnapshot {
            attempt_id: AttemptId::new(attempt),
            subject_id: SubjectId::new(3),
            time_limit_secs: 600,
            question_count,
            elapsed_secs: 42,
            questions: (1..=u64::from(question_count)).map(build_question).collect(),
            saved_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn snapshot_round_trips() {
        let store = Arc::new(InMemoryStore::new());
        let snapshots = SnapshotStore::new(store);

        assert_eq!(snapshots.load().await.unwrap(), None);

        let snapshot = build_snapshot(42, 2);
        snapshots.save(&snapshot).await.unwrap();
        assert_eq!(snapshots.load().await.unwrap(), Some(snapshot));

        snapshots.clear().await.unwrap();
        assert_eq!(snapshots.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_discarded() {
        let store = Arc::new(InMemoryStore::new());
        store.put(keys::QUIZ_SNAPSHOT, "{not json").await.unwrap();

        let snapshots = SnapshotStore::new(Arc::clone(&store) as Arc<dyn LocalStore>);
        assert_eq!(snapshots.load().await.unwrap(), None);

        // The corrupt entry was removed, not left to fail again.
        assert_eq!(store.get(keys::QUIZ_SNAPSHOT).await.unwrap(), None);
    }

    #[tokio::test]
    async fn inconsistent_snapshot_is_discarded() {
        let store = Arc::new(InMemoryStore::new());
        let snapshots = SnapshotStore::new(Arc::clone(&store) as Arc<dyn LocalStore>);

        let mut snapshot = build_snapshot(42, 2);
        snapshot.question_count = 5;
        let json = serde_json::to_string(&snapshot).unwrap();
        store.put(keys::QUIZ_SNAPSHOT, &json).await.unwrap();

        assert_eq!(snapshots.load().await.unwrap(), None);
        assert_eq!(store.get(keys::QUIZ_SNAPSHOT).await.unwrap(), None);
    }

    #[tokio::test]
    async fn result_cache_round_trips() {
        let store = Arc::new(InMemoryStore::new());
        let snapshots = SnapshotStore::new(store);

        let result = CachedResult {
            attempt_id: AttemptId::new(42),
            score: AttemptScore::new(80, 4, 1, 0),
            submitted_at: fixed_now(),
        };
        snapshots.save_result(&result).await.unwrap();
        assert_eq!(snapshots.load_result().await.unwrap(), Some(result));

        snapshots.clear_all().await.unwrap();
        assert_eq!(snapshots.load_result().await.unwrap(), None);
    }
}

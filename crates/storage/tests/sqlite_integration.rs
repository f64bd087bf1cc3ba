use std::sync::Arc;

use quiz_core::model::{
    AnswerOption, AttemptId, Difficulty, LocalizedText, OptionId, Question, QuestionId, SubjectId,
};
use quiz_core::time::fixed_now;
use storage::{LocalStore, SessionSnapshot, SnapshotStore, SqliteStore, Storage};

fn build_question(id: u64) -> Question {
    Question::new(
        QuestionId::new(id),
        LocalizedText::new(format!("Q{id}")).with_secondary(format!("প্রশ্ন {id}")),
        Difficulty::Medium,
        vec![
            AnswerOption::new(OptionId::new(id * 10 + 1), LocalizedText::new("a"), true, 0),
            AnswerOption::new(OptionId::new(id * 10 + 2), LocalizedText::new("b"), false, 1),
        ],
        None,
    )
    .unwrap()
}

#[tokio::test]
async fn kv_round_trips_through_sqlite() {
    let store = SqliteStore::connect("sqlite:file:memdb_kv?mode=memory&cache=shared")
        .await
        .unwrap();

    assert_eq!(store.get("ui.language").await.unwrap(), None);

    store.put("ui.language", "en").await.unwrap();
    store.put("ui.language", "bn").await.unwrap();
    assert_eq!(
        store.get("ui.language").await.unwrap().as_deref(),
        Some("bn")
    );

    store.remove("ui.language").await.unwrap();
    assert_eq!(store.get("ui.language").await.unwrap(), None);

    store.put("auth.user", "{}").await.unwrap();
    store.put("auth.token", "t").await.unwrap();
    store.put("quiz.result", "{}").await.unwrap();
    store.clear_prefix("auth.").await.unwrap();
    assert_eq!(store.get("auth.user").await.unwrap(), None);
    assert_eq!(store.get("auth.token").await.unwrap(), None);
    assert_eq!(store.get("quiz.result").await.unwrap().as_deref(), Some("{}"));
}

#[tokio::test]
async fn snapshot_round_trips_through_sqlite() {
    let storage = Storage::sqlite("sqlite:file:memdb_snapshot?mode=memory&cache=shared")
        .await
        .unwrap();
    let snapshots = SnapshotStore::new(Arc::clone(&storage.local));

    let snapshot = SessionSnapshot {
        attempt_id: AttemptId::new(42),
        subject_id: SubjectId::new(3),
        time_limit_secs: 900,
        question_count: 3,
        elapsed_secs: 120,
        questions: (1..=3).map(build_question).collect(),
        saved_at: fixed_now(),
    };

    snapshots.save(&snapshot).await.unwrap();
    assert_eq!(snapshots.load().await.unwrap(), Some(snapshot));

    snapshots.clear_all().await.unwrap();
    assert_eq!(snapshots.load().await.unwrap(), None);
}

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;

use quiz_core::model::{
    AnswerOption, AttemptId, AttemptScore, Difficulty, LocalizedText, OptionId, Question,
    QuestionId, SubjectId,
};
use quiz_core::time::{fixed_clock, fixed_now};
use services::{
    ApiError, FlowError, FlowEvent, LeaveDecision, QuizBackend, SessionFlow, SessionRunner,
    StartedAttempt, SubmissionState, SubmitOutcome, SubmitStatus,
};
use storage::{InMemoryStore, LocalStore, SessionSnapshot, SnapshotStore};

fn build_question(id: u64) -> Question {
    Question::new(
        QuestionId::new(id),
        LocalizedText::new(format!("Q{id}")),
        Difficulty::Medium,
        vec![
            AnswerOption::new(OptionId::new(id * 10 + 1), LocalizedText::new("a"), true, 0),
            AnswerOption::new(OptionId::new(id * 10 + 2), LocalizedText::new("b"), false, 1),
        ],
        None,
    )
    .unwrap()
}

fn build_attempt(attempt: u64, count: u64, time_limit_secs: u32) -> StartedAttempt {
    StartedAttempt {
        attempt_id: AttemptId::new(attempt),
        time_limit_secs,
        questions: (1..=count).map(build_question).collect(),
    }
}

struct MockBackend {
    fetch_calls: AtomicUsize,
    submit_calls: AtomicUsize,
    last_answers: Mutex<Vec<(QuestionId, OptionId)>>,
    outcome: Mutex<SubmitOutcome>,
}

impl MockBackend {
    fn accepting(score: AttemptScore) -> Arc<Self> {
        Arc::new(Self {
            fetch_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            last_answers: Mutex::new(Vec::new()),
            outcome: Mutex::new(SubmitOutcome {
                success: true,
                score: Some(score),
            }),
        })
    }

    fn rejecting() -> Arc<Self> {
        let backend = Self::accepting(AttemptScore::new(0, 0, 0, 0));
        *backend.outcome.lock().unwrap() = SubmitOutcome {
            success: false,
            score: None,
        };
        backend
    }

    fn set_outcome(&self, outcome: SubmitOutcome) {
        *self.outcome.lock().unwrap() = outcome;
    }

    fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    fn last_answers(&self) -> Vec<(QuestionId, OptionId)> {
        self.last_answers.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuizBackend for MockBackend {
    async fn fetch_questions(
        &self,
        _subject: SubjectId,
        count: u32,
    ) -> Result<Vec<Question>, ApiError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        Ok((1..=u64::from(count)).map(build_question).collect())
    }

    async fn submit_answers(
        &self,
        _attempt: AttemptId,
        answers: &[(QuestionId, OptionId)],
    ) -> Result<SubmitOutcome, ApiError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_answers.lock().unwrap() = answers.to_vec();
        Ok(*self.outcome.lock().unwrap())
    }
}

fn drain(events: &mut UnboundedReceiver<FlowEvent>) -> Vec<FlowEvent> {
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }
    collected
}

async fn start_flow(
    attempt: StartedAttempt,
    backend: Arc<MockBackend>,
    store: Arc<InMemoryStore>,
) -> (SessionFlow, UnboundedReceiver<FlowEvent>) {
    SessionFlow::start(
        attempt,
        SubjectId::new(3),
        SnapshotStore::new(store),
        backend,
        fixed_clock(),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn empty_attempt_is_refused() {
    let backend = MockBackend::accepting(AttemptScore::new(0, 0, 0, 0));
    let result = SessionFlow::start(
        build_attempt(1, 0, 600),
        SubjectId::new(3),
        SnapshotStore::new(Arc::new(InMemoryStore::new())),
        backend,
        fixed_clock(),
    )
    .await;

    assert!(matches!(result, Err(FlowError::EmptyAttempt)));
}

#[tokio::test]
async fn expiry_submits_partial_answers_and_clears_snapshot() {
    let backend = MockBackend::accepting(AttemptScore::new(40, 2, 1, 2));
    let store = Arc::new(InMemoryStore::new());
    let (mut flow, mut events) =
        start_flow(build_attempt(7, 5, 5), Arc::clone(&backend), Arc::clone(&store)).await;

    flow.select_option(QuestionId::new(1), OptionId::new(11))
        .await
        .unwrap();
    flow.select_option(QuestionId::new(2), OptionId::new(22))
        .await
        .unwrap();
    flow.select_option(QuestionId::new(4), OptionId::new(41))
        .await
        .unwrap();
    drain(&mut events);

    // Five one-second ticks exhaust the limit; the last one auto-submits.
    for _ in 0..5 {
        flow.tick().await.unwrap();
    }

    assert_eq!(flow.state(), SubmissionState::Submitted);
    assert_eq!(backend.submit_calls(), 1);
    assert_eq!(
        backend.last_answers(),
        vec![
            (QuestionId::new(1), OptionId::new(11)),
            (QuestionId::new(2), OptionId::new(22)),
            (QuestionId::new(4), OptionId::new(41)),
        ]
    );
    assert_eq!(flow.session().unanswered_count(), 2);

    let after = drain(&mut events);
    assert!(after.contains(&FlowEvent::TimeUp));
    assert!(after.contains(&FlowEvent::Submitted(AttemptScore::new(40, 2, 1, 2))));

    // The snapshot is gone; only the cached result remains.
    let snapshots = SnapshotStore::new(store as Arc<dyn LocalStore>);
    assert_eq!(snapshots.load().await.unwrap(), None);
    let cached = snapshots.load_result().await.unwrap().unwrap();
    assert_eq!(cached.attempt_id, AttemptId::new(7));
}

#[tokio::test]
async fn further_input_after_submission_is_ignored() {
    let backend = MockBackend::accepting(AttemptScore::new(100, 2, 0, 0));
    let store = Arc::new(InMemoryStore::new());
    let (mut flow, _events) =
        start_flow(build_attempt(7, 2, 600), backend, store).await;

    flow.select_option(QuestionId::new(1), OptionId::new(11))
        .await
        .unwrap();
    let score = AttemptScore::new(100, 2, 0, 0);
    assert_eq!(flow.submit().await.unwrap(), SubmitStatus::Accepted(score));

    // Mutations become silent no-ops rather than errors.
    flow.select_option(QuestionId::new(2), OptionId::new(21))
        .await
        .unwrap();
    flow.toggle_flag(QuestionId::new(2)).await.unwrap();
    assert_eq!(flow.session().answered_count(), 1);
    assert_eq!(flow.session().flagged_count(), 0);
}

#[tokio::test]
async fn concurrent_submissions_reach_the_backend_once() {
    let backend = MockBackend::accepting(AttemptScore::new(50, 1, 1, 0));
    let store = Arc::new(InMemoryStore::new());
    let (flow, _events) = start_flow(build_attempt(7, 2, 600), Arc::clone(&backend), store).await;

    let mut runner = SessionRunner::new(flow);
    let flow = runner.flow();

    let first = {
        let flow = Arc::clone(&flow);
        tokio::spawn(async move { flow.lock().await.submit().await.unwrap() })
    };
    let second = {
        let flow = Arc::clone(&flow);
        tokio::spawn(async move { flow.lock().await.submit().await.unwrap() })
    };

    let outcomes = vec![first.await.unwrap(), second.await.unwrap()];
    assert_eq!(backend.submit_calls(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|s| matches!(s, SubmitStatus::Accepted(_)))
            .count(),
        1
    );
    assert_eq!(
        outcomes
            .iter()
            .filter(|s| matches!(s, SubmitStatus::Skipped))
            .count(),
        1
    );
    runner.stop();
}

#[tokio::test]
async fn failed_submission_reopens_the_attempt_for_retry() {
    let backend = MockBackend::rejecting();
    let store = Arc::new(InMemoryStore::new());
    let (mut flow, mut events) =
        start_flow(build_attempt(7, 2, 600), Arc::clone(&backend), store).await;

    flow.select_option(QuestionId::new(1), OptionId::new(11))
        .await
        .unwrap();
    drain(&mut events);

    assert_eq!(flow.submit().await.unwrap(), SubmitStatus::Failed);
    assert_eq!(flow.state(), SubmissionState::InProgress);
    assert!(!flow.session().is_submitted());
    assert!(matches!(
        drain(&mut events).as_slice(),
        [FlowEvent::SubmitFailed(_)]
    ));

    // The answers survive the failure and a retry succeeds.
    let score = AttemptScore::new(50, 1, 0, 1);
    backend.set_outcome(SubmitOutcome {
        success: true,
        score: Some(score),
    });
    assert_eq!(flow.submit().await.unwrap(), SubmitStatus::Accepted(score));
    assert_eq!(backend.submit_calls(), 2);
    assert_eq!(backend.last_answers().len(), 1);
}

#[tokio::test]
async fn resume_restores_a_matching_snapshot_without_refetching() {
    let backend = MockBackend::accepting(AttemptScore::new(0, 0, 0, 0));
    let store = Arc::new(InMemoryStore::new());
    let snapshots = SnapshotStore::new(Arc::clone(&store) as Arc<dyn LocalStore>);

    let snapshot = SessionSnapshot {
        attempt_id: AttemptId::new(42),
        subject_id: SubjectId::new(3),
        time_limit_secs: 600,
        question_count: 3,
        elapsed_secs: 200,
        questions: (1..=3).map(build_question).collect(),
        saved_at: fixed_now(),
    };
    snapshots.save(&snapshot).await.unwrap();

    let (flow, _events) = SessionFlow::resume(
        AttemptId::new(42),
        SnapshotStore::new(store),
        Arc::clone(&backend) as Arc<dyn QuizBackend>,
        fixed_clock(),
    )
    .await
    .unwrap();

    assert_eq!(backend.fetch_calls(), 0);
    assert_eq!(flow.session().attempt_id(), AttemptId::new(42));
    assert_eq!(flow.session().total_questions(), 3);
    assert_eq!(flow.timer().remaining_secs(), 400);
}

#[tokio::test]
async fn resume_discards_a_foreign_snapshot_and_refetches() {
    let backend = MockBackend::accepting(AttemptScore::new(0, 0, 0, 0));
    let store = Arc::new(InMemoryStore::new());
    let snapshots = SnapshotStore::new(Arc::clone(&store) as Arc<dyn LocalStore>);

    let snapshot = SessionSnapshot {
        attempt_id: AttemptId::new(42),
        subject_id: SubjectId::new(3),
        time_limit_secs: 600,
        question_count: 3,
        elapsed_secs: 200,
        questions: (1..=3).map(build_question).collect(),
        saved_at: fixed_now(),
    };
    snapshots.save(&snapshot).await.unwrap();

    let (flow, _events) = SessionFlow::resume(
        AttemptId::new(43),
        SnapshotStore::new(Arc::clone(&store) as Arc<dyn LocalStore>),
        Arc::clone(&backend) as Arc<dyn QuizBackend>,
        fixed_clock(),
    )
    .await
    .unwrap();

    assert_eq!(backend.fetch_calls(), 1);
    assert_eq!(flow.session().attempt_id(), AttemptId::new(43));
    // Fresh questions, full countdown.
    assert_eq!(flow.timer().remaining_secs(), 600);

    // The replacement snapshot belongs to the requested attempt now.
    let stored = snapshots.load().await.unwrap().unwrap();
    assert_eq!(stored.attempt_id, AttemptId::new(43));
}

#[tokio::test]
async fn resume_with_no_snapshot_is_an_error() {
    let backend = MockBackend::accepting(AttemptScore::new(0, 0, 0, 0));
    let result = SessionFlow::resume(
        AttemptId::new(42),
        SnapshotStore::new(Arc::new(InMemoryStore::new())),
        backend,
        fixed_clock(),
    )
    .await;

    assert!(matches!(result, Err(FlowError::NothingToResume)));
}

#[tokio::test]
async fn leave_guard_warns_in_progress_and_keeps_the_snapshot() {
    let backend = MockBackend::accepting(AttemptScore::new(100, 2, 0, 0));
    let store = Arc::new(InMemoryStore::new());
    let (mut flow, _events) =
        start_flow(build_attempt(7, 2, 600), backend, Arc::clone(&store)).await;

    assert_eq!(flow.leave_intent(), LeaveDecision::WarnBeforeLeaving);

    flow.confirm_leave().await.unwrap();
    assert!(flow.timer().is_paused());

    // Leaving is not abandoning: the snapshot stays for a later resume.
    let snapshots = SnapshotStore::new(Arc::clone(&store) as Arc<dyn LocalStore>);
    assert!(snapshots.load().await.unwrap().is_some());

    flow.abandon().await.unwrap();
    assert_eq!(snapshots.load().await.unwrap(), None);
}

#[tokio::test]
async fn leave_guard_relaxes_after_submission() {
    let backend = MockBackend::accepting(AttemptScore::new(100, 2, 0, 0));
    let store = Arc::new(InMemoryStore::new());
    let (mut flow, _events) = start_flow(build_attempt(7, 2, 600), backend, store).await;

    flow.submit().await.unwrap();
    assert_eq!(flow.leave_intent(), LeaveDecision::LeaveFreely);
}

#[tokio::test(start_paused = true)]
async fn abandon_survives_a_running_autosave() {
    let backend = MockBackend::accepting(AttemptScore::new(0, 0, 0, 2));
    let store = Arc::new(InMemoryStore::new());
    let (flow, _events) =
        start_flow(build_attempt(7, 2, 600), backend, Arc::clone(&store)).await;

    let mut runner = SessionRunner::new(flow);
    runner.start();

    {
        let flow = runner.flow();
        let mut flow = flow.lock().await;
        flow.abandon().await.unwrap();
        assert_eq!(flow.state(), SubmissionState::Abandoned);
        assert_eq!(flow.leave_intent(), LeaveDecision::LeaveFreely);
    }

    // Outlive a full autosave period; the cleared snapshot must stay gone.
    tokio::time::sleep(Duration::from_secs(31)).await;

    let snapshots = SnapshotStore::new(store as Arc<dyn LocalStore>);
    assert_eq!(snapshots.load().await.unwrap(), None);

    // Late input cannot bring it back either.
    {
        let flow = runner.flow();
        let mut flow = flow.lock().await;
        flow.select_option(QuestionId::new(1), OptionId::new(11))
            .await
            .unwrap();
        assert_eq!(flow.session().answered_count(), 0);
    }
    assert_eq!(snapshots.load().await.unwrap(), None);

    runner.stop();
}

#[tokio::test(start_paused = true)]
async fn runner_drives_the_countdown_to_submission() {
    let backend = MockBackend::accepting(AttemptScore::new(0, 0, 0, 3));
    let store = Arc::new(InMemoryStore::new());
    let (flow, mut events) =
        start_flow(build_attempt(7, 3, 3), Arc::clone(&backend), store).await;

    let mut runner = SessionRunner::new(flow);
    runner.start();

    // Paused tokio time auto-advances; four seconds cover the whole limit.
    tokio::time::sleep(Duration::from_secs(4)).await;

    {
        let flow = runner.flow();
        let flow = flow.lock().await;
        assert_eq!(flow.state(), SubmissionState::Submitted);
    }
    assert_eq!(backend.submit_calls(), 1);

    let seen = drain(&mut events);
    assert!(seen.contains(&FlowEvent::TimeUp));

    runner.stop();
}

//! Orchestration of a live quiz attempt.
//!
//! [`SessionFlow`] owns the session state, the countdown timer and the
//! persistence shim, and funnels everything the UI needs to react to through
//! a single event channel. [`SessionRunner`] drives the flow from background
//! tasks so the one-second tick and the autosave interval keep firing while
//! the UI thread is busy.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use quiz_core::model::{
    AttemptId, AttemptScore, OptionId, QuestionId, QuizSession, SessionError, SubjectId,
};
use quiz_core::{Clock, CountdownTimer, TimerEvent};
use storage::{CachedResult, SessionSnapshot, SnapshotStore};

use crate::error::FlowError;
use crate::quiz_service::{QuizBackend, StartedAttempt};

const AUTOSAVE_PERIOD: Duration = Duration::from_secs(30);
const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Everything the UI reacts to during an attempt, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    /// Remaining time crossed the warning threshold.
    Warning,
    /// Remaining time crossed the danger threshold.
    Danger,
    /// Time ran out; an automatic submission follows.
    TimeUp,
    /// The attempt snapshot was written to the local store.
    Saved,
    /// The backend accepted the submission.
    Submitted(AttemptScore),
    /// The submission failed and the attempt is open again.
    SubmitFailed(String),
}

/// Where the attempt stands in the submission state machine. `Submitted`
/// and `Abandoned` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    InProgress,
    Submitting,
    Submitted,
    Abandoned,
}

/// Outcome of a [`SessionFlow::submit`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SubmitStatus {
    /// Backend accepted the answers and returned the score.
    Accepted(AttemptScore),
    /// Backend rejected or the request failed; the attempt is open again.
    Failed,
    /// A submission was already in flight or done; nothing was sent.
    Skipped,
}

/// What the navigation guard should do when the user tries to leave the
/// play screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveDecision {
    /// An attempt is live; ask for confirmation before leaving.
    WarnBeforeLeaving,
    /// Nothing at stake; leave without asking.
    LeaveFreely,
}

/// A running quiz attempt: session state, countdown and persistence, driven
/// by tick and autosave pulses and reporting back over [`FlowEvent`]s.
pub struct SessionFlow {
    session: QuizSession,
    timer: CountdownTimer,
    subject_id: SubjectId,
    snapshots: SnapshotStore,
    backend: Arc<dyn QuizBackend>,
    state: SubmissionState,
    clock: Clock,
    events: UnboundedSender<FlowEvent>,
}

impl SessionFlow {
    /// Begin a freshly started attempt and persist its first snapshot.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::EmptyAttempt` when the attempt carries no
    /// questions, or a storage error if the initial snapshot cannot be
    /// written.
    pub async fn start(
        attempt: StartedAttempt,
        subject_id: SubjectId,
        snapshots: SnapshotStore,
        backend: Arc<dyn QuizBackend>,
        clock: Clock,
    ) -> Result<(Self, UnboundedReceiver<FlowEvent>), FlowError> {
        if attempt.questions.is_empty() {
            return Err(FlowError::EmptyAttempt);
        }

        let session = QuizSession::new(
            attempt.attempt_id,
            attempt.questions,
            attempt.time_limit_secs,
            clock.now(),
        )?;
        let timer = CountdownTimer::new(attempt.time_limit_secs);
        let (events, receiver) = mpsc::unbounded_channel();

        let mut flow = Self {
            session,
            timer,
            subject_id,
            snapshots,
            backend,
            state: SubmissionState::InProgress,
            clock,
            events,
        };
        flow.save_snapshot().await?;
        Ok((flow, receiver))
    }

    /// Rehydrate an attempt after a reload.
    ///
    /// A stored snapshot matching `requested` restores the question set and
    /// the partially spent countdown. A snapshot for a different attempt is
    /// discarded and the questions are re-fetched from the backend using the
    /// snapshot's subject and count. No snapshot at all is an error; the
    /// caller redirects to the start screen.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::NothingToResume` when no snapshot exists, or any
    /// storage, API or session error hit along the way.
    pub async fn resume(
        requested: AttemptId,
        snapshots: SnapshotStore,
        backend: Arc<dyn QuizBackend>,
        clock: Clock,
    ) -> Result<(Self, UnboundedReceiver<FlowEvent>), FlowError> {
        let Some(stored) = snapshots.load().await? else {
            return Err(FlowError::NothingToResume);
        };

        let (questions, time_limit_secs, elapsed_secs, subject_id) =
            if stored.attempt_id == requested {
                (
                    stored.questions,
                    stored.time_limit_secs,
                    stored.elapsed_secs,
                    stored.subject_id,
                )
            } else {
                // Stale snapshot from another attempt: drop it and start the
                // requested attempt over with fresh questions.
                log::warn!(
                    "stored snapshot is for attempt {}, requested {requested}; re-fetching",
                    stored.attempt_id
                );
                snapshots.clear().await?;
                let questions = backend
                    .fetch_questions(stored.subject_id, stored.question_count)
                    .await?;
                (questions, stored.time_limit_secs, 0, stored.subject_id)
            };

        let started_at = clock.now() - chrono::Duration::seconds(i64::from(elapsed_secs));
        let session = QuizSession::new(requested, questions, time_limit_secs, started_at)?;
        let timer = CountdownTimer::resumed(time_limit_secs, elapsed_secs);
        let (events, receiver) = mpsc::unbounded_channel();

        let mut flow = Self {
            session,
            timer,
            subject_id,
            snapshots,
            backend,
            state: SubmissionState::InProgress,
            clock,
            events,
        };
        flow.save_snapshot().await?;
        Ok((flow, receiver))
    }

    #[must_use]
    pub fn session(&self) -> &QuizSession {
        &self.session
    }

    #[must_use]
    pub fn timer(&self) -> &CountdownTimer {
        &self.timer
    }

    #[must_use]
    pub fn state(&self) -> SubmissionState {
        self.state
    }

    #[must_use]
    pub fn subject_id(&self) -> SubjectId {
        self.subject_id
    }

    /// Select an option and persist a fresh snapshot. A no-op once the
    /// attempt is submitted.
    ///
    /// # Errors
    ///
    /// Returns session errors for foreign ids, or a storage error from the
    /// snapshot write.
    pub async fn select_option(
        &mut self,
        question: QuestionId,
        option: OptionId,
    ) -> Result<(), FlowError> {
        if self.state != SubmissionState::InProgress {
            return Ok(());
        }
        match self.session.select_option(question, option) {
            Ok(()) => self.save_snapshot().await,
            Err(SessionError::AlreadySubmitted) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Toggle a review flag and persist a fresh snapshot. A no-op once the
    /// attempt is submitted.
    ///
    /// # Errors
    ///
    /// Returns session errors for foreign ids, or a storage error from the
    /// snapshot write.
    pub async fn toggle_flag(&mut self, question: QuestionId) -> Result<(), FlowError> {
        if self.state != SubmissionState::InProgress {
            return Ok(());
        }
        match self.session.toggle_flag(question) {
            Ok(()) => self.save_snapshot().await,
            Err(SessionError::AlreadySubmitted) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn go_to(&mut self, index: usize) {
        self.session.go_to(index);
    }

    pub fn next_question(&mut self) {
        self.session.next();
    }

    pub fn previous_question(&mut self) {
        self.session.previous();
    }

    /// Advance the countdown by one second and react to whatever it crossed.
    /// Time running out triggers the automatic submission.
    ///
    /// # Errors
    ///
    /// Returns errors from the automatic submission path only.
    pub async fn tick(&mut self) -> Result<(), FlowError> {
        match self.timer.tick() {
            Some(TimerEvent::Warning) => self.emit(FlowEvent::Warning),
            Some(TimerEvent::Danger) => self.emit(FlowEvent::Danger),
            Some(TimerEvent::TimeUp) => {
                self.emit(FlowEvent::TimeUp);
                self.submit().await?;
            }
            None => {}
        }
        Ok(())
    }

    /// Periodic snapshot write, independent of user activity.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write fails.
    pub async fn autosave_tick(&mut self) -> Result<(), FlowError> {
        if self.state == SubmissionState::InProgress {
            self.save_snapshot().await?;
        }
        Ok(())
    }

    /// Submit the current answers.
    ///
    /// Re-entrancy is guarded by the submission state: only the first call
    /// reaches the backend, later calls return [`SubmitStatus::Skipped`].
    /// Partial answer sets are sent as-is. On failure the session reopens so
    /// the user can retry.
    ///
    /// # Errors
    ///
    /// Backend rejections and transport failures are reported as
    /// [`SubmitStatus::Failed`], not as errors; only session-level
    /// inconsistencies escape here.
    pub async fn submit(&mut self) -> Result<SubmitStatus, FlowError> {
        if self.state != SubmissionState::InProgress {
            return Ok(SubmitStatus::Skipped);
        }
        self.state = SubmissionState::Submitting;
        self.session.mark_submitted(self.clock.now())?;

        let answers = self.session.answers();
        let verdict = self
            .backend
            .submit_answers(self.session.attempt_id(), &answers)
            .await;

        let reason = match verdict {
            Ok(outcome) if outcome.success => match outcome.score {
                Some(score) => {
                    self.finish_submission(score).await;
                    return Ok(SubmitStatus::Accepted(score));
                }
                None => "submission verdict carried no score".to_owned(),
            },
            Ok(_) => "submission rejected by backend".to_owned(),
            Err(err) => err.to_string(),
        };

        // Reopen the attempt so a retry can go through.
        self.session.revert_submission();
        self.state = SubmissionState::InProgress;
        self.emit(FlowEvent::SubmitFailed(reason));
        Ok(SubmitStatus::Failed)
    }

    async fn finish_submission(&mut self, score: AttemptScore) {
        self.state = SubmissionState::Submitted;
        self.timer.pause();

        // The backend already accepted; local bookkeeping failures must not
        // turn the submission into an apparent failure.
        if let Err(err) = self.snapshots.clear().await {
            log::warn!("failed to clear snapshot after submission: {err}");
        }
        let cached = CachedResult {
            attempt_id: self.session.attempt_id(),
            score,
            submitted_at: self.clock.now(),
        };
        if let Err(err) = self.snapshots.save_result(&cached).await {
            log::warn!("failed to cache submission result: {err}");
        }

        self.emit(FlowEvent::Submitted(score));
    }

    /// What the navigation guard should do right now.
    #[must_use]
    pub fn leave_intent(&self) -> LeaveDecision {
        if self.state == SubmissionState::InProgress {
            LeaveDecision::WarnBeforeLeaving
        } else {
            LeaveDecision::LeaveFreely
        }
    }

    /// The user confirmed leaving mid-attempt: persist the latest snapshot
    /// and stop the countdown. The snapshot stays so the attempt can be
    /// resumed later.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the final snapshot write fails.
    pub async fn confirm_leave(&mut self) -> Result<(), FlowError> {
        if self.state == SubmissionState::InProgress {
            self.save_snapshot().await?;
        }
        self.timer.pause();
        Ok(())
    }

    /// The user explicitly discarded the attempt: drop the snapshot and stop
    /// the countdown. Terminal, so a still-running autosave pulse cannot
    /// resurrect the snapshot it just cleared.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the snapshot cannot be removed.
    pub async fn abandon(&mut self) -> Result<(), FlowError> {
        self.state = SubmissionState::Abandoned;
        self.timer.pause();
        self.snapshots.clear().await?;
        Ok(())
    }

    async fn save_snapshot(&mut self) -> Result<(), FlowError> {
        let snapshot = SessionSnapshot {
            attempt_id: self.session.attempt_id(),
            subject_id: self.subject_id,
            time_limit_secs: self.session.time_limit_secs(),
            question_count: self.session.total_questions() as u32,
            elapsed_secs: self.timer.elapsed_secs(),
            questions: self.session.questions().to_vec(),
            saved_at: self.clock.now(),
        };
        self.snapshots.save(&snapshot).await?;
        self.emit(FlowEvent::Saved);
        Ok(())
    }

    fn emit(&self, event: FlowEvent) {
        // A dropped receiver just means nobody is listening anymore.
        let _ = self.events.send(event);
    }
}

impl std::fmt::Debug for SessionFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionFlow")
            .field("session", &self.session)
            .field("remaining_secs", &self.timer.remaining_secs())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Drives a [`SessionFlow`] from background tasks: a one-second countdown
/// tick and a thirty-second autosave. Both loops stop themselves once the
/// attempt reaches a terminal state; [`SessionRunner::stop`] aborts them
/// early.
pub struct SessionRunner {
    flow: Arc<Mutex<SessionFlow>>,
    tasks: Vec<JoinHandle<()>>,
}

impl SessionRunner {
    #[must_use]
    pub fn new(flow: SessionFlow) -> Self {
        Self {
            flow: Arc::new(Mutex::new(flow)),
            tasks: Vec::new(),
        }
    }

    #[must_use]
    pub fn flow(&self) -> Arc<Mutex<SessionFlow>> {
        Arc::clone(&self.flow)
    }

    /// Spawn the tick and autosave loops. Calling twice stacks no extra
    /// loops; the previous ones are stopped first.
    pub fn start(&mut self) {
        self.stop();

        let flow = Arc::clone(&self.flow);
        self.tasks.push(tokio::spawn(async move {
            // First tick lands a full period out, not immediately.
            let mut ticks = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticks.tick().await;
                let mut flow = flow.lock().await;
                if flow.state() != SubmissionState::InProgress {
                    break;
                }
                if let Err(err) = flow.tick().await {
                    log::warn!("countdown tick failed: {err}");
                }
            }
        }));

        let flow = Arc::clone(&self.flow);
        self.tasks.push(tokio::spawn(async move {
            let mut saves = interval_at(Instant::now() + AUTOSAVE_PERIOD, AUTOSAVE_PERIOD);
            saves.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                saves.tick().await;
                let mut flow = flow.lock().await;
                if flow.state() != SubmissionState::InProgress {
                    break;
                }
                if let Err(err) = flow.autosave_tick().await {
                    log::warn!("autosave failed: {err}");
                }
            }
        }));
    }

    /// Abort the background loops. Symmetric with [`SessionRunner::start`];
    /// safe to call when nothing is running.
    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for SessionRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

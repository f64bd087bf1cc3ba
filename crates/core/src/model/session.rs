use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;

use crate::model::{AttemptId, OptionId, Question, QuestionId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("attempt has no questions")]
    Empty,

    #[error("session is already submitted")]
    AlreadySubmitted,

    #[error("question {0} is not part of this attempt")]
    UnknownQuestion(QuestionId),

    #[error("option {option} does not belong to question {question}")]
    UnknownOption {
        question: QuestionId,
        option: OptionId,
    },
}

/// Per-question status for palette rendering.
///
/// Precedence: current > flagged-answered > flagged > answered > unanswered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionStatus {
    Current,
    FlaggedAnswered,
    Flagged,
    Answered,
    Unanswered,
}

/// In-memory state of an in-progress quiz attempt.
///
/// Holds the ordered question sequence, the answer map (at most one selected
/// option per question), the review-flag set and the submitted flag. The
/// submitted flag is terminal: once set, every mutator refuses with
/// `SessionError::AlreadySubmitted`, which callers treat as a no-op.
pub struct QuizSession {
    attempt_id: AttemptId,
    questions: Vec<Question>,
    current: usize,
    answers: HashMap<QuestionId, OptionId>,
    flags: HashSet<QuestionId>,
    started_at: DateTime<Utc>,
    time_limit_secs: u32,
    submitted_at: Option<DateTime<Utc>>,
}

impl QuizSession {
    /// Create a session over questions received from the backend.
    ///
    /// `started_at` should come from the caller's clock to keep time
    /// deterministic.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if no questions are provided; callers
    /// map this to a redirect away from the play screen.
    pub fn new(
        attempt_id: AttemptId,
        questions: Vec<Question>,
        time_limit_secs: u32,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::Empty);
        }

        Ok(Self {
            attempt_id,
            questions,
            current: 0,
            answers: HashMap::new(),
            flags: HashSet::new(),
            started_at,
            time_limit_secs,
            submitted_at: None,
        })
    }

    #[must_use]
    pub fn attempt_id(&self) -> AttemptId {
        self.attempt_id
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> &Question {
        // `current` is clamped to the question range at every mutation.
        &self.questions[self.current]
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn time_limit_secs(&self) -> u32 {
        self.time_limit_secs
    }

    /// Instant at which the allotted time runs out.
    #[must_use]
    pub fn deadline(&self) -> DateTime<Utc> {
        self.started_at + Duration::seconds(i64::from(self.time_limit_secs))
    }

    #[must_use]
    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }

    #[must_use]
    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    /// Select an option for a question, overwriting any prior selection.
    ///
    /// Selecting the same pair twice is idempotent; questions are
    /// single-select so a new option replaces, never appends.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadySubmitted` after submission, or an
    /// unknown-id error when the pair does not belong to this attempt.
    pub fn select_option(
        &mut self,
        question: QuestionId,
        option: OptionId,
    ) -> Result<(), SessionError> {
        if self.is_submitted() {
            return Err(SessionError::AlreadySubmitted);
        }
        let Some(q) = self.questions.iter().find(|q| q.id() == question) else {
            return Err(SessionError::UnknownQuestion(question));
        };
        if !q.has_option(option) {
            return Err(SessionError::UnknownOption { question, option });
        }

        self.answers.insert(question, option);
        Ok(())
    }

    /// Add or remove a question from the review-flag set. Flags never touch
    /// the answer map.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadySubmitted` after submission, or
    /// `SessionError::UnknownQuestion` for a foreign id.
    pub fn toggle_flag(&mut self, question: QuestionId) -> Result<(), SessionError> {
        if self.is_submitted() {
            return Err(SessionError::AlreadySubmitted);
        }
        if !self.questions.iter().any(|q| q.id() == question) {
            return Err(SessionError::UnknownQuestion(question));
        }

        if !self.flags.remove(&question) {
            self.flags.insert(question);
        }
        Ok(())
    }

    /// Move to the given question index, clamping silently into range.
    /// Out-of-range requests are ignored rather than erroring.
    pub fn go_to(&mut self, index: usize) {
        self.current = index.min(self.questions.len() - 1);
    }

    pub fn next(&mut self) {
        self.go_to(self.current.saturating_add(1));
    }

    pub fn previous(&mut self) {
        self.go_to(self.current.saturating_sub(1));
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn unanswered_count(&self) -> usize {
        self.questions.len() - self.answers.len()
    }

    #[must_use]
    pub fn flagged_count(&self) -> usize {
        self.flags.len()
    }

    /// Percentage of answered questions, rounded to the nearest integer.
    #[must_use]
    pub fn progress_percent(&self) -> u8 {
        let ratio = self.answers.len() as f64 / self.questions.len() as f64;
        (ratio * 100.0).round() as u8
    }

    #[must_use]
    pub fn selected_option(&self, question: QuestionId) -> Option<OptionId> {
        self.answers.get(&question).copied()
    }

    #[must_use]
    pub fn is_flagged(&self, question: QuestionId) -> bool {
        self.flags.contains(&question)
    }

    /// Status of the question at `index`, or `None` when out of range.
    #[must_use]
    pub fn question_status(&self, index: usize) -> Option<QuestionStatus> {
        let question = self.questions.get(index)?;
        if index == self.current {
            return Some(QuestionStatus::Current);
        }

        let answered = self.answers.contains_key(&question.id());
        let flagged = self.flags.contains(&question.id());
        Some(match (flagged, answered) {
            (true, true) => QuestionStatus::FlaggedAnswered,
            (true, false) => QuestionStatus::Flagged,
            (false, true) => QuestionStatus::Answered,
            (false, false) => QuestionStatus::Unanswered,
        })
    }

    /// Selected answers in question order, ready for submission. Partial
    /// answer sets are valid; unanswered questions are simply absent.
    #[must_use]
    pub fn answers(&self) -> Vec<(QuestionId, OptionId)> {
        self.questions
            .iter()
            .filter_map(|q| self.answers.get(&q.id()).map(|o| (q.id(), *o)))
            .collect()
    }

    /// Transition the session to its terminal submitted state.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadySubmitted` if called twice.
    pub fn mark_submitted(&mut self, at: DateTime<Utc>) -> Result<(), SessionError> {
        if self.is_submitted() {
            return Err(SessionError::AlreadySubmitted);
        }
        self.submitted_at = Some(at);
        Ok(())
    }

    /// Undo a provisional submission after a backend failure so the user can
    /// retry from the same screen.
    pub fn revert_submission(&mut self) {
        self.submitted_at = None;
    }
}

impl fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSession")
            .field("attempt_id", &self.attempt_id)
            .field("questions_len", &self.questions.len())
            .field("current", &self.current)
            .field("answered", &self.answers.len())
            .field("flagged", &self.flags.len())
            .field("submitted_at", &self.submitted_at)
            .finish_non_exhaustive()
    }
}

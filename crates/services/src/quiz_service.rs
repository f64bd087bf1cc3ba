use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use quiz_core::model::{
    AnswerOption, AttemptId, AttemptScore, Difficulty, LocalizedText, OptionId, Question,
    QuestionId, SubjectId,
};

use crate::client::GraphqlClient;
use crate::error::ApiError;

//
// ─── DOCUMENTS ─────────────────────────────────────────────────────────────────
//

const FETCH_SUBJECTS: &str = "\
query FetchSubjects {
  subjects { id name questionCount }
}";

const FETCH_QUESTIONS: &str = "\
query FetchQuestions($subjectId: ID!, $count: Int!) {
  questions(subjectId: $subjectId, limit: $count) {
    id text textSecondary difficulty explanation explanationSecondary
    options { id text textSecondary isCorrect position }
  }
}";

const START_ATTEMPT: &str = "\
mutation StartAttempt($subjectId: ID!, $questionCount: Int!, $timeLimitSecs: Int!) {
  startAttempt(subjectId: $subjectId, questionCount: $questionCount, timeLimitSecs: $timeLimitSecs) {
    attemptId timeLimitSecs
    questions {
      id text textSecondary difficulty explanation explanationSecondary
      options { id text textSecondary isCorrect position }
    }
  }
}";

const SUBMIT_ANSWERS: &str = "\
mutation SubmitAnswers($attemptId: ID!, $answers: [AnswerInput!]!) {
  submitAnswers(attemptId: $attemptId, answers: $answers) {
    success score correct wrong unanswered
  }
}";

const FETCH_RESULT: &str = "\
query FetchResult($attemptId: ID!) {
  result(attemptId: $attemptId) { score correct wrong unanswered }
}";

const FETCH_HISTORY: &str = "\
query FetchHistory {
  history { attemptId subjectName score correct totalQuestions takenAt }
}";

const FETCH_LEADERBOARD: &str = "\
query FetchLeaderboard($subjectId: ID) {
  leaderboard(subjectId: $subjectId) { displayName score attempts }
}";

//
// ─── WIRE TYPES ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    pub question_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionDto {
    id: OptionId,
    text: String,
    #[serde(default)]
    text_secondary: Option<String>,
    is_correct: bool,
    position: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuestionDto {
    id: QuestionId,
    text: String,
    #[serde(default)]
    text_secondary: Option<String>,
    difficulty: Difficulty,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    explanation_secondary: Option<String>,
    options: Vec<OptionDto>,
}

fn localized(primary: String, secondary: Option<String>) -> LocalizedText {
    let text = LocalizedText::new(primary);
    match secondary {
        Some(secondary) => text.with_secondary(secondary),
        None => text,
    }
}

impl QuestionDto {
    /// Convert the wire shape into the validated domain type. A payload
    /// failing question validation counts as a data-integrity failure.
    fn into_domain(self) -> Result<Question, ApiError> {
        let options = self
            .options
            .into_iter()
            .map(|o| {
                let text = localized(o.text, o.text_secondary);
                AnswerOption::new(o.id, text, o.is_correct, o.position)
            })
            .collect();
        let explanation = self
            .explanation
            .map(|primary| localized(primary, self.explanation_secondary));

        Question::new(
            self.id,
            localized(self.text, self.text_secondary),
            self.difficulty,
            options,
            explanation,
        )
        .map_err(|e| ApiError::Malformed(e.to_string()))
    }
}

fn into_questions(dtos: Vec<QuestionDto>) -> Result<Vec<Question>, ApiError> {
    dtos.into_iter().map(QuestionDto::into_domain).collect()
}

/// A freshly started attempt: server-issued id plus the initial question set.
#[derive(Debug, Clone, PartialEq)]
pub struct StartedAttempt {
    pub attempt_id: AttemptId,
    pub time_limit_secs: u32,
    pub questions: Vec<Question>,
}

/// Backend verdict on a submission. `success: false` is an explicit
/// rejection and is treated exactly like a transport failure by the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub success: bool,
    pub score: Option<AttemptScore>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub attempt_id: AttemptId,
    pub subject_name: String,
    pub score: u32,
    pub correct: u32,
    pub total_questions: u32,
    pub taken_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub display_name: String,
    pub score: u32,
    pub attempts: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnswerInput {
    question_id: QuestionId,
    option_id: OptionId,
}

//
// ─── BACKEND SEAM ──────────────────────────────────────────────────────────────
//

/// The slice of the backend the session flow depends on. The GraphQL-backed
/// [`QuizService`] is the production implementation; tests substitute mocks.
#[async_trait]
pub trait QuizBackend: Send + Sync {
    /// Re-fetch questions for a subject, used when a stored snapshot is
    /// unusable.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` for any boundary failure.
    async fn fetch_questions(
        &self,
        subject: SubjectId,
        count: u32,
    ) -> Result<Vec<Question>, ApiError>;

    /// Submit the selected answers for an attempt. Partial answer sets are
    /// valid and expected on timeout.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` for any boundary failure.
    async fn submit_answers(
        &self,
        attempt: AttemptId,
        answers: &[(QuestionId, OptionId)],
    ) -> Result<SubmitOutcome, ApiError>;
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// GraphQL wrapper for quiz and mock-test operations.
#[derive(Clone)]
pub struct QuizService {
    client: Arc<GraphqlClient>,
}

impl QuizService {
    #[must_use]
    pub fn new(client: Arc<GraphqlClient>) -> Self {
        Self { client }
    }

    /// # Errors
    ///
    /// Returns `ApiError` for any boundary failure.
    pub async fn fetch_subjects(&self) -> Result<Vec<Subject>, ApiError> {
        #[derive(Deserialize)]
        struct Data {
            subjects: Vec<Subject>,
        }
        let data: Data = self.client.execute(FETCH_SUBJECTS, &json!({})).await?;
        Ok(data.subjects)
    }

    /// Start a new attempt; the backend issues the attempt id and question
    /// set together.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` for any boundary failure, including a question
    /// payload that fails validation.
    pub async fn start_attempt(
        &self,
        subject: SubjectId,
        question_count: u32,
        time_limit_secs: u32,
    ) -> Result<StartedAttempt, ApiError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Started {
            attempt_id: AttemptId,
            time_limit_secs: u32,
            questions: Vec<QuestionDto>,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            start_attempt: Started,
        }

        let variables = json!({
            "subjectId": subject,
            "questionCount": question_count,
            "timeLimitSecs": time_limit_secs,
        });
        let data: Data = self.client.execute(START_ATTEMPT, &variables).await?;
        Ok(StartedAttempt {
            attempt_id: data.start_attempt.attempt_id,
            time_limit_secs: data.start_attempt.time_limit_secs,
            questions: into_questions(data.start_attempt.questions)?,
        })
    }

    /// # Errors
    ///
    /// Returns `ApiError` for any boundary failure.
    pub async fn fetch_result(&self, attempt: AttemptId) -> Result<AttemptScore, ApiError> {
        #[derive(Deserialize)]
        struct Data {
            result: AttemptScore,
        }
        let data: Data = self
            .client
            .execute(FETCH_RESULT, &json!({ "attemptId": attempt }))
            .await?;
        Ok(data.result)
    }

    /// # Errors
    ///
    /// Returns `ApiError` for any boundary failure.
    pub async fn fetch_history(&self) -> Result<Vec<HistoryEntry>, ApiError> {
        #[derive(Deserialize)]
        struct Data {
            history: Vec<HistoryEntry>,
        }
        let data: Data = self.client.execute(FETCH_HISTORY, &json!({})).await?;
        Ok(data.history)
    }

    /// Leaderboard rows ordered by score, highest first. Ordering is applied
    /// client-side; the backend's order is not relied upon.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` for any boundary failure.
    pub async fn fetch_leaderboard(
        &self,
        subject: Option<SubjectId>,
    ) -> Result<Vec<LeaderboardRow>, ApiError> {
        #[derive(Deserialize)]
        struct Data {
            leaderboard: Vec<LeaderboardRow>,
        }
        let data: Data = self
            .client
            .execute(FETCH_LEADERBOARD, &json!({ "subjectId": subject }))
            .await?;
        let mut rows = data.leaderboard;
        rows.sort_by(|a, b| b.score.cmp(&a.score));
        Ok(rows)
    }
}

#[async_trait]
impl QuizBackend for QuizService {
    async fn fetch_questions(
        &self,
        subject: SubjectId,
        count: u32,
    ) -> Result<Vec<Question>, ApiError> {
        #[derive(Deserialize)]
        struct Data {
            questions: Vec<QuestionDto>,
        }
        let variables = json!({ "subjectId": subject, "count": count });
        let data: Data = self.client.execute(FETCH_QUESTIONS, &variables).await?;
        into_questions(data.questions)
    }

    async fn submit_answers(
        &self,
        attempt: AttemptId,
        answers: &[(QuestionId, OptionId)],
    ) -> Result<SubmitOutcome, ApiError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Verdict {
            success: bool,
            #[serde(default)]
            score: Option<u32>,
            #[serde(default)]
            correct: Option<u32>,
            #[serde(default)]
            wrong: Option<u32>,
            #[serde(default)]
            unanswered: Option<u32>,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            submit_answers: Verdict,
        }

        let answers: Vec<AnswerInput> = answers
            .iter()
            .map(|&(question_id, option_id)| AnswerInput {
                question_id,
                option_id,
            })
            .collect();
        let variables = json!({ "attemptId": attempt, "answers": answers });
        let data: Data = self.client.execute(SUBMIT_ANSWERS, &variables).await?;

        let verdict = data.submit_answers;
        let score = match (verdict.score, verdict.correct, verdict.wrong, verdict.unanswered) {
            (Some(score), Some(correct), Some(wrong), Some(unanswered)) => {
                Some(AttemptScore::new(score, correct, wrong, unanswered))
            }
            _ => None,
        };
        Ok(SubmitOutcome {
            success: verdict.success,
            score,
        })
    }
}

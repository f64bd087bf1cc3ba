use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScoreError {
    #[error("answer counts ({sum}) do not match total questions ({total})")]
    CountMismatch { total: u32, sum: u32 },
}

/// Scoring returned by the backend after an attempt is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptScore {
    score: u32,
    correct: u32,
    wrong: u32,
    unanswered: u32,
}

impl AttemptScore {
    #[must_use]
    pub fn new(score: u32, correct: u32, wrong: u32, unanswered: u32) -> Self {
        Self {
            score,
            correct,
            wrong,
            unanswered,
        }
    }

    /// Rehydrate a score from a cached result, checking count consistency.
    ///
    /// # Errors
    ///
    /// Returns `ScoreError::CountMismatch` if the counts do not add up to the
    /// stated question total.
    pub fn from_cached(
        score: u32,
        correct: u32,
        wrong: u32,
        unanswered: u32,
        total_questions: u32,
    ) -> Result<Self, ScoreError> {
        let sum = correct + wrong + unanswered;
        if sum != total_questions {
            return Err(ScoreError::CountMismatch {
                total: total_questions,
                sum,
            });
        }
        Ok(Self::new(score, correct, wrong, unanswered))
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn wrong(&self) -> u32 {
        self.wrong
    }

    #[must_use]
    pub fn unanswered(&self) -> u32 {
        self.unanswered
    }

    /// Total questions covered by this score.
    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.correct + self.wrong + self.unanswered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_score_checks_counts() {
        let score = AttemptScore::from_cached(60, 3, 1, 1, 5).unwrap();
        assert_eq!(score.total_questions(), 5);

        let err = AttemptScore::from_cached(60, 3, 1, 1, 6).unwrap_err();
        assert_eq!(err, ScoreError::CountMismatch { total: 6, sum: 5 });
    }
}

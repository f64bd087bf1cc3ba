use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{OptionId, QuestionId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question {0} has fewer than two options")]
    TooFewOptions(QuestionId),

    #[error("question {0} has no correct option")]
    NoCorrectOption(QuestionId),

    #[error("question {0} has more than one correct option")]
    MultipleCorrectOptions(QuestionId),

    #[error("question {question} repeats option {option}")]
    DuplicateOption {
        question: QuestionId,
        option: OptionId,
    },
}

/// Display text in the primary UI language, with an optional translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    primary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    secondary: Option<String>,
}

impl LocalizedText {
    #[must_use]
    pub fn new(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: None,
        }
    }

    #[must_use]
    pub fn with_secondary(mut self, secondary: impl Into<String>) -> Self {
        self.secondary = Some(secondary.into());
        self
    }

    #[must_use]
    pub fn primary(&self) -> &str {
        &self.primary
    }

    #[must_use]
    pub fn secondary(&self) -> Option<&str> {
        self.secondary.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// One selectable answer within a question. The correctness flag is kept out
/// of UI bindings until results are shown; it never influences session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    id: OptionId,
    text: LocalizedText,
    correct: bool,
    position: u32,
}

impl AnswerOption {
    #[must_use]
    pub fn new(id: OptionId, text: LocalizedText, correct: bool, position: u32) -> Self {
        Self {
            id,
            text,
            correct,
            position,
        }
    }

    #[must_use]
    pub fn id(&self) -> OptionId {
        self.id
    }

    #[must_use]
    pub fn text(&self) -> &LocalizedText {
        &self.text
    }

    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.correct
    }

    /// Fixed display order within the question.
    #[must_use]
    pub fn position(&self) -> u32 {
        self.position
    }
}

/// A quiz question as delivered by the backend. Immutable once loaded into a
/// session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    id: QuestionId,
    text: LocalizedText,
    difficulty: Difficulty,
    options: Vec<AnswerOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    explanation: Option<LocalizedText>,
}

impl Question {
    /// Build a question, validating its option set.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when the question has fewer than two options,
    /// duplicate option ids, or anything other than exactly one correct
    /// option.
    pub fn new(
        id: QuestionId,
        text: LocalizedText,
        difficulty: Difficulty,
        mut options: Vec<AnswerOption>,
        explanation: Option<LocalizedText>,
    ) -> Result<Self, QuestionError> {
        if options.len() < 2 {
            return Err(QuestionError::TooFewOptions(id));
        }

        let mut seen = std::collections::HashSet::new();
        for option in &options {
            if !seen.insert(option.id()) {
                return Err(QuestionError::DuplicateOption {
                    question: id,
                    option: option.id(),
                });
            }
        }

        match options.iter().filter(|o| o.is_correct()).count() {
            0 => return Err(QuestionError::NoCorrectOption(id)),
            1 => {}
            _ => return Err(QuestionError::MultipleCorrectOptions(id)),
        }

        options.sort_by_key(AnswerOption::position);

        Ok(Self {
            id,
            text,
            difficulty,
            options,
            explanation,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn text(&self) -> &LocalizedText {
        &self.text
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Options in fixed display order.
    #[must_use]
    pub fn options(&self) -> &[AnswerOption] {
        &self.options
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&LocalizedText> {
        self.explanation.as_ref()
    }

    /// Returns true when the question carries an option with this id.
    #[must_use]
    pub fn has_option(&self, option: OptionId) -> bool {
        self.options.iter().any(|o| o.id() == option)
    }

    /// Id of the single correct option.
    #[must_use]
    pub fn correct_option(&self) -> OptionId {
        // Upheld by the constructor: exactly one correct option exists.
        self.options
            .iter()
            .find(|o| o.is_correct())
            .map(AnswerOption::id)
            .unwrap_or_else(|| self.options[0].id())
    }
}

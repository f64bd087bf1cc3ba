mod ids;
mod question;
mod score;
mod session;

pub use ids::{AttemptId, OptionId, ParseIdError, QuestionId, SubjectId};
pub use question::{AnswerOption, Difficulty, LocalizedText, Question, QuestionError};
pub use score::{AttemptScore, ScoreError};
pub use session::{QuestionStatus, QuizSession, SessionError};

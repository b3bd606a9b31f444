mod attempt;
mod ids;
mod question;
mod result;

pub use ids::{AnswerSheetId, AttemptId, OptionId, ParseIdError, QuestionId, QuizId};

pub use attempt::{AttemptError, QuizAttempt};
pub use question::{Question, QuestionError, QuestionKind, QuestionOption};
pub use result::{AttemptResult, AttemptStatus, ResultError};

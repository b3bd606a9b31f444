use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::duration::parse_duration_ms;
use crate::model::ids::{AnswerSheetId, OptionId};
use crate::model::question::{Question, QuestionError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("attempt has no questions")]
    NoQuestions,

    #[error("cursor {cursor} out of bounds for {len} questions")]
    CursorOutOfBounds { cursor: usize, len: usize },

    #[error("total points {declared} does not match question sum {actual}")]
    PointsMismatch { declared: u32, actual: u32 },

    #[error(transparent)]
    Question(#[from] QuestionError),
}

/// One in-progress pass through a quiz.
///
/// The question list and attempt metadata are immutable after load; the only
/// moving parts are the cursor and per-question selections. The cursor never
/// decreases and never exceeds `questions.len() - 1`, so there is always a
/// current question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizAttempt {
    answer_sheet_id: AnswerSheetId,
    title: String,
    questions: Vec<Question>,
    total_points: u32,
    started_at: DateTime<Utc>,
    time_limit: String,
    cursor: usize,
}

impl QuizAttempt {
    /// Create a fresh attempt with the cursor on the first question.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::NoQuestions` for an empty question list and
    /// `AttemptError::PointsMismatch` when the declared total does not equal
    /// the sum of question points.
    pub fn new(
        answer_sheet_id: AnswerSheetId,
        title: impl Into<String>,
        questions: Vec<Question>,
        total_points: u32,
        started_at: DateTime<Utc>,
        time_limit: impl Into<String>,
    ) -> Result<Self, AttemptError> {
        Self::from_persisted(
            answer_sheet_id,
            title,
            questions,
            total_points,
            started_at,
            time_limit,
            0,
        )
    }

    /// Rehydrate an attempt from persisted storage.
    ///
    /// An attempt is either fully consistent or not constructed at all:
    /// partial sessions are never observable.
    ///
    /// # Errors
    ///
    /// In addition to the [`QuizAttempt::new`] checks, returns
    /// `AttemptError::CursorOutOfBounds` when the stored cursor does not point
    /// at a question.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        answer_sheet_id: AnswerSheetId,
        title: impl Into<String>,
        questions: Vec<Question>,
        total_points: u32,
        started_at: DateTime<Utc>,
        time_limit: impl Into<String>,
        cursor: usize,
    ) -> Result<Self, AttemptError> {
        if questions.is_empty() {
            return Err(AttemptError::NoQuestions);
        }
        if cursor >= questions.len() {
            return Err(AttemptError::CursorOutOfBounds {
                cursor,
                len: questions.len(),
            });
        }

        let actual: u32 = questions.iter().map(Question::points).sum();
        if actual != total_points {
            return Err(AttemptError::PointsMismatch {
                declared: total_points,
                actual,
            });
        }

        Ok(Self {
            answer_sheet_id,
            title: title.into(),
            questions,
            total_points,
            started_at,
            time_limit: time_limit.into(),
            cursor,
        })
    }

    #[must_use]
    pub fn answer_sheet_id(&self) -> AnswerSheetId {
        self.answer_sheet_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn total_points(&self) -> u32 {
        self.total_points
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// The textual duration encoding as issued by the service.
    #[must_use]
    pub fn time_limit(&self) -> &str {
        &self.time_limit
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The question the cursor points at. Always present: the cursor is kept
    /// in bounds by construction.
    #[must_use]
    pub fn current_question(&self) -> &Question {
        &self.questions[self.cursor]
    }

    #[must_use]
    pub fn is_last_question(&self) -> bool {
        self.cursor + 1 == self.questions.len()
    }

    /// Questions left after the current one.
    #[must_use]
    pub fn remaining_questions(&self) -> usize {
        self.questions.len() - self.cursor - 1
    }

    /// Absolute instant after which no further answers are accepted.
    ///
    /// A malformed time limit parses as zero, so the deadline collapses onto
    /// `started_at` and the attempt reads as already expired. A limit too
    /// large to represent clamps to the maximum instant.
    #[must_use]
    pub fn deadline(&self) -> DateTime<Utc> {
        let limit_ms = parse_duration_ms(&self.time_limit);
        let limit = i64::try_from(limit_ms).unwrap_or(i64::MAX);
        self.started_at
            .checked_add_signed(Duration::milliseconds(limit))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Move the cursor to the next question.
    ///
    /// Returns `false` (and leaves the cursor untouched) when already on the
    /// last question; advancing past the end is impossible.
    pub fn advance_cursor(&mut self) -> bool {
        if self.is_last_question() {
            return false;
        }
        self.cursor += 1;
        true
    }

    /// Update the selection of the current question only.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::UnknownOption` when the id does not belong to
    /// the current question.
    pub fn select_option(
        &mut self,
        option_id: OptionId,
        selected: bool,
    ) -> Result<(), QuestionError> {
        self.questions[self.cursor].set_option(option_id, selected)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{AttemptError, ResultError};
use storage::repository::StorageError;

/// Errors emitted by the assessment service boundary.
///
/// The deadline-race conditions (`AlreadyFinished`, `TimeWindowClosed`) are
/// distinguished by the service's structured error code, never by matching
/// message text.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AssessmentError {
    #[error("attempt is already finished")]
    AlreadyFinished,

    #[error("attempt time window has closed")]
    TimeWindowClosed,

    #[error("assessment service rejected the request: {message}")]
    Rejected { message: String },

    #[error("assessment service returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("assessment service sent an inconsistent attempt: {0}")]
    InvalidAttempt(#[from] AttemptError),

    #[error("assessment service sent an inconsistent result: {0}")]
    InvalidResult(#[from] ResultError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl AssessmentError {
    /// True for the finish failures that mean "the attempt is settled
    /// server-side"; the coordinator recovers from these by refetching the
    /// authoritative result instead of surfacing an error.
    #[must_use]
    pub fn is_already_settled(&self) -> bool {
        matches!(self, Self::AlreadyFinished | Self::TimeWindowClosed)
    }
}

/// Errors emitted by the submission coordinator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SubmitError {
    #[error("no attempt in progress")]
    NoAttempt,

    #[error("a submission is already in flight")]
    Busy,

    #[error("failed to start attempt: {0}")]
    Start(#[source] AssessmentError),

    #[error("failed to save answer: {0}")]
    Save(#[source] AssessmentError),

    #[error("failed to finish attempt: {0}")]
    Finish(#[source] AssessmentError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Snapshot(#[from] AttemptError),
}

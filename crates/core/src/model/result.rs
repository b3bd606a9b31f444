use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{AttemptId, QuizId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResultError {
    #[error("time_finish is before time_start")]
    InvalidTimeRange,
}

/// Server-side lifecycle status of an answer sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptStatus {
    #[serde(rename = "in_progress")]
    InProgress,
    #[serde(rename = "completed")]
    Completed,
}

/// Finalized outcome of one attempt, as scored by the assessment service.
///
/// Written once by the finish path, read by the results view, cleared on the
/// next quiz start.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptResult {
    id: AttemptId,
    quiz_id: QuizId,
    attempt_score: f64,
    total_points: u32,
    time_start: DateTime<Utc>,
    time_finish: DateTime<Utc>,
    status: AttemptStatus,
}

impl AttemptResult {
    /// Build a result from the finish response.
    ///
    /// # Errors
    ///
    /// Returns `ResultError::InvalidTimeRange` when the finish instant
    /// precedes the start instant.
    pub fn new(
        id: AttemptId,
        quiz_id: QuizId,
        attempt_score: f64,
        total_points: u32,
        time_start: DateTime<Utc>,
        time_finish: DateTime<Utc>,
        status: AttemptStatus,
    ) -> Result<Self, ResultError> {
        if time_finish < time_start {
            return Err(ResultError::InvalidTimeRange);
        }

        Ok(Self {
            id,
            quiz_id,
            attempt_score,
            total_points,
            time_start,
            time_finish,
            status,
        })
    }

    #[must_use]
    pub fn id(&self) -> AttemptId {
        self.id
    }

    #[must_use]
    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    #[must_use]
    pub fn attempt_score(&self) -> f64 {
        self.attempt_score
    }

    #[must_use]
    pub fn total_points(&self) -> u32 {
        self.total_points
    }

    #[must_use]
    pub fn time_start(&self) -> DateTime<Utc> {
        self.time_start
    }

    #[must_use]
    pub fn time_finish(&self) -> DateTime<Utc> {
        self.time_finish
    }

    #[must_use]
    pub fn status(&self) -> AttemptStatus {
        self.status
    }

    /// Wall-clock time spent on the attempt.
    #[must_use]
    pub fn time_taken(&self) -> Duration {
        self.time_finish - self.time_start
    }

    /// Score as a percentage of the available points.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        if self.total_points == 0 {
            return 0.0;
        }
        self.attempt_score / f64::from(self.total_points) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn result(score: f64, total: u32) -> AttemptResult {
        let start = fixed_now();
        AttemptResult::new(
            AttemptId::new(1),
            QuizId::new(2),
            score,
            total,
            start,
            start + Duration::seconds(95),
            AttemptStatus::Completed,
        )
        .unwrap()
    }

    #[test]
    fn finish_before_start_is_rejected() {
        let start = fixed_now();
        let err = AttemptResult::new(
            AttemptId::new(1),
            QuizId::new(2),
            1.0,
            10,
            start,
            start - Duration::seconds(1),
            AttemptStatus::Completed,
        )
        .unwrap_err();
        assert!(matches!(err, ResultError::InvalidTimeRange));
    }

    #[test]
    fn time_taken_spans_start_to_finish() {
        assert_eq!(result(5.0, 10).time_taken(), Duration::seconds(95));
    }

    #[test]
    fn percentage_of_total_points() {
        let r = result(7.5, 10);
        assert!((r.percentage() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn percentage_with_zero_total_is_zero() {
        assert!(result(0.0, 0).percentage().abs() < f64::EPSILON);
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::model::{
    AnswerSheetId, AttemptError, OptionId, Question, QuestionId, QuestionKind, QuestionOption,
    QuizAttempt,
};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted shape for one answer option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionRecord {
    pub id: OptionId,
    pub label: String,
}

/// Persisted shape for one question, selection included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRecord {
    pub id: QuestionId,
    pub text: String,
    pub points: u32,
    pub kind: QuestionKind,
    pub options: Vec<OptionRecord>,
    pub selected: Vec<OptionId>,
}

/// Persisted mirror of an in-progress [`QuizAttempt`].
///
/// This carries only durable session state. Transient fields (the store's
/// busy flag) are excluded by construction, so a restored session always
/// comes back idle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptSnapshot {
    pub answer_sheet_id: AnswerSheetId,
    pub title: String,
    pub total_points: u32,
    pub started_at: DateTime<Utc>,
    pub time_limit: String,
    pub cursor: usize,
    pub questions: Vec<QuestionRecord>,
}

impl AttemptSnapshot {
    #[must_use]
    pub fn from_attempt(attempt: &QuizAttempt) -> Self {
        let questions = attempt
            .questions()
            .iter()
            .map(|q| QuestionRecord {
                id: q.id(),
                text: q.text().to_owned(),
                points: q.points(),
                kind: q.kind(),
                options: q
                    .options()
                    .iter()
                    .map(|o| OptionRecord {
                        id: o.id(),
                        label: o.label().to_owned(),
                    })
                    .collect(),
                selected: q.selected_ids(),
            })
            .collect();

        Self {
            answer_sheet_id: attempt.answer_sheet_id(),
            title: attempt.title().to_owned(),
            total_points: attempt.total_points(),
            started_at: attempt.started_at(),
            time_limit: attempt.time_limit().to_owned(),
            cursor: attempt.cursor(),
            questions,
        }
    }

    /// Convert the snapshot back into a domain [`QuizAttempt`].
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` when the stored data violates a session
    /// invariant (cursor out of bounds, selection outside its question, point
    /// totals that do not add up). A corrupt snapshot yields no session at
    /// all rather than a partially consistent one.
    pub fn into_attempt(self) -> Result<QuizAttempt, AttemptError> {
        let mut questions = Vec::with_capacity(self.questions.len());
        for record in self.questions {
            let options = record
                .options
                .into_iter()
                .map(|o| QuestionOption::new(o.id, o.label))
                .collect();
            let selected: BTreeSet<OptionId> = record.selected.into_iter().collect();
            questions.push(Question::from_persisted(
                record.id,
                record.text,
                record.points,
                record.kind,
                options,
                selected,
            )?);
        }

        QuizAttempt::from_persisted(
            self.answer_sheet_id,
            self.title,
            questions,
            self.total_points,
            self.started_at,
            self.time_limit,
            self.cursor,
        )
    }
}

/// Repository contract for the single in-progress attempt slot.
///
/// The device holds at most one attempt at a time, so the slot has no key:
/// saving replaces whatever was there before.
#[async_trait]
pub trait AttemptSnapshotRepository: Send + Sync {
    /// Persist or replace the in-progress attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be stored.
    async fn save_snapshot(&self, snapshot: &AttemptSnapshot) -> Result<(), StorageError>;

    /// Fetch the in-progress attempt, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for connection or decoding failures; an empty
    /// slot is `Ok(None)`, not an error.
    async fn load_snapshot(&self) -> Result<Option<AttemptSnapshot>, StorageError>;

    /// Empty the slot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the slot cannot be cleared.
    async fn clear_snapshot(&self) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    slot: Arc<Mutex<Option<AttemptSnapshot>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }
}

#[async_trait]
impl AttemptSnapshotRepository for InMemoryRepository {
    async fn save_snapshot(&self, snapshot: &AttemptSnapshot) -> Result<(), StorageError> {
        let mut guard = self
            .slot
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = Some(snapshot.clone());
        Ok(())
    }

    async fn load_snapshot(&self) -> Result<Option<AttemptSnapshot>, StorageError> {
        let guard = self
            .slot
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }

    async fn clear_snapshot(&self) -> Result<(), StorageError> {
        let mut guard = self
            .slot
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = None;
        Ok(())
    }
}

/// Aggregates the attempt repository behind a trait object for easy backend
/// swapping.
#[derive(Clone)]
pub struct Storage {
    pub attempts: Arc<dyn AttemptSnapshotRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            attempts: Arc::new(InMemoryRepository::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::time::fixed_now;

    fn build_attempt() -> QuizAttempt {
        let questions = vec![
            Question::new(
                QuestionId::new(1),
                "First",
                5,
                QuestionKind::SingleChoice,
                vec![
                    QuestionOption::new(OptionId::new(10), "A"),
                    QuestionOption::new(OptionId::new(11), "B"),
                ],
            )
            .unwrap(),
            Question::new(
                QuestionId::new(2),
                "Second",
                5,
                QuestionKind::MultiChoice,
                vec![
                    QuestionOption::new(OptionId::new(20), "C"),
                    QuestionOption::new(OptionId::new(21), "D"),
                ],
            )
            .unwrap(),
        ];
        QuizAttempt::new(
            AnswerSheetId::new(42),
            "Persisted quiz",
            questions,
            10,
            fixed_now(),
            "PT15M",
        )
        .unwrap()
    }

    #[test]
    fn snapshot_round_trips_attempt_state() {
        let mut attempt = build_attempt();
        attempt.select_option(OptionId::new(11), true).unwrap();
        attempt.advance_cursor();

        let snapshot = AttemptSnapshot::from_attempt(&attempt);
        let restored = snapshot.into_attempt().unwrap();

        assert_eq!(restored, attempt);
        assert_eq!(restored.cursor(), 1);
        assert_eq!(
            restored.questions()[0].selected_ids(),
            vec![OptionId::new(11)]
        );
    }

    #[test]
    fn corrupt_cursor_yields_no_attempt() {
        let attempt = build_attempt();
        let mut snapshot = AttemptSnapshot::from_attempt(&attempt);
        snapshot.cursor = 9;

        let err = snapshot.into_attempt().unwrap_err();
        assert!(matches!(err, AttemptError::CursorOutOfBounds { .. }));
    }

    #[test]
    fn corrupt_selection_yields_no_attempt() {
        let attempt = build_attempt();
        let mut snapshot = AttemptSnapshot::from_attempt(&attempt);
        snapshot.questions[0].selected = vec![OptionId::new(999)];

        assert!(snapshot.into_attempt().is_err());
    }

    #[tokio::test]
    async fn in_memory_slot_saves_loads_and_clears() {
        let repo = InMemoryRepository::new();
        assert!(repo.load_snapshot().await.unwrap().is_none());

        let snapshot = AttemptSnapshot::from_attempt(&build_attempt());
        repo.save_snapshot(&snapshot).await.unwrap();
        assert_eq!(repo.load_snapshot().await.unwrap(), Some(snapshot));

        repo.clear_snapshot().await.unwrap();
        assert!(repo.load_snapshot().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn saving_replaces_the_previous_slot() {
        let repo = InMemoryRepository::new();

        let first = AttemptSnapshot::from_attempt(&build_attempt());
        repo.save_snapshot(&first).await.unwrap();

        let mut attempt = build_attempt();
        attempt.advance_cursor();
        let second = AttemptSnapshot::from_attempt(&attempt);
        repo.save_snapshot(&second).await.unwrap();

        assert_eq!(repo.load_snapshot().await.unwrap(), Some(second));
    }
}

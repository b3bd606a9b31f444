//! In-memory holder for the single in-progress attempt.
//!
//! The store owns at most one [`QuizAttempt`] at a time plus a transient
//! `busy` flag raised while a network submission is in flight. Mutation goes
//! through `&mut self`, so overlapping writers are ruled out at compile time;
//! `busy` exists to make user-driven actions cooperative no-ops while the
//! coordinator is talking to the service.

use tracing::debug;

use quiz_core::model::{AttemptError, OptionId, QuizAttempt};
use storage::repository::AttemptSnapshot;

#[derive(Debug, Default)]
pub struct AttemptStore {
    attempt: Option<QuizAttempt>,
    busy: bool,
}

impl AttemptStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the session wholesale with a freshly started attempt.
    pub fn load(&mut self, attempt: QuizAttempt) {
        self.attempt = Some(attempt);
    }

    /// Drop the session. The busy flag resets with it.
    pub fn clear(&mut self) {
        self.attempt = None;
        self.busy = false;
    }

    #[must_use]
    pub fn attempt(&self) -> Option<&QuizAttempt> {
        self.attempt.as_ref()
    }

    #[must_use]
    pub fn has_attempt(&self) -> bool {
        self.attempt.is_some()
    }

    /// True while a submission is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Toggle an option on the current question.
    ///
    /// Returns `false` without touching any state when the store is busy,
    /// holds no attempt, or the option does not belong to the current
    /// question. A late click is a non-event, never an error.
    pub fn select_option(&mut self, option_id: OptionId, selected: bool) -> bool {
        if self.busy {
            debug!(%option_id, "ignoring selection while a submission is in flight");
            return false;
        }
        let Some(attempt) = self.attempt.as_mut() else {
            return false;
        };
        match attempt.select_option(option_id, selected) {
            Ok(()) => true,
            Err(err) => {
                debug!(%err, "ignoring selection outside the current question");
                false
            }
        }
    }

    /// Move to the next question; `false` at the end of the quiz.
    pub fn advance_cursor(&mut self) -> bool {
        self.attempt.as_mut().is_some_and(QuizAttempt::advance_cursor)
    }

    /// Raise the busy flag for a user-driven submission.
    ///
    /// Returns `false` when a submission is already in flight; the caller
    /// must not proceed.
    pub(crate) fn begin_submission(&mut self) -> bool {
        if self.busy {
            return false;
        }
        self.busy = true;
        true
    }

    /// Raise the busy flag unconditionally. Deadline expiry outranks any
    /// in-flight user action.
    pub(crate) fn force_begin_submission(&mut self) {
        self.busy = true;
    }

    pub(crate) fn end_submission(&mut self) {
        self.busy = false;
    }

    /// Durable view of the session, or `None` when no attempt is held.
    #[must_use]
    pub fn snapshot(&self) -> Option<AttemptSnapshot> {
        self.attempt.as_ref().map(AttemptSnapshot::from_attempt)
    }

    /// Rehydrate the session from a persisted snapshot. The restored store
    /// is always idle.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` when the snapshot violates a session invariant;
    /// the store is left unchanged in that case.
    pub fn restore(&mut self, snapshot: AttemptSnapshot) -> Result<(), AttemptError> {
        let attempt = snapshot.into_attempt()?;
        self.attempt = Some(attempt);
        self.busy = false;
        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{
        AnswerSheetId, Question, QuestionId, QuestionKind, QuestionOption, QuizAttempt,
    };
    use quiz_core::time::fixed_now;

    fn two_question_attempt() -> QuizAttempt {
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
            AnswerSheetId::new(7),
            "Store quiz",
            questions,
            10,
            fixed_now(),
            "PT10M",
        )
        .unwrap()
    }

    fn loaded_store() -> AttemptStore {
        let mut store = AttemptStore::new();
        store.load(two_question_attempt());
        store
    }

    #[test]
    fn selection_applies_to_the_current_question() {
        let mut store = loaded_store();
        assert!(store.select_option(OptionId::new(10), true));
        assert_eq!(
            store.attempt().unwrap().current_question().selected_ids(),
            vec![OptionId::new(10)]
        );
    }

    #[test]
    fn selection_while_busy_is_a_no_op() {
        let mut store = loaded_store();
        assert!(store.begin_submission());

        assert!(!store.select_option(OptionId::new(10), true));
        assert!(
            store
                .attempt()
                .unwrap()
                .current_question()
                .selected()
                .is_empty()
        );

        store.end_submission();
        assert!(store.select_option(OptionId::new(10), true));
    }

    #[test]
    fn selection_with_no_attempt_is_a_no_op() {
        let mut store = AttemptStore::new();
        assert!(!store.select_option(OptionId::new(10), true));
    }

    #[test]
    fn foreign_option_is_ignored() {
        let mut store = loaded_store();
        // Option 20 belongs to the second question; the cursor is on the first.
        assert!(!store.select_option(OptionId::new(20), true));
        assert!(
            store
                .attempt()
                .unwrap()
                .current_question()
                .selected()
                .is_empty()
        );
    }

    #[test]
    fn begin_submission_rejects_reentry() {
        let mut store = loaded_store();
        assert!(store.begin_submission());
        assert!(!store.begin_submission());

        store.end_submission();
        assert!(store.begin_submission());
    }

    #[test]
    fn force_begin_outranks_an_in_flight_submission() {
        let mut store = loaded_store();
        assert!(store.begin_submission());
        store.force_begin_submission();
        assert!(store.is_busy());
    }

    #[test]
    fn clear_resets_the_busy_flag() {
        let mut store = loaded_store();
        store.force_begin_submission();
        store.clear();

        assert!(!store.has_attempt());
        assert!(!store.is_busy());
    }

    #[test]
    fn restore_round_trips_and_lands_idle() {
        let mut store = loaded_store();
        store.select_option(OptionId::new(11), true);
        store.advance_cursor();
        let snapshot = store.snapshot().unwrap();

        let mut restored = AttemptStore::new();
        restored.force_begin_submission();
        restored.restore(snapshot).unwrap();

        assert!(!restored.is_busy());
        assert_eq!(restored.attempt(), store.attempt());
        assert_eq!(restored.attempt().unwrap().cursor(), 1);
    }

    #[test]
    fn corrupt_snapshot_leaves_the_store_unchanged() {
        let mut snapshot = loaded_store().snapshot().unwrap();
        snapshot.cursor = 99;

        let mut fresh = AttemptStore::new();
        assert!(fresh.restore(snapshot).is_err());
        assert!(!fresh.has_attempt());
    }

    #[test]
    fn snapshot_of_an_empty_store_is_none() {
        let store = AttemptStore::new();
        assert!(store.snapshot().is_none());
    }
}

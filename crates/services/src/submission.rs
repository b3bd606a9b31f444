//! Submission coordinator.
//!
//! Drives the answer/advance/finish lifecycle against the assessment service
//! and keeps the [`AttemptStore`], snapshot repository, and [`ResultStore`]
//! consistent with each other. Two paths can try to finish the same attempt
//! near the deadline (the user's last submit and the expiry handler); the
//! service settles each sheet exactly once, so whichever path loses the race
//! recovers the already-settled result instead of failing.

use std::sync::Arc;

use tracing::{debug, warn};

use quiz_core::model::{AttemptResult, QuizId};
use storage::repository::AttemptSnapshotRepository;

use crate::assessment::{AssessmentApi, SaveAnswerRequest};
use crate::attempt_store::AttemptStore;
use crate::error::{AssessmentError, SubmitError};
use crate::result_handoff::ResultStore;

/// What happened to a submitted answer.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The answer was saved and the cursor moved to the next question.
    Next,
    /// The answer was saved, the attempt was finished, and this is the
    /// scored result.
    Finished(AttemptResult),
}

pub struct SubmissionService {
    api: Arc<dyn AssessmentApi>,
    snapshots: Option<Arc<dyn AttemptSnapshotRepository>>,
    results: ResultStore,
}

impl SubmissionService {
    #[must_use]
    pub fn new(api: Arc<dyn AssessmentApi>, results: ResultStore) -> Self {
        Self {
            api,
            snapshots: None,
            results,
        }
    }

    /// Attach a snapshot repository so the in-progress attempt survives a
    /// process restart.
    #[must_use]
    pub fn with_snapshots(mut self, snapshots: Arc<dyn AttemptSnapshotRepository>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    #[must_use]
    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    /// Open a fresh attempt and seed the store with it.
    ///
    /// Any previously published result is cleared first so the results view
    /// never shows a stale outcome for the new quiz.
    ///
    /// # Errors
    ///
    /// Returns `SubmitError::Busy` when a submission is already in flight,
    /// `SubmitError::Start` when the service rejects the request, and
    /// `SubmitError::Storage` when the initial snapshot cannot be saved.
    pub async fn start_attempt(
        &self,
        store: &mut AttemptStore,
        quiz_id: QuizId,
        quiz_key: &str,
    ) -> Result<(), SubmitError> {
        if !store.begin_submission() {
            return Err(SubmitError::Busy);
        }
        let outcome = self.start_inner(store, quiz_id, quiz_key).await;
        store.end_submission();
        outcome
    }

    async fn start_inner(
        &self,
        store: &mut AttemptStore,
        quiz_id: QuizId,
        quiz_key: &str,
    ) -> Result<(), SubmitError> {
        let attempt = self
            .api
            .start_attempt(quiz_id, quiz_key)
            .await
            .map_err(SubmitError::Start)?;
        debug!(answer_sheet_id = %attempt.answer_sheet_id(), %quiz_id, "attempt started");

        self.results.clear();
        store.load(attempt);
        self.persist(store).await
    }

    /// Rehydrate the store from the snapshot repository.
    ///
    /// Returns `Ok(false)` when there is nothing to restore (no repository
    /// attached, or the slot is empty).
    ///
    /// # Errors
    ///
    /// Returns `SubmitError::Storage` for repository failures and
    /// `SubmitError::Snapshot` when the persisted data violates a session
    /// invariant.
    pub async fn restore_attempt(&self, store: &mut AttemptStore) -> Result<bool, SubmitError> {
        let Some(snapshots) = &self.snapshots else {
            return Ok(false);
        };
        match snapshots.load_snapshot().await? {
            Some(snapshot) => {
                store.restore(snapshot)?;
                debug!("attempt restored from snapshot");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Submit the current question's answer.
    ///
    /// On a non-last question the cursor advances and the session is
    /// re-persisted. On the last question the attempt is finished and the
    /// scored result returned. The cursor never moves when the save fails.
    ///
    /// # Errors
    ///
    /// Returns `SubmitError::Busy` when a submission is already in flight,
    /// `SubmitError::NoAttempt` when the store is empty, and
    /// `SubmitError::Save`/`SubmitError::Finish` for service failures.
    pub async fn submit_current_answer(
        &self,
        store: &mut AttemptStore,
    ) -> Result<SubmitOutcome, SubmitError> {
        if !store.begin_submission() {
            return Err(SubmitError::Busy);
        }
        let outcome = self.submit_inner(store).await;
        store.end_submission();
        outcome
    }

    async fn submit_inner(&self, store: &mut AttemptStore) -> Result<SubmitOutcome, SubmitError> {
        let attempt = store.attempt().ok_or(SubmitError::NoAttempt)?;
        let request =
            SaveAnswerRequest::for_question(attempt.answer_sheet_id(), attempt.current_question());
        let is_last = attempt.is_last_question();

        if let Err(err) = self.api.save_answer(&request).await {
            warn!(question_id = %request.question_id, error = %err, "saving answer failed");
            return Err(SubmitError::Save(err));
        }
        debug!(question_id = %request.question_id, "answer saved");

        if is_last {
            let result = self.finish_inner(store).await?;
            return Ok(SubmitOutcome::Finished(result));
        }

        store.advance_cursor();
        self.persist(store).await?;
        Ok(SubmitOutcome::Next)
    }

    /// Finish the attempt on the user's request without saving an answer.
    ///
    /// # Errors
    ///
    /// Returns `SubmitError::Busy` when a submission is already in flight,
    /// `SubmitError::NoAttempt` when the store is empty, and
    /// `SubmitError::Finish` when the service fails.
    pub async fn finish_attempt(
        &self,
        store: &mut AttemptStore,
    ) -> Result<AttemptResult, SubmitError> {
        if !store.begin_submission() {
            return Err(SubmitError::Busy);
        }
        let outcome = self.finish_inner(store).await;
        store.end_submission();
        outcome
    }

    /// Finish the attempt because the countdown expired.
    ///
    /// Expiry outranks the busy flag: the deadline does not wait for an
    /// in-flight save. When the session is already gone (a manual finish won
    /// the race), the published result is returned without another network
    /// call.
    ///
    /// # Errors
    ///
    /// Returns `SubmitError::NoAttempt` when there is neither a session nor
    /// a published result, and `SubmitError::Finish` when the service fails.
    pub async fn finish_on_expiry(
        &self,
        store: &mut AttemptStore,
    ) -> Result<AttemptResult, SubmitError> {
        if !store.has_attempt() {
            return self.results.current().ok_or(SubmitError::NoAttempt);
        }
        store.force_begin_submission();
        let outcome = self.finish_inner(store).await;
        store.end_submission();
        outcome
    }

    async fn finish_inner(&self, store: &mut AttemptStore) -> Result<AttemptResult, SubmitError> {
        let sheet_id = store
            .attempt()
            .ok_or(SubmitError::NoAttempt)?
            .answer_sheet_id();

        let result = match self.api.finish_attempt(sheet_id).await {
            Ok(result) => result,
            Err(err) if err.is_already_settled() => {
                // The other finish path got there first. The sheet is settled
                // server-side, so one refetch returns the authoritative
                // result.
                warn!(
                    answer_sheet_id = %sheet_id,
                    error = %err,
                    "finish raced the deadline, refetching the settled result"
                );
                self.api
                    .finish_attempt(sheet_id)
                    .await
                    .map_err(SubmitError::Finish)?
            }
            Err(err) => {
                warn!(answer_sheet_id = %sheet_id, error = %err, "finishing attempt failed");
                return Err(SubmitError::Finish(err));
            }
        };

        store.clear();
        if let Some(snapshots) = &self.snapshots {
            snapshots.clear_snapshot().await?;
        }
        self.results.publish(result.clone());
        debug!(
            answer_sheet_id = %sheet_id,
            score = result.attempt_score(),
            "attempt finished"
        );
        Ok(result)
    }

    async fn persist(&self, store: &AttemptStore) -> Result<(), SubmitError> {
        if let Some(snapshots) = &self.snapshots
            && let Some(snapshot) = store.snapshot()
        {
            snapshots.save_snapshot(&snapshot).await?;
        }
        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use quiz_core::Clock;
    use quiz_core::model::{
        AnswerSheetId, AttemptId, AttemptStatus, OptionId, Question, QuestionId, QuestionKind,
        QuestionOption, QuizAttempt,
    };
    use quiz_core::time::fixed_now;
    use storage::repository::{InMemoryRepository, Storage};

    use crate::countdown::CountdownTimer;

    fn question(id: u64, kind: QuestionKind) -> Question {
        Question::new(
            QuestionId::new(id),
            format!("Question {id}"),
            5,
            kind,
            vec![
                QuestionOption::new(OptionId::new(id * 10), "A"),
                QuestionOption::new(OptionId::new(id * 10 + 1), "B"),
            ],
        )
        .unwrap()
    }

    fn attempt(question_count: u64) -> QuizAttempt {
        let questions: Vec<Question> = (1..=question_count)
            .map(|id| question(id, QuestionKind::SingleChoice))
            .collect();
        let total = 5 * u32::try_from(question_count).unwrap();
        QuizAttempt::new(
            AnswerSheetId::new(42),
            "Coordinator quiz",
            questions,
            total,
            fixed_now(),
            "PT30M",
        )
        .unwrap()
    }

    fn scored_result() -> AttemptResult {
        let start = fixed_now();
        AttemptResult::new(
            AttemptId::new(9),
            QuizId::new(3),
            8.0,
            10,
            start,
            start + ChronoDuration::minutes(12),
            AttemptStatus::Completed,
        )
        .unwrap()
    }

    #[derive(Default)]
    struct FakeApi {
        start_responses: Mutex<VecDeque<Result<QuizAttempt, AssessmentError>>>,
        save_responses: Mutex<VecDeque<Result<(), AssessmentError>>>,
        finish_responses: Mutex<VecDeque<Result<AttemptResult, AssessmentError>>>,
        saved_requests: Mutex<Vec<SaveAnswerRequest>>,
        finish_calls: AtomicUsize,
    }

    impl FakeApi {
        fn with_saves(self, saves: Vec<Result<(), AssessmentError>>) -> Self {
            *self.save_responses.lock().unwrap() = saves.into();
            self
        }

        fn with_finishes(self, finishes: Vec<Result<AttemptResult, AssessmentError>>) -> Self {
            *self.finish_responses.lock().unwrap() = finishes.into();
            self
        }

        fn with_starts(self, starts: Vec<Result<QuizAttempt, AssessmentError>>) -> Self {
            *self.start_responses.lock().unwrap() = starts.into();
            self
        }

        fn saved(&self) -> Vec<SaveAnswerRequest> {
            self.saved_requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AssessmentApi for FakeApi {
        async fn start_attempt(
            &self,
            _quiz_id: QuizId,
            _quiz_key: &str,
        ) -> Result<QuizAttempt, AssessmentError> {
            self.start_responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(AssessmentError::Rejected {
                    message: "unexpected start".into(),
                }))
        }

        async fn save_answer(&self, request: &SaveAnswerRequest) -> Result<(), AssessmentError> {
            self.saved_requests.lock().unwrap().push(request.clone());
            self.save_responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(()))
        }

        async fn finish_attempt(
            &self,
            _answer_sheet_id: AnswerSheetId,
        ) -> Result<AttemptResult, AssessmentError> {
            self.finish_calls.fetch_add(1, Ordering::SeqCst);
            self.finish_responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(AssessmentError::Rejected {
                    message: "unexpected finish".into(),
                }))
        }
    }

    fn service(api: FakeApi) -> (SubmissionService, Arc<FakeApi>) {
        let api = Arc::new(api);
        let service = SubmissionService::new(api.clone(), ResultStore::new());
        (service, api)
    }

    #[tokio::test]
    async fn start_seeds_the_store_and_clears_stale_results() {
        let (service, _api) = service(FakeApi::default().with_starts(vec![Ok(attempt(2))]));
        let repo = Arc::new(InMemoryRepository::new());
        let service = service.with_snapshots(repo.clone());
        service.results().publish(scored_result());

        let mut store = AttemptStore::new();
        service
            .start_attempt(&mut store, QuizId::new(3), "secret")
            .await
            .unwrap();

        assert!(store.has_attempt());
        assert!(!store.is_busy());
        assert!(service.results().current().is_none());
        assert!(repo.load_snapshot().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn submit_on_a_non_last_question_advances_and_persists() {
        let (service, api) = service(FakeApi::default());
        let repo = Arc::new(InMemoryRepository::new());
        let service = service.with_snapshots(repo.clone());

        let mut store = AttemptStore::new();
        store.load(attempt(2));
        store.select_option(OptionId::new(11), true);

        let outcome = service.submit_current_answer(&mut store).await.unwrap();

        assert_eq!(outcome, SubmitOutcome::Next);
        assert_eq!(store.attempt().unwrap().cursor(), 1);
        assert!(!store.is_busy());

        let saved = api.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].question_id, QuestionId::new(1));
        assert_eq!(saved[0].selected_options_ids, vec![OptionId::new(11)]);

        let snapshot = repo.load_snapshot().await.unwrap().unwrap();
        assert_eq!(snapshot.cursor, 1);
    }

    #[tokio::test]
    async fn unanswered_question_submits_an_empty_selection() {
        let (service, api) = service(FakeApi::default());
        let mut store = AttemptStore::new();
        store.load(attempt(2));

        service.submit_current_answer(&mut store).await.unwrap();

        assert!(api.saved()[0].selected_options_ids.is_empty());
    }

    #[tokio::test]
    async fn failed_save_leaves_the_cursor_in_place() {
        let (service, _api) = service(FakeApi::default().with_saves(vec![Err(
            AssessmentError::Rejected {
                message: "nope".into(),
            },
        )]));
        let mut store = AttemptStore::new();
        store.load(attempt(2));

        let err = service.submit_current_answer(&mut store).await.unwrap_err();

        assert!(matches!(err, SubmitError::Save(_)));
        assert_eq!(store.attempt().unwrap().cursor(), 0);
        assert!(!store.is_busy());
    }

    #[tokio::test]
    async fn last_question_finishes_and_publishes_the_result() {
        let (service, api) =
            service(FakeApi::default().with_finishes(vec![Ok(scored_result())]));
        let repo = Arc::new(InMemoryRepository::new());
        let service = service.with_snapshots(repo.clone());

        let mut store = AttemptStore::new();
        store.load(attempt(2));
        store.advance_cursor();

        let outcome = service.submit_current_answer(&mut store).await.unwrap();

        assert_eq!(outcome, SubmitOutcome::Finished(scored_result()));
        assert!(!store.has_attempt());
        assert_eq!(service.results().current(), Some(scored_result()));
        assert!(repo.load_snapshot().await.unwrap().is_none());
        assert_eq!(api.finish_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn already_finished_is_retried_for_the_settled_result() {
        let (service, api) = service(FakeApi::default().with_finishes(vec![
            Err(AssessmentError::AlreadyFinished),
            Ok(scored_result()),
        ]));

        let mut store = AttemptStore::new();
        store.load(attempt(1));

        let result = service.finish_attempt(&mut store).await.unwrap();

        assert_eq!(result, scored_result());
        assert_eq!(api.finish_calls.load(Ordering::SeqCst), 2);
        assert!(!store.has_attempt());
        assert_eq!(service.results().current(), Some(scored_result()));
    }

    #[tokio::test]
    async fn closed_time_window_is_retried_for_the_settled_result() {
        let (service, api) = service(FakeApi::default().with_finishes(vec![
            Err(AssessmentError::TimeWindowClosed),
            Ok(scored_result()),
        ]));

        let mut store = AttemptStore::new();
        store.load(attempt(1));

        let result = service.finish_on_expiry(&mut store).await.unwrap();

        assert_eq!(result, scored_result());
        assert_eq!(api.finish_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn other_finish_failures_keep_the_session() {
        let (service, _api) = service(FakeApi::default().with_finishes(vec![Err(
            AssessmentError::Rejected {
                message: "server on fire".into(),
            },
        )]));

        let mut store = AttemptStore::new();
        store.load(attempt(1));

        let err = service.finish_attempt(&mut store).await.unwrap_err();

        assert!(matches!(err, SubmitError::Finish(_)));
        assert!(store.has_attempt());
        assert!(!store.is_busy());
        assert!(service.results().current().is_none());
    }

    #[tokio::test]
    async fn expiry_after_a_manual_finish_reuses_the_published_result() {
        let (service, api) =
            service(FakeApi::default().with_finishes(vec![Ok(scored_result())]));

        let mut store = AttemptStore::new();
        store.load(attempt(1));

        let manual = service.finish_attempt(&mut store).await.unwrap();
        let on_expiry = service.finish_on_expiry(&mut store).await.unwrap();

        assert_eq!(manual, on_expiry);
        // The second finish never reached the network.
        assert_eq!(api.finish_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn busy_store_rejects_a_second_submission() {
        let (service, _api) = service(FakeApi::default());
        let mut store = AttemptStore::new();
        store.load(attempt(2));
        store.force_begin_submission();

        let err = service.submit_current_answer(&mut store).await.unwrap_err();
        assert!(matches!(err, SubmitError::Busy));

        let err = service.finish_attempt(&mut store).await.unwrap_err();
        assert!(matches!(err, SubmitError::Busy));
    }

    #[tokio::test]
    async fn submitting_with_no_attempt_is_an_error() {
        let (service, _api) = service(FakeApi::default());
        let mut store = AttemptStore::new();

        let err = service.submit_current_answer(&mut store).await.unwrap_err();
        assert!(matches!(err, SubmitError::NoAttempt));
    }

    #[tokio::test]
    async fn expiry_with_nothing_to_finish_and_no_result_is_an_error() {
        let (service, _api) = service(FakeApi::default());
        let mut store = AttemptStore::new();

        let err = service.finish_on_expiry(&mut store).await.unwrap_err();
        assert!(matches!(err, SubmitError::NoAttempt));
    }

    #[tokio::test]
    async fn expiry_signal_drives_exactly_one_finish() {
        let (service, api) =
            service(FakeApi::default().with_finishes(vec![Ok(scored_result())]));

        let started_at = Utc::now();
        let timed = QuizAttempt::new(
            AnswerSheetId::new(42),
            "Timed quiz",
            vec![question(1, QuestionKind::SingleChoice)],
            5,
            started_at,
            "PT1S",
        )
        .unwrap();
        let mut store = AttemptStore::new();
        store.load(timed);

        let mut timer = CountdownTimer::start(Clock::default_clock(), started_at, "PT1S");
        let expiry = timer.take_expiry().unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), expiry)
            .await
            .expect("expiry should fire within the timeout")
            .expect("sender should not be dropped before firing");

        let result = service.finish_on_expiry(&mut store).await.unwrap();

        assert_eq!(result, scored_result());
        assert_eq!(api.finish_calls.load(Ordering::SeqCst), 1);
        assert!(!store.has_attempt());
        assert_eq!(service.results().current(), Some(scored_result()));
    }

    #[tokio::test]
    async fn restore_rehydrates_a_persisted_session() {
        let storage = Storage::in_memory();
        let repo = storage.attempts.clone();
        let (service, _api) = service(FakeApi::default());
        let service = service.with_snapshots(repo.clone());

        let mut original = AttemptStore::new();
        original.load(attempt(2));
        original.select_option(OptionId::new(10), true);
        original.advance_cursor();
        repo.save_snapshot(&original.snapshot().unwrap())
            .await
            .unwrap();

        let mut restored = AttemptStore::new();
        assert!(service.restore_attempt(&mut restored).await.unwrap());
        assert_eq!(restored.attempt(), original.attempt());

        repo.clear_snapshot().await.unwrap();
        let mut empty = AttemptStore::new();
        assert!(!service.restore_attempt(&mut empty).await.unwrap());
    }

    #[tokio::test]
    async fn full_two_question_flow() {
        let (service, api) = service(
            FakeApi::default()
                .with_starts(vec![Ok(attempt(2))])
                .with_finishes(vec![Ok(scored_result())]),
        );

        let mut store = AttemptStore::new();
        service
            .start_attempt(&mut store, QuizId::new(3), "secret")
            .await
            .unwrap();

        store.select_option(OptionId::new(10), true);
        assert_eq!(
            service.submit_current_answer(&mut store).await.unwrap(),
            SubmitOutcome::Next
        );

        store.select_option(OptionId::new(21), true);
        let outcome = service.submit_current_answer(&mut store).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Finished(_)));

        let saved = api.saved();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[1].question_id, QuestionId::new(2));
        assert!(!store.has_attempt());
    }
}

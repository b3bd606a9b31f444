//! Handoff slot between the finish path and the results view.
//!
//! The finish path publishes exactly one [`AttemptResult`]; the results view
//! reads it after navigation. The slot is cleared when the next attempt
//! starts, so a stale result is never shown for a new quiz.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use quiz_core::model::AttemptResult;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Shared single-slot store for the finalized attempt outcome.
#[derive(Clone, Default)]
pub struct ResultStore {
    slot: Arc<Mutex<Option<AttemptResult>>>,
}

impl ResultStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<AttemptResult>> {
        // The slot holds plain data; a poisoned lock still reads fine.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store the outcome, replacing any previous one.
    pub fn publish(&self, result: AttemptResult) {
        *self.lock() = Some(result);
    }

    #[must_use]
    pub fn current(&self) -> Option<AttemptResult> {
        self.lock().clone()
    }

    /// Read and empty the slot in one step.
    #[must_use]
    pub fn take(&self) -> Option<AttemptResult> {
        self.lock().take()
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }

    /// Wait up to `grace` for a result to land in the slot.
    ///
    /// Covers the navigation race where the results view renders before the
    /// finish call has resolved. `None` after the grace period means there is
    /// no result to show and the caller should route back to the quiz list.
    pub async fn wait_for_result(&self, grace: Duration) -> Option<AttemptResult> {
        let deadline = tokio::time::Instant::now() + grace;
        loop {
            if let Some(result) = self.current() {
                return Some(result);
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

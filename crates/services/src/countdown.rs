//! Tokio driver for the countdown state machine.
//!
//! One timer is started per mounted quiz view. The timer owns a background
//! task that ticks the pure [`Countdown`] once a second, publishes the
//! formatted remaining time on a watch channel, and fires a one-shot expiry
//! signal exactly once. Dropping the timer aborts the task, so an unmounted
//! view leaves no ticking loop behind.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use quiz_core::Clock;
use quiz_core::countdown::{Countdown, CountdownTick};

/// Display value once the deadline has passed.
pub const TIME_IS_UP: &str = "Time is up";

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Handle to a running countdown task.
pub struct CountdownTimer {
    display: watch::Receiver<String>,
    expiry: Option<oneshot::Receiver<()>>,
    task: JoinHandle<()>,
}

impl CountdownTimer {
    /// Spawn the ticking task for an attempt.
    ///
    /// The watch channel starts with the current remaining time, so the
    /// first read is meaningful before the first one-second tick. An attempt
    /// whose deadline already passed still fires the expiry signal, on the
    /// first tick.
    #[must_use]
    pub fn start(clock: Clock, started_at: DateTime<Utc>, time_limit: &str) -> Self {
        let mut countdown = Countdown::new(started_at, time_limit);
        debug!(deadline = %countdown.deadline(), "countdown started");

        // Peek on a clone so an already-expired attempt does not consume the
        // fire-once flag before the task runs.
        let initial = match countdown.clone().tick(clock.now()) {
            CountdownTick::Running { display } => display,
            CountdownTick::Expired { .. } => TIME_IS_UP.to_string(),
        };

        let (display_tx, display_rx) = watch::channel(initial);
        let (expiry_tx, expiry_rx) = oneshot::channel();
        let task = tokio::spawn(run_ticker(countdown, clock, display_tx, expiry_tx));

        Self {
            display: display_rx,
            expiry: Some(expiry_rx),
            task,
        }
    }

    /// Subscribe to the formatted remaining-time display.
    #[must_use]
    pub fn display(&self) -> watch::Receiver<String> {
        self.display.clone()
    }

    /// Take the one-shot expiry signal. `None` after the first call.
    ///
    /// The receiver resolves when the deadline passes; it resolves with an
    /// error when the timer is dropped before expiry.
    pub fn take_expiry(&mut self) -> Option<oneshot::Receiver<()>> {
        self.expiry.take()
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_ticker(
    mut countdown: Countdown,
    clock: Clock,
    display_tx: watch::Sender<String>,
    expiry_tx: oneshot::Sender<()>,
) {
    let mut expiry_tx = Some(expiry_tx);
    let mut interval = tokio::time::interval(TICK_PERIOD);
    // The first interval tick completes immediately; the initial display is
    // already published.
    interval.tick().await;

    loop {
        interval.tick().await;
        match countdown.tick(clock.now()) {
            CountdownTick::Running { display } => {
                if display_tx.send(display).is_err() {
                    return;
                }
            }
            CountdownTick::Expired { first } => {
                let _ = display_tx.send(TIME_IS_UP.to_string());
                if first && let Some(tx) = expiry_tx.take() {
                    debug!("countdown expired");
                    let _ = tx.send(());
                }
                // Terminal state, nothing left to publish.
                return;
            }
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

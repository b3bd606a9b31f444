use chrono::{DateTime, Duration, Utc};

use crate::duration::{format_remaining, parse_duration_ms};

/// Observation produced by one countdown tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountdownTick {
    /// The deadline is still ahead; `display` is the formatted remaining time.
    Running { display: String },
    /// The deadline has passed. `first` is true for exactly one tick over the
    /// lifetime of a countdown, no matter how many ticks observe expiry.
    Expired { first: bool },
}

/// Countdown state machine: `Running` until the deadline, then terminally
/// `Expired`.
///
/// The machine is pure; a driver feeds it `now` on its own cadence. The
/// fire-once guarantee rests on an explicit flag rather than on the driver
/// never double-invoking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    deadline: DateTime<Utc>,
    fired: bool,
}

impl Countdown {
    /// Build a countdown from the attempt's start instant and its textual
    /// time limit. A malformed limit parses as zero, which places the
    /// deadline at `started_at`: the countdown reads as already expired. A
    /// limit too large to represent clamps the deadline to the maximum
    /// instant.
    #[must_use]
    pub fn new(started_at: DateTime<Utc>, time_limit: &str) -> Self {
        let limit_ms = parse_duration_ms(time_limit);
        let limit = i64::try_from(limit_ms).unwrap_or(i64::MAX);
        let deadline = started_at
            .checked_add_signed(Duration::milliseconds(limit))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            deadline,
            fired: false,
        }
    }

    #[must_use]
    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }

    /// Recompute the remaining time against `now`.
    ///
    /// Once a tick has observed expiry the machine is terminal: every later
    /// tick reports `Expired { first: false }` even if handed an earlier
    /// `now`.
    pub fn tick(&mut self, now: DateTime<Utc>) -> CountdownTick {
        if self.fired {
            return CountdownTick::Expired { first: false };
        }

        let remaining = self.deadline - now;
        if remaining > Duration::zero() {
            let ms = u64::try_from(remaining.num_milliseconds()).unwrap_or(0);
            CountdownTick::Running {
                display: format_remaining(ms),
            }
        } else {
            let first = !self.fired;
            self.fired = true;
            CountdownTick::Expired { first }
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

//! Parsing and formatting for the service's textual duration encoding.
//!
//! The assessment service issues time limits in an ISO-8601 day/time shape:
//! an optional `P<n>D` day count, then an optional `T` portion with optional
//! `<n>H`, `<n>M`, and `<n>S` counts. Any omitted component is zero.

const MS_PER_SECOND: u64 = 1_000;
const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: u64 = 24 * MS_PER_HOUR;

/// A duration broken into display components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DurationParts {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl DurationParts {
    /// Split a millisecond count into day/hour/minute/second components.
    /// Sub-second remainders are truncated.
    #[must_use]
    pub fn from_ms(ms: u64) -> Self {
        Self {
            days: ms / MS_PER_DAY,
            hours: ms % MS_PER_DAY / MS_PER_HOUR,
            minutes: ms % MS_PER_HOUR / MS_PER_MINUTE,
            seconds: ms % MS_PER_MINUTE / MS_PER_SECOND,
        }
    }

    /// Recombine the components into a millisecond count.
    ///
    /// Components too large to represent saturate at `u64::MAX` instead of
    /// overflowing; an absurd limit reads as effectively unlimited time.
    #[must_use]
    pub fn total_ms(&self) -> u64 {
        self.days
            .saturating_mul(MS_PER_DAY)
            .saturating_add(self.hours.saturating_mul(MS_PER_HOUR))
            .saturating_add(self.minutes.saturating_mul(MS_PER_MINUTE))
            .saturating_add(self.seconds.saturating_mul(MS_PER_SECOND))
    }
}

/// Parse a textual duration into total milliseconds.
///
/// Input with no recognizable component yields zero and is reported through
/// `tracing`, never raised as an error: a broken limit degrades the clock to
/// "already expired" instead of crashing the attempt.
#[must_use]
pub fn parse_duration_ms(input: &str) -> u64 {
    let mut parts = DurationParts::default();
    let mut recognized = false;
    let mut in_time_portion = false;
    let mut digits = String::new();

    for ch in input.trim().chars() {
        match ch {
            'P' | 'p' => digits.clear(),
            'T' | 't' => {
                in_time_portion = true;
                digits.clear();
            }
            '0'..='9' => digits.push(ch),
            'D' | 'd' if !in_time_portion => {
                if let Ok(n) = digits.parse::<u64>() {
                    parts.days = n;
                    recognized = true;
                }
                digits.clear();
            }
            'H' | 'h' if in_time_portion => {
                if let Ok(n) = digits.parse::<u64>() {
                    parts.hours = n;
                    recognized = true;
                }
                digits.clear();
            }
            'M' | 'm' if in_time_portion => {
                if let Ok(n) = digits.parse::<u64>() {
                    parts.minutes = n;
                    recognized = true;
                }
                digits.clear();
            }
            'S' | 's' if in_time_portion => {
                if let Ok(n) = digits.parse::<u64>() {
                    parts.seconds = n;
                    recognized = true;
                }
                digits.clear();
            }
            _ => digits.clear(),
        }
    }

    if !recognized {
        tracing::warn!(input, "unrecognized duration encoding, treating as zero");
        return 0;
    }

    parts.total_ms()
}

/// Format a remaining-time display string from a millisecond count.
///
/// Leading zero-valued larger units are dropped (no `0:00:12:34`), lower
/// units are zero-padded, and seconds are always shown.
#[must_use]
pub fn format_remaining(ms: u64) -> String {
    let p = DurationParts::from_ms(ms);
    if p.days > 0 {
        format!(
            "{}:{:02}:{:02}:{:02}",
            p.days, p.hours, p.minutes, p.seconds
        )
    } else if p.hours > 0 {
        format!("{}:{:02}:{:02}", p.hours, p.minutes, p.seconds)
    } else if p.minutes > 0 {
        format!("{}:{:02}", p.minutes, p.seconds)
    } else {
        format!("0:{:02}", p.seconds)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_day_time_duration() {
        assert_eq!(
            parse_duration_ms("P1DT2H3M4S"),
            MS_PER_DAY + 2 * MS_PER_HOUR + 3 * MS_PER_MINUTE + 4 * MS_PER_SECOND
        );
    }

    #[test]
    fn parses_time_only_durations() {
        assert_eq!(parse_duration_ms("PT2S"), 2_000);
        assert_eq!(parse_duration_ms("PT30M"), 30 * MS_PER_MINUTE);
        assert_eq!(parse_duration_ms("PT1H30M"), MS_PER_HOUR + 30 * MS_PER_MINUTE);
    }

    #[test]
    fn parses_days_without_time_portion() {
        assert_eq!(parse_duration_ms("P2D"), 2 * MS_PER_DAY);
    }

    #[test]
    fn omitted_components_default_to_zero() {
        assert_eq!(parse_duration_ms("PT1H"), MS_PER_HOUR);
        assert_eq!(parse_duration_ms("P1DT5S"), MS_PER_DAY + 5 * MS_PER_SECOND);
    }

    #[test]
    fn unrecognizable_input_yields_zero() {
        assert_eq!(parse_duration_ms(""), 0);
        assert_eq!(parse_duration_ms("soon"), 0);
        assert_eq!(parse_duration_ms("P"), 0);
        assert_eq!(parse_duration_ms("PT"), 0);
        assert_eq!(parse_duration_ms("1234"), 0);
    }

    #[test]
    fn minute_outside_time_portion_is_not_a_minute() {
        // 'M' before 'T' would be a month, which this grammar does not carry.
        assert_eq!(parse_duration_ms("P1M"), 0);
    }

    #[test]
    fn huge_components_saturate_instead_of_overflowing() {
        assert_eq!(parse_duration_ms("P18446744073709551615D"), u64::MAX);
        assert_eq!(parse_duration_ms("PT18446744073709551615S"), u64::MAX);
        assert_eq!(
            parse_duration_ms("P18446744073709551615DT18446744073709551615H"),
            u64::MAX
        );
    }

    #[test]
    fn parse_then_recombine_preserves_total() {
        for input in ["PT2S", "PT30M", "PT1H30M15S", "P1DT2H3M4S", "P3D"] {
            let ms = parse_duration_ms(input);
            assert_eq!(DurationParts::from_ms(ms).total_ms(), ms, "{input}");
        }
    }

    #[test]
    fn format_drops_leading_zero_units() {
        assert_eq!(format_remaining(26 * MS_PER_HOUR + 90_000), "1:02:01:30");
        assert_eq!(format_remaining(MS_PER_HOUR + 62_000), "1:01:02");
        assert_eq!(format_remaining(90_000), "1:30");
        assert_eq!(format_remaining(9_000), "0:09");
        assert_eq!(format_remaining(0), "0:00");
    }
}

#![forbid(unsafe_code)]

pub mod countdown;
pub mod duration;
pub mod model;
pub mod time;

pub use countdown::{Countdown, CountdownTick};
pub use duration::{DurationParts, format_remaining, parse_duration_ms};
pub use time::Clock;

use chrono::{DateTime, Utc};
use std::time::Instant;

/// Wall-clock and monotonic time, abstracted so workflow tests can control
/// both without sleeping (spec §6.1).
pub trait ClockSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    fn monotonic_now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn monotonic_now(&self) -> Instant {
        Instant::now()
    }
}

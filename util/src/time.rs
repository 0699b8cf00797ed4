//! General time utility functions

use std::time::{Duration, Instant};

use chrono;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Fixed period wakeup source for polling loops.
///
/// The target wakeup instant is advanced by exactly one period on every call to [`Ticker::wait`],
/// so time spent doing work between waits does not accumulate as drift.
#[derive(Debug, Clone)]
pub struct Ticker {
    period: Duration,
    wakeup: Instant,
}

impl Ticker {
    /// Create a new ticker whose first wakeup is one period from now.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            wakeup: Instant::now(),
        }
    }

    /// Create a ticker with a period given in milliseconds.
    pub fn from_millis(period_ms: u64) -> Self {
        Self::new(Duration::from_millis(period_ms))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// The instant of the most recent (or initial) deadline.
    pub fn deadline(&self) -> Instant {
        self.wakeup
    }

    /// Block until the next wakeup instant.
    ///
    /// If the deadline has already passed this returns immediately, the next deadline is still
    /// one period after the missed one.
    pub fn wait(&mut self) {
        self.wakeup += self.period;

        let now = Instant::now();
        if self.wakeup > now {
            std::thread::sleep(self.wakeup - now);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_duration_to_seconds() {
        assert_eq!(
            duration_to_seconds(chrono::Duration::milliseconds(1500)),
            Some(1.5)
        );
    }

    #[test]
    fn test_ticker_does_not_drift() {
        let mut ticker = Ticker::from_millis(5);
        let start = ticker.deadline();

        for _ in 0..10 {
            // Work done between waits must not push the schedule back
            std::thread::sleep(Duration::from_millis(2));
            ticker.wait();
        }

        assert_eq!(ticker.deadline(), start + Duration::from_millis(50));
        assert!(Instant::now() >= start + Duration::from_millis(50));
    }
}

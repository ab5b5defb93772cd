//! Time source injected into the issuer and the orchestrator.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock, for pinning expiry boundaries in tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Start at `now`, truncated to whole seconds to match token timestamps.
    pub fn new(now: DateTime<Utc>) -> Self {
        let secs = DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now);
        Self {
            now: Mutex::new(secs),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_truncates_and_advances() {
        let start = DateTime::from_timestamp(1_700_000_000, 123_000_000).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now().timestamp_subsec_nanos(), 0);

        clock.advance(Duration::minutes(15));
        assert_eq!(clock.now().timestamp(), 1_700_000_000 + 15 * 60);
    }
}

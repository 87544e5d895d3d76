//! Time sources for the recorder.
//!
//! The recorder needs two readings: a monotonic one for "time since last
//! flush" and a UTC wall-clock one for segment keys. Both come from a single
//! [`Clock`] so tests can drive them together with [`ManualClock`].

use chrono::{DateTime, Utc};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync {
    /// Monotonic time elapsed since the clock was created.
    fn monotonic(&self) -> Duration;
    /// Current wall-clock time in UTC.
    fn wall(&self) -> DateTime<Utc>;
}

/// Real clock backed by `Instant` and `Utc::now()`.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic(&self) -> Duration {
        self.origin.elapsed()
    }

    fn wall(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Advancing moves both readings.
#[derive(Debug)]
pub struct ManualClock {
    state: Mutex<(Duration, DateTime<Utc>)>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new((Duration::ZERO, start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.0 += by;
        // chrono::Duration::from_std only fails beyond ~292 billion years.
        if let Ok(delta) = chrono::Duration::from_std(by) {
            state.1 += delta;
        }
    }

    /// Jumps the wall clock without touching the monotonic reading.
    pub fn set_wall(&self, wall: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.1 = wall;
    }
}

impl Clock for ManualClock {
    fn monotonic(&self) -> Duration {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).0
    }

    fn wall(&self) -> DateTime<Utc> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock_advances_both_readings() {
        let start = Utc.with_ymd_and_hms(2025, 11, 12, 10, 59, 59).unwrap();
        let clock = ManualClock::new(start);

        clock.advance(Duration::from_secs(2));
        assert_eq!(clock.monotonic(), Duration::from_secs(2));
        assert_eq!(clock.wall(), Utc.with_ymd_and_hms(2025, 11, 12, 11, 0, 1).unwrap());

        clock.set_wall(start);
        assert_eq!(clock.monotonic(), Duration::from_secs(2));
        assert_eq!(clock.wall(), start);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.monotonic();
        let b = clock.monotonic();
        assert!(b >= a);
    }
}

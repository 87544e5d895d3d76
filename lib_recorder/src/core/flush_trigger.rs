//! # Flush Trigger
//!
//! Pure decision function evaluated after every ingest. A flush is due when
//! the time since the last flush reached `time_interval` **or** the buffered
//! size reached `size_threshold`. Either axis is disabled by setting it to zero;
//! with both at zero only explicit flushes persist data.
//!
//! Buffered size is measured in bytes, estimated as
//! `unflushed record count * size_of::<Record>()`.

use std::time::Duration;

/// Default time trigger.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);
/// Default size trigger (10 MiB).
pub const DEFAULT_SIZE_THRESHOLD: u64 = 10 * 1024 * 1024;

/// Thresholds for automatic flushing. Zero disables an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushConfig {
    pub time_interval: Duration,
    pub size_threshold: u64,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            time_interval: DEFAULT_FLUSH_INTERVAL,
            size_threshold: DEFAULT_SIZE_THRESHOLD,
        }
    }
}

impl FlushConfig {
    pub fn new(time_interval: Duration, size_threshold: u64) -> Self {
        Self {
            time_interval,
            size_threshold,
        }
    }

    /// Only explicit `flush_now`/`stop` calls persist data.
    pub fn manual() -> Self {
        Self::new(Duration::ZERO, 0)
    }

    pub fn is_manual(&self) -> bool {
        self.time_interval.is_zero() && self.size_threshold == 0
    }
}

/// Outcome of one trigger evaluation, split per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushDecision {
    pub time_exceeded: bool,
    pub size_exceeded: bool,
}

impl FlushDecision {
    pub fn should_flush(&self) -> bool {
        self.time_exceeded || self.size_exceeded
    }

    /// Short label for log lines.
    pub fn reason(&self) -> &'static str {
        match (self.time_exceeded, self.size_exceeded) {
            (true, true) => "interval+size",
            (true, false) => "interval",
            (false, true) => "size",
            (false, false) => "none",
        }
    }
}

/// Evaluates both axes against `config`.
pub fn evaluate(elapsed: Duration, buffered_bytes: u64, config: &FlushConfig) -> FlushDecision {
    let time_exceeded = !config.time_interval.is_zero() && elapsed >= config.time_interval;
    let size_exceeded = config.size_threshold > 0 && buffered_bytes >= config.size_threshold;
    FlushDecision {
        time_exceeded,
        size_exceeded,
    }
}

/// `time_exceeded OR size_exceeded`.
pub fn should_flush(elapsed: Duration, buffered_bytes: u64, config: &FlushConfig) -> bool {
    evaluate(elapsed, buffered_bytes, config).should_flush()
}

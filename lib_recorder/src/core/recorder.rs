//! # Feed Recorder (Concurrency Coordinator)
//!
//! Binds the store, the flush trigger, the segment resolver and the sink
//! backend together behind one exclusive **data lock**.
//!
//! ## Locking discipline
//!
//! 1.  Every mutation of History, the Pending Queue, the active sink and the
//!     segment state happens while holding the data lock. That includes the
//!     runtime setters (`set_output_path`, `set_segment_mode`), which run the
//!     same flush/close/open sequence as a time-driven segment transition.
//! 2.  Flush I/O runs under the data lock. A slow disk therefore delays
//!     consumers calling `drain_pending` for the duration of the write, but two
//!     flushes can never overlap on the same sink.
//! 3.  User callbacks run after the data lock is released, on the producer
//!     thread. A second, short-lived `RwLock` guards only the callback slots,
//!     and is never held while a callback executes.
//!
//! ## Ingest sequence
//!
//! ```text
//! ingest(record)
//!   ├─ lock data
//!   │   ├─ segment boundary crossed? -> flush old batch, close, open new (truncate)
//!   │   ├─ append to History + Pending
//!   │   └─ trigger (interval OR size)? -> write unflushed batch, clear Pending
//!   ├─ unlock data
//!   ├─ on_error(err) for every failure above
//!   └─ on_update(&record)
//! ```
//!
//! The boundary check runs before the append so a record stamped after the
//! boundary never lands in the previous segment's file.
//!
//! ## Shutdown
//!
//! `stop()` performs the terminal flush and closes the sink. It is the only
//! way to guarantee buffered records reach disk; `Drop` calls it as a last
//! resort and can only log failures.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::configs::RecorderConfig;
use crate::core::clock::{Clock, SystemClock};
use crate::core::flush_trigger::{self, FlushConfig};
use crate::core::record::Record;
use crate::core::segment::{SegmentMode, SegmentResolver};
use crate::core::store::RecordStore;
use crate::error::{RecorderError, Result};
use crate::sinks::{self, BufferedSink, SinkBackend};

/// Flushes beyond this count log at `debug` instead of `info`.
const MAX_LOGGED_FLUSHES: u64 = 3;

/// Invoked with every ingested record, outside the data lock.
pub type UpdateCallback = Arc<dyn Fn(&Record) + Send + Sync>;
/// Invoked with every persistence failure raised on the ingest path.
pub type ErrorCallback = Arc<dyn Fn(&RecorderError) + Send + Sync>;

/// Point-in-time counters, copied out under the data lock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecorderStats {
    pub history_len: usize,
    pub pending_len: usize,
    pub unflushed_len: usize,
    pub flush_count: u64,
    pub segment_count: u64,
    pub active_filename: Option<PathBuf>,
    pub memory_usage_bytes: u64,
    pub records_written: u64,
    pub consecutive_failures: u32,
    pub running: bool,
}

#[derive(Default)]
struct Callbacks {
    on_update: Option<UpdateCallback>,
    on_error: Option<ErrorCallback>,
}

/// State guarded by the data lock.
struct Inner {
    store: RecordStore,
    flush: FlushConfig,
    segments: SegmentResolver,
    sink: Option<Box<dyn BufferedSink>>,
    last_flush_at: Duration,
    flush_count: u64,
    records_written: u64,
    consecutive_failures: u32,
    /// Set once `stop()` has flushed everything; no sink is opened afterwards.
    closed: bool,
}

impl Inner {
    fn has_output(&self) -> bool {
        self.segments.base_path().is_some()
    }

    /// Activates the segment for `now` and opens its sink.
    fn open_segment(&mut self, backend: &dyn SinkBackend, now: DateTime<Utc>) -> Result<()> {
        match self.segments.resolve(now) {
            Some((key, filename)) => {
                self.segments.activate(key, filename);
                self.open_active(backend)
            }
            None => {
                self.segments.deactivate();
                Ok(())
            }
        }
    }

    /// Opens (create/truncate) the active filename.
    fn open_active(&mut self, backend: &dyn SinkBackend) -> Result<()> {
        let path = match self.segments.active_filename() {
            Some(path) => path.to_path_buf(),
            None => return Ok(()),
        };
        let sink = backend.open_sink(&path)?;
        log::info!(
            "Starting new {} segment file: {} (segment #{})",
            backend.name(),
            path.display(),
            self.segments.segment_count()
        );
        self.sink = Some(sink);
        Ok(())
    }

    fn close_sink(&mut self) -> Result<()> {
        match self.sink.take() {
            Some(sink) => sinks::close_sink(sink),
            None => Ok(()),
        }
    }

    /// Makes sure a sink is open for the current segment. A segment whose
    /// open failed earlier is retried; nothing was written to it yet.
    fn ensure_sink(&mut self, backend: &dyn SinkBackend, now: DateTime<Utc>) -> Result<()> {
        if self.sink.is_some() {
            return Ok(());
        }
        if self.segments.is_active() {
            self.open_active(backend)
        } else {
            self.open_segment(backend, now)
        }
    }

    fn write_unflushed(&mut self, backend: &dyn SinkBackend, now: DateTime<Utc>) -> Result<usize> {
        self.ensure_sink(backend, now)?;
        let target = self.segments.active_filename().map(Path::display).map(|d| d.to_string());
        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| RecorderError::NoActiveSink(target.unwrap_or_else(|| "(no output path)".to_string())))?;
        sink.write_batch(self.store.unflushed())
    }

    /// Persists the unflushed batch. On success Pending is cleared and the
    /// cursor advances; on failure both are left intact for the next attempt.
    fn flush(&mut self, backend: &dyn SinkBackend, now: DateTime<Utc>, mono: Duration) -> Result<usize> {
        let batch_len = self.store.unflushed_len();
        if batch_len == 0 || !self.has_output() || self.closed {
            return Ok(0);
        }

        match self.write_unflushed(backend, now) {
            Ok(written) => {
                self.store.mark_flushed(batch_len);
                self.store.clear_pending_without_returning();
                self.flush_count += 1;
                self.records_written += written as u64;
                self.last_flush_at = mono;
                self.consecutive_failures = 0;

                let target = self
                    .segments
                    .active_filename()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                if self.flush_count <= MAX_LOGGED_FLUSHES {
                    log::info!("Flushed {} records to {}", written, target);
                } else {
                    log::debug!("Flushed {} records to {} (flush #{})", written, target, self.flush_count);
                }
                Ok(written)
            }
            Err(e) => {
                // Pace retries by the interval instead of every ingest.
                self.last_flush_at = mono;
                self.consecutive_failures += 1;
                log::error!(
                    "Flush of {} records failed ({} consecutive failures): {}",
                    batch_len,
                    self.consecutive_failures,
                    e
                );
                Err(e)
            }
        }
    }

    /// Flush trigger evaluation after an append.
    fn maybe_flush(&mut self, backend: &dyn SinkBackend, now: DateTime<Utc>, mono: Duration) -> Result<usize> {
        if self.store.unflushed_len() == 0 || !self.has_output() {
            return Ok(0);
        }
        let elapsed = mono.saturating_sub(self.last_flush_at);
        let decision = flush_trigger::evaluate(elapsed, self.store.unflushed_bytes(), &self.flush);
        if !decision.should_flush() {
            return Ok(0);
        }
        log::trace!("Flush triggered by {}", decision.reason());
        self.flush(backend, now, mono)
    }

    /// Flush the old segment, close it, apply `change`, open the new one.
    /// Used for time-driven transitions and for runtime reconfiguration alike.
    fn retarget(
        &mut self,
        backend: &dyn SinkBackend,
        now: DateTime<Utc>,
        mono: Duration,
        change: impl FnOnce(&mut SegmentResolver),
    ) -> Vec<RecorderError> {
        let mut errors = Vec::new();
        let was_active = self.segments.is_active() || self.sink.is_some();

        if was_active {
            if let Err(e) = self.flush(backend, now, mono) {
                errors.push(e);
            }
            if let Err(e) = self.close_sink() {
                errors.push(e);
            }
            self.segments.deactivate();
        }

        change(&mut self.segments);

        if was_active && !self.closed {
            if let Err(e) = self.open_segment(backend, now) {
                log::error!("Cannot open segment file: {}", e);
                errors.push(e);
            }
        }
        errors
    }

    fn stats(&self, running: bool) -> RecorderStats {
        RecorderStats {
            history_len: self.store.history_len(),
            pending_len: self.store.pending_len(),
            unflushed_len: self.store.unflushed_len(),
            flush_count: self.flush_count,
            segment_count: self.segments.segment_count(),
            active_filename: self.segments.active_filename().map(Path::to_path_buf),
            memory_usage_bytes: self.store.unflushed_bytes(),
            records_written: self.records_written,
            consecutive_failures: self.consecutive_failures,
            running,
        }
    }
}

/// # Feed Recorder
///
/// One producer stream into one logical sink. Share it as `Arc<FeedRecorder>`
/// between the producer thread (calling [`ingest`](Self::ingest)) and any
/// number of consumer threads (calling [`drain_pending`](Self::drain_pending)
/// or [`snapshot_history`](Self::snapshot_history)).
pub struct FeedRecorder {
    data: Mutex<Inner>,
    callbacks: RwLock<Callbacks>,
    backend: Arc<dyn SinkBackend>,
    clock: Arc<dyn Clock>,
    running: AtomicBool,
    stopped: AtomicBool,
}

impl FeedRecorder {
    /// Recorder with the backend selected by `config.format` and the system clock.
    pub fn new(config: RecorderConfig) -> Result<Self> {
        let backend = config.format.backend();
        Self::with_parts(config, backend, Arc::new(SystemClock::new()))
    }

    /// Recorder with an explicit backend and clock.
    pub fn with_parts(config: RecorderConfig, backend: Arc<dyn SinkBackend>, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let inner = Inner {
            store: RecordStore::new(),
            flush: config.flush_config(),
            segments: SegmentResolver::new(config.segment_mode, config.output_path.clone(), backend.extension()),
            sink: None,
            last_flush_at: clock.monotonic(),
            flush_count: 0,
            records_written: 0,
            consecutive_failures: 0,
            closed: false,
        };

        Ok(Self {
            data: Mutex::new(inner),
            callbacks: RwLock::new(Callbacks::default()),
            backend,
            clock,
            running: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        })
    }

    fn lock_data(&self) -> MutexGuard<'_, Inner> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update_callback(&self) -> Option<UpdateCallback> {
        self.callbacks.read().unwrap_or_else(PoisonError::into_inner).on_update.clone()
    }

    fn error_callback(&self) -> Option<ErrorCallback> {
        self.callbacks.read().unwrap_or_else(PoisonError::into_inner).on_error.clone()
    }

    /// Hands failures to the error callback. Must be called without the data lock.
    fn report(&self, errors: Vec<RecorderError>) {
        if errors.is_empty() {
            return;
        }
        if let Some(on_error) = self.error_callback() {
            for e in &errors {
                on_error(e);
            }
        }
    }

    fn ensure_configurable(&self, what: &str) -> Result<()> {
        if self.running.load(Ordering::SeqCst) || self.stopped.load(Ordering::SeqCst) {
            return Err(RecorderError::Config(format!("{} must be set before start()", what)));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Marks the producer as started and opens the first segment file.
    ///
    /// Fails with a configuration error when already running or stopped. A
    /// sink that cannot be opened is reported through the error callback and
    /// retried on the next flush.
    pub fn start(&self) -> Result<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(RecorderError::Config("recorder was stopped and cannot be restarted".to_string()));
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(RecorderError::Config("recorder already running".to_string()));
        }

        let mut errors = Vec::new();
        {
            let mut inner = self.lock_data();
            inner.last_flush_at = self.clock.monotonic();
            if inner.has_output() && inner.sink.is_none() {
                let now = self.clock.wall();
                if let Err(e) = inner.ensure_sink(self.backend.as_ref(), now) {
                    log::error!("Cannot open output file at start: {}", e);
                    errors.push(e);
                }
            }
            log::info!(
                "Recorder started: mode={}, interval={:?}, threshold={} bytes, output={}",
                inner.segments.mode(),
                inner.flush.time_interval,
                inner.flush.size_threshold,
                inner
                    .segments
                    .active_filename()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(memory only)".to_string())
            );
        }
        self.report(errors);
        Ok(())
    }

    /// Terminal flush, then closes the sink. Safe to call more than once.
    /// Returns the number of records written by the terminal flush.
    ///
    /// If the terminal flush fails the sink stays open and the recorder is
    /// not closed, so `stop()` or `flush_now()` can be called again to retry.
    pub fn stop(&self) -> Result<usize> {
        let was_running = self.running.swap(false, Ordering::SeqCst);
        self.stopped.store(true, Ordering::SeqCst);

        let mut inner = self.lock_data();
        if inner.closed {
            return Ok(0);
        }
        let now = self.clock.wall();
        let mono = self.clock.monotonic();

        let flushed = match inner.flush(self.backend.as_ref(), now, mono) {
            Ok(flushed) => flushed,
            Err(e) => {
                log::error!(
                    "Terminal flush failed; {} records still unflushed: {}",
                    inner.store.unflushed_len(),
                    e
                );
                return Err(e);
            }
        };
        let closed = inner.close_sink();
        inner.closed = true;

        if was_running || flushed > 0 {
            log::info!(
                "Recorder stopped: {} records ingested, {} written in {} flushes across {} segments",
                inner.store.history_len(),
                inner.records_written,
                inner.flush_count,
                inner.segments.segment_count()
            );
        }

        closed?;
        Ok(flushed)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------
    // Producer side
    // ------------------------------------------------------------------

    /// Appends one record. Never fails: persistence errors are routed to the
    /// error callback and the record stays buffered.
    pub fn ingest(&self, record: Record) {
        let on_update = self.update_callback();
        let for_callback = on_update.as_ref().map(|_| record.clone());
        let backend = self.backend.as_ref();

        let mut errors = Vec::new();
        {
            let mut inner = self.lock_data();
            let now = self.clock.wall();
            let mono = self.clock.monotonic();

            if inner.segments.crossed_boundary(now) {
                errors.extend(inner.retarget(backend, now, mono, |_| {}));
            }

            inner.store.ingest(record);

            if let Err(e) = inner.maybe_flush(backend, now, mono) {
                errors.push(e);
            }
        }

        self.report(errors);

        if let (Some(on_update), Some(record)) = (on_update, for_callback) {
            on_update(&record);
        }
    }

    /// Writes the unflushed batch now. No-op when nothing is buffered; logs a
    /// warning when no output path is configured.
    pub fn flush_now(&self) -> Result<usize> {
        let mut inner = self.lock_data();
        if !inner.has_output() {
            log::warn!("flush_now() called but no output path is configured");
            return Ok(0);
        }
        let now = self.clock.wall();
        let mono = self.clock.monotonic();
        inner.flush(self.backend.as_ref(), now, mono)
    }

    // ------------------------------------------------------------------
    // Consumer side
    // ------------------------------------------------------------------

    /// Returns and clears every record not yet drained or flushed.
    ///
    /// With automatic flushing enabled, records flushed before this call are
    /// no longer pending: poll at least twice per flush interval to see them all.
    pub fn drain_pending(&self) -> Vec<Record> {
        self.lock_data().store.drain_pending()
    }

    pub fn pending_count(&self) -> usize {
        self.lock_data().store.pending_len()
    }

    /// Full copy of History. O(n); use [`history_len`](Self::history_len) for the size.
    pub fn snapshot_history(&self) -> Vec<Record> {
        self.lock_data().store.snapshot_history()
    }

    pub fn history_len(&self) -> usize {
        self.lock_data().store.history_len()
    }

    /// One-shot CSV export of the full History, independent of the active sink.
    pub fn save_snapshot_csv(&self, path: &Path) -> Result<usize> {
        let inner = self.lock_data();
        sinks::save_snapshot_csv(path, inner.store.history())
    }

    pub fn stats(&self) -> RecorderStats {
        self.lock_data().stats(self.is_running())
    }

    pub fn flush_count(&self) -> u64 {
        self.lock_data().flush_count
    }

    pub fn segment_count(&self) -> u64 {
        self.lock_data().segments.segment_count()
    }

    pub fn active_filename(&self) -> Option<PathBuf> {
        self.lock_data().segments.active_filename().map(Path::to_path_buf)
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Registers the per-record callback. Only allowed before `start()`.
    pub fn set_update_callback<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(&Record) + Send + Sync + 'static,
    {
        self.ensure_configurable("update callback")?;
        self.callbacks.write().unwrap_or_else(PoisonError::into_inner).on_update = Some(Arc::new(callback));
        Ok(())
    }

    /// Registers the error-reporting callback. Only allowed before `start()`.
    pub fn set_error_callback<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(&RecorderError) + Send + Sync + 'static,
    {
        self.ensure_configurable("error callback")?;
        self.callbacks.write().unwrap_or_else(PoisonError::into_inner).on_error = Some(Arc::new(callback));
        Ok(())
    }

    pub fn set_flush_interval(&self, interval: Duration) {
        self.lock_data().flush.time_interval = interval;
    }

    pub fn set_size_threshold(&self, bytes: u64) {
        self.lock_data().flush.size_threshold = bytes;
    }

    /// Changes the base output path. While a segment is open this runs a full
    /// transition under the data lock: flush, close, open the new file.
    pub fn set_output_path(&self, path: Option<PathBuf>) -> Result<()> {
        if let Some(p) = &path {
            if p.file_name().is_none() {
                return Err(RecorderError::Config(format!("output path '{}' does not name a file", p.display())));
            }
        }
        self.reconfigure(move |segments| segments.set_base_path(path))
    }

    /// Changes the segmentation mode, with the same transition sequence as
    /// [`set_output_path`](Self::set_output_path).
    pub fn set_segment_mode(&self, mode: SegmentMode) -> Result<()> {
        self.reconfigure(move |segments| segments.set_mode(mode))
    }

    fn reconfigure(&self, change: impl FnOnce(&mut SegmentResolver)) -> Result<()> {
        let mut errors = {
            let mut inner = self.lock_data();
            let now = self.clock.wall();
            let mono = self.clock.monotonic();
            inner.retarget(self.backend.as_ref(), now, mono, change)
        };
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.remove(0))
        }
    }
}

impl Drop for FeedRecorder {
    fn drop(&mut self) {
        let unfinished = !self.lock_data().closed;
        if unfinished {
            if let Err(e) = self.stop() {
                log::warn!("Terminal flush on drop failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::sinks::MemoryBackend;
    use chrono::TimeZone;
    use std::sync::atomic::AtomicUsize;

    fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 12, 10, 0, 0).unwrap()
    }

    fn record(n: usize) -> Record {
        Record::new(start_time(), format!("PAIR{}", n), "update").with_book(n as f64, 1.0, n as f64 + 1.0, 1.0)
    }

    fn recorder(config: RecorderConfig) -> (FeedRecorder, MemoryBackend, Arc<ManualClock>) {
        let backend = MemoryBackend::new();
        let clock = Arc::new(ManualClock::new(start_time()));
        let recorder = FeedRecorder::with_parts(config, Arc::new(backend.clone()), clock.clone()).unwrap();
        (recorder, backend, clock)
    }

    fn config(interval: u64, threshold: u64) -> RecorderConfig {
        RecorderConfig {
            output_path: Some(PathBuf::from("out/ticker.mem")),
            flush_interval_secs: interval,
            size_threshold_bytes: threshold,
            ..Default::default()
        }
    }

    #[test]
    fn test_start_opens_single_file() {
        let (recorder, backend, _clock) = recorder(config(30, 0));
        recorder.start().unwrap();

        assert_eq!(backend.opened(), vec![PathBuf::from("out/ticker.mem")]);
        assert_eq!(recorder.segment_count(), 1);
        assert!(recorder.start().unwrap_err().is_config());
    }

    #[test]
    fn test_size_trigger_flushes_and_clears_pending() {
        let threshold = (3 * crate::core::record::RECORD_SIZE_BYTES) as u64;
        let (recorder, backend, _clock) = recorder(config(0, threshold));
        recorder.start().unwrap();

        recorder.ingest(record(0));
        recorder.ingest(record(1));
        assert_eq!(recorder.flush_count(), 0);
        assert_eq!(recorder.pending_count(), 2);

        recorder.ingest(record(2));
        assert_eq!(recorder.flush_count(), 1);
        assert_eq!(recorder.pending_count(), 0, "flush must clear pending even without a poll");
        assert_eq!(recorder.history_len(), 3);
        assert_eq!(backend.contents(Path::new("out/ticker.mem")).unwrap().len(), 3);
    }

    #[test]
    fn test_manual_config_only_flushes_explicitly() {
        let (recorder, backend, clock) = recorder(config(0, 0));
        recorder.start().unwrap();

        for i in 0..10 {
            recorder.ingest(record(i));
            clock.advance(Duration::from_secs(3600));
        }
        assert_eq!(recorder.flush_count(), 0);
        assert_eq!(backend.batches(), 0);

        assert_eq!(recorder.flush_now().unwrap(), 10);
        assert_eq!(recorder.flush_now().unwrap(), 0);
        assert_eq!(recorder.flush_count(), 1);
    }

    #[test]
    fn test_failed_flush_keeps_data_and_reports() {
        let (recorder, backend, clock) = recorder(config(10, 0));
        let reported = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&reported);
        recorder
            .set_error_callback(move |e| {
                assert!(e.is_io());
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        recorder.start().unwrap();

        backend.set_fail_writes(true);
        recorder.ingest(record(0));
        clock.advance(Duration::from_secs(11));
        recorder.ingest(record(1));

        assert_eq!(reported.load(Ordering::SeqCst), 1);
        let stats = recorder.stats();
        assert_eq!(stats.consecutive_failures, 1);
        assert_eq!(stats.pending_len, 2);
        assert_eq!(stats.unflushed_len, 2);
        assert_eq!(stats.flush_count, 0);

        // The failure reset the timer: the next ingest does not retry immediately.
        recorder.ingest(record(2));
        assert_eq!(reported.load(Ordering::SeqCst), 1);

        backend.set_fail_writes(false);
        clock.advance(Duration::from_secs(11));
        recorder.ingest(record(3));

        let stats = recorder.stats();
        assert_eq!(stats.consecutive_failures, 0);
        assert_eq!(stats.flush_count, 1);
        assert_eq!(stats.records_written, 4);
        assert_eq!(stats.pending_len, 0);
    }

    #[test]
    fn test_failed_open_is_retried_on_flush() {
        let (recorder, backend, _clock) = recorder(config(0, 0));
        let reported = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&reported);
        recorder.set_error_callback(move |_| { seen.fetch_add(1, Ordering::SeqCst); }).unwrap();

        backend.set_fail_opens(true);
        recorder.start().unwrap();
        assert_eq!(reported.load(Ordering::SeqCst), 1);
        assert!(recorder.is_running());

        recorder.ingest(record(0));
        assert!(recorder.flush_now().is_err());

        backend.set_fail_opens(false);
        assert_eq!(recorder.flush_now().unwrap(), 1);
        assert_eq!(recorder.segment_count(), 1);
    }

    #[test]
    fn test_callback_sees_record_and_registration_closes_at_start() {
        let (recorder, _backend, _clock) = recorder(config(0, 0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        recorder
            .set_update_callback(move |r| sink.lock().unwrap().push(r.symbol.clone()))
            .unwrap();
        recorder.start().unwrap();

        assert!(recorder.set_update_callback(|_| {}).unwrap_err().is_config());
        assert!(recorder.set_error_callback(|_| {}).unwrap_err().is_config());

        recorder.ingest(record(7));
        assert_eq!(*seen.lock().unwrap(), vec!["PAIR7".to_string()]);
    }

    #[test]
    fn test_callback_runs_outside_data_lock() {
        let (recorder, _backend, _clock) = recorder(config(0, 0));
        let recorder = Arc::new(recorder);
        let weak = Arc::downgrade(&recorder);
        let counted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&counted);
        recorder
            .set_update_callback(move |_| {
                // Would deadlock if the data lock were still held.
                if let Some(r) = weak.upgrade() {
                    counter.store(r.pending_count(), Ordering::SeqCst);
                }
            })
            .unwrap();

        recorder.ingest(record(0));
        assert_eq!(counted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_is_terminal() {
        let (recorder, backend, _clock) = recorder(config(30, 0));
        recorder.start().unwrap();
        recorder.ingest(record(0));
        recorder.ingest(record(1));

        assert_eq!(recorder.stop().unwrap(), 2);
        assert_eq!(backend.closes(), 1);
        assert!(!recorder.is_running());
        assert_eq!(recorder.stop().unwrap(), 0);
        assert!(recorder.start().unwrap_err().is_config());

        // Late records are kept in memory but never reopen the file.
        recorder.ingest(record(2));
        assert_eq!(recorder.flush_now().unwrap(), 0);
        assert_eq!(backend.opened().len(), 1);
        assert_eq!(recorder.history_len(), 3);
    }

    #[test]
    fn test_drop_performs_terminal_flush() {
        let (recorder, backend, _clock) = recorder(config(30, 0));
        recorder.start().unwrap();
        recorder.ingest(record(0));
        drop(recorder);

        assert_eq!(backend.contents(Path::new("out/ticker.mem")).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_terminal_flush_can_be_retried() {
        let (recorder, backend, _clock) = recorder(config(30, 0));
        recorder.start().unwrap();
        recorder.ingest(record(0));

        backend.set_fail_writes(true);
        assert!(recorder.stop().unwrap_err().is_io());
        assert_eq!(backend.closes(), 0);
        assert_eq!(recorder.stats().unflushed_len, 1);

        backend.set_fail_writes(false);
        assert_eq!(recorder.stop().unwrap(), 1);
        assert_eq!(backend.closes(), 1);
        assert_eq!(backend.contents(Path::new("out/ticker.mem")).unwrap().len(), 1);
        assert_eq!(recorder.stop().unwrap(), 0);
    }

    #[test]
    fn test_flush_now_after_failed_stop_writes_remaining_records() {
        let (recorder, backend, _clock) = recorder(config(30, 0));
        recorder.start().unwrap();
        recorder.ingest(record(0));
        recorder.ingest(record(1));

        backend.set_fail_writes(true);
        assert!(recorder.stop().is_err());
        backend.set_fail_writes(false);

        assert_eq!(recorder.flush_now().unwrap(), 2);
        assert_eq!(backend.contents(Path::new("out/ticker.mem")).unwrap().len(), 2);
        assert!(recorder.start().unwrap_err().is_config());
    }

    #[test]
    fn test_drop_retries_after_failed_stop() {
        let (recorder, backend, _clock) = recorder(config(30, 0));
        recorder.start().unwrap();
        recorder.ingest(record(0));

        backend.set_fail_writes(true);
        assert!(recorder.stop().is_err());
        backend.set_fail_writes(false);
        drop(recorder);

        assert_eq!(backend.contents(Path::new("out/ticker.mem")).unwrap().len(), 1);
        assert_eq!(backend.closes(), 1);
    }

    #[test]
    fn test_memory_only_never_flushes() {
        let (recorder, backend, _clock) = recorder(RecorderConfig {
            size_threshold_bytes: 1,
            ..Default::default()
        });
        recorder.start().unwrap();
        recorder.ingest(record(0));
        recorder.ingest(record(1));

        assert_eq!(recorder.flush_now().unwrap(), 0);
        assert_eq!(recorder.pending_count(), 2);
        assert!(backend.opened().is_empty());
        assert_eq!(recorder.active_filename(), None);
    }
}

//! End-to-end flows against the real file system: triggers, pending
//! semantics, snapshots and failure recovery.

use chrono::{DateTime, TimeZone, Utc};
use lib_recorder::sinks::{read_csv, read_jsonl};
use lib_recorder::{FeedRecorder, ManualClock, Record, RecorderConfig, SinkFormat, RECORD_SIZE_BYTES};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn ten_am() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 12, 10, 0, 0).unwrap()
}

fn tick(clock: &ManualClock, n: usize) -> Record {
    use lib_recorder::Clock;
    Record::new(clock.wall(), format!("PAIR{}", n), "update")
        .with_book(100.0 + n as f64, 1.0, 100.5 + n as f64, 2.0)
        .with_stats(100.25, 1000.0, 100.1, 99.0, 101.0, 0.25, 0.0025)
}

fn build(config: RecorderConfig) -> (FeedRecorder, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(ten_am()));
    let backend = config.format.backend();
    let recorder = FeedRecorder::with_parts(config, backend, clock.clone()).unwrap();
    (recorder, clock)
}

#[test]
fn test_time_trigger_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("ticker.csv");
    let (recorder, clock) = build(RecorderConfig {
        output_path: Some(path.clone()),
        flush_interval_secs: 30,
        size_threshold_bytes: 0,
        ..Default::default()
    });
    recorder.start().unwrap();

    for i in 0..5 {
        recorder.ingest(tick(&clock, i));
        clock.advance(Duration::from_millis(200));
    }
    assert_eq!(recorder.flush_count(), 0);

    clock.advance(Duration::from_secs(31));
    recorder.ingest(tick(&clock, 5));
    assert_eq!(recorder.flush_count(), 1);

    let on_disk = read_csv(&path).unwrap();
    assert_eq!(on_disk.len(), 6);
    assert_eq!(on_disk, recorder.snapshot_history());

    let header = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        header.lines().next().unwrap(),
        "timestamp,pair,type,bid,bid_qty,ask,ask_qty,last,volume,vwap,low,high,change,change_pct"
    );
    assert_eq!(header.matches("timestamp,pair").count(), 1);
}

#[test]
fn test_size_trigger_clears_pending_and_keeps_history() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("ticker.csv");
    let (recorder, clock) = build(RecorderConfig {
        output_path: Some(path.clone()),
        flush_interval_secs: 0,
        size_threshold_bytes: (4 * RECORD_SIZE_BYTES) as u64,
        ..Default::default()
    });
    recorder.start().unwrap();

    for i in 0..10 {
        recorder.ingest(tick(&clock, i));
    }

    // Flushes at 4 and 8; two records remain unflushed and pending.
    assert_eq!(recorder.flush_count(), 2);
    assert_eq!(recorder.pending_count(), 2);
    assert_eq!(recorder.history_len(), 10);

    let drained = recorder.drain_pending();
    assert_eq!(drained.iter().map(|r| r.symbol.as_str()).collect::<Vec<_>>(), vec!["PAIR8", "PAIR9"]);
    assert!(recorder.drain_pending().is_empty());

    // Draining does not affect what still has to be persisted.
    assert_eq!(recorder.stop().unwrap(), 2);
    assert_eq!(read_csv(&path).unwrap().len(), 10);
    assert_eq!(recorder.history_len(), 10);
}

#[test]
fn test_no_flush_when_nothing_buffered() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("ticker.csv");
    let (recorder, clock) = build(RecorderConfig {
        output_path: Some(path.clone()),
        flush_interval_secs: 1,
        ..Default::default()
    });
    recorder.start().unwrap();

    clock.advance(Duration::from_secs(3600));
    assert_eq!(recorder.flush_now().unwrap(), 0);
    assert_eq!(recorder.flush_count(), 0);

    recorder.ingest(tick(&clock, 0));
    assert_eq!(recorder.flush_count(), 1, "a long idle period flushes on the first record");
}

#[test]
fn test_jsonl_output_with_derived_extension() {
    let tmp = TempDir::new().unwrap();
    let (recorder, clock) = build(RecorderConfig {
        output_path: Some(tmp.path().join("ticker")),
        format: SinkFormat::Jsonl,
        flush_interval_secs: 0,
        size_threshold_bytes: 0,
        ..Default::default()
    });
    recorder.start().unwrap();
    for i in 0..3 {
        recorder.ingest(tick(&clock, i));
    }
    recorder.stop().unwrap();

    let expected = tmp.path().join("ticker.jsonl");
    assert_eq!(recorder.active_filename(), Some(expected.clone()));
    assert_eq!(read_jsonl(&expected).unwrap(), recorder.snapshot_history());
}

#[test]
fn test_snapshot_is_independent_of_active_sink() {
    let tmp = TempDir::new().unwrap();
    let live = tmp.path().join("live.csv");
    let snapshot = tmp.path().join("snapshot.csv");
    let (recorder, clock) = build(RecorderConfig {
        output_path: Some(live.clone()),
        flush_interval_secs: 0,
        size_threshold_bytes: 0,
        ..Default::default()
    });
    recorder.start().unwrap();
    for i in 0..4 {
        recorder.ingest(tick(&clock, i));
    }

    assert_eq!(recorder.save_snapshot_csv(&snapshot).unwrap(), 4);
    assert_eq!(read_csv(&snapshot).unwrap().len(), 4);
    assert!(read_csv(&live).unwrap().is_empty(), "nothing flushed to the live file yet");
    assert_eq!(recorder.pending_count(), 4);
}

#[test]
fn test_unwritable_directory_recovers_once_created() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("not-yet");
    let path: PathBuf = dir.join("ticker.csv");
    let (recorder, clock) = build(RecorderConfig {
        output_path: Some(path.clone()),
        flush_interval_secs: 5,
        size_threshold_bytes: 0,
        ..Default::default()
    });
    let errors = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&errors);
    recorder
        .set_error_callback(move |e| {
            assert!(e.is_io());
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    recorder.start().unwrap();
    assert_eq!(errors.load(Ordering::SeqCst), 1);

    recorder.ingest(tick(&clock, 0));
    clock.advance(Duration::from_secs(6));
    recorder.ingest(tick(&clock, 1));
    assert_eq!(errors.load(Ordering::SeqCst), 2);
    assert_eq!(recorder.stats().consecutive_failures, 1);
    assert_eq!(recorder.pending_count(), 2);

    std::fs::create_dir_all(&dir).unwrap();
    clock.advance(Duration::from_secs(6));
    recorder.ingest(tick(&clock, 2));

    let stats = recorder.stats();
    assert_eq!(stats.consecutive_failures, 0);
    assert_eq!(stats.flush_count, 1);
    assert_eq!(stats.segment_count, 1);
    assert_eq!(read_csv(&path).unwrap().len(), 3);
}

//! # Record Ingestors
//!
//! The inbound side of the recorder. A transport turns wire messages into
//! [`Record`]s and hands them to [`FeedRecorder::ingest`] from a single
//! producer thread. Messages that fail to decode are dropped here, at the
//! transport, and never reach the recorder.
//!
//! ## Contained Sources:
//! - **`JsonLinesReplay`**: replays a file written by the JSON-lines backend,
//!   optionally paced, which makes an earlier capture usable as a live feed.

#![forbid(unsafe_code)]

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::core::record::Record;
use crate::core::recorder::FeedRecorder;
use crate::error::Result;

/// A pull-based producer of records.
pub trait RecordSource: Send {
    /// Next record, or `None` once the source is exhausted.
    fn next_record(&mut self) -> Result<Option<Record>>;

    /// Pause to apply between records. Zero means as fast as possible.
    fn pace(&self) -> Duration {
        Duration::ZERO
    }
}

/// Drives `source` into `recorder` until it is exhausted or `stop` is set.
/// Returns the number of records ingested.
pub fn pump(source: &mut dyn RecordSource, recorder: &FeedRecorder, stop: &AtomicBool) -> Result<u64> {
    let mut ingested = 0u64;
    while !stop.load(Ordering::SeqCst) {
        let Some(record) = source.next_record()? else {
            break;
        };
        recorder.ingest(record);
        ingested += 1;

        let pace = source.pace();
        if !pace.is_zero() {
            std::thread::sleep(pace);
        }
    }
    log::info!("Producer finished after {} records", ingested);
    Ok(ingested)
}

/// Replays JSON Lines. Blank lines are skipped; undecodable lines are logged
/// and skipped as a transport would drop a malformed frame.
pub struct JsonLinesReplay<R> {
    reader: R,
    line: String,
    line_no: usize,
    skipped: usize,
    pace: Duration,
}

impl JsonLinesReplay<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        log::info!("Replaying records from {}", path.display());
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: BufRead + Send> JsonLinesReplay<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            line_no: 0,
            skipped: 0,
            pace: Duration::ZERO,
        }
    }

    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = pace;
        self
    }

    /// Lines dropped because they did not decode.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<R: BufRead + Send> RecordSource for JsonLinesReplay<R> {
    fn next_record(&mut self) -> Result<Option<Record>> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let text = self.line.trim();
            if text.is_empty() {
                continue;
            }
            match serde_json::from_str::<Record>(text) {
                Ok(record) => return Ok(Some(record)),
                Err(e) => {
                    self.skipped += 1;
                    log::warn!("Skipping line {}: {}", self.line_no, e);
                }
            }
        }
    }

    fn pace(&self) -> Duration {
        self.pace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::RecorderConfig;
    use chrono::{TimeZone, Utc};
    use std::io::Cursor;

    fn line(symbol: &str) -> String {
        let ts = Utc.with_ymd_and_hms(2025, 11, 12, 10, 0, 0).unwrap();
        serde_json::to_string(&Record::new(ts, symbol, "update")).unwrap()
    }

    #[test]
    fn test_replay_skips_blank_and_malformed_lines() {
        let input = format!("{}\n\n{{not json}}\n{}\n", line("BTC/USD"), line("ETH/USD"));
        let mut replay = JsonLinesReplay::from_reader(Cursor::new(input));

        assert_eq!(replay.next_record().unwrap().unwrap().symbol, "BTC/USD");
        assert_eq!(replay.next_record().unwrap().unwrap().symbol, "ETH/USD");
        assert!(replay.next_record().unwrap().is_none());
        assert_eq!(replay.skipped(), 1);
    }

    #[test]
    fn test_pump_feeds_recorder_until_exhausted() {
        let input = (0..5).map(|i| line(&format!("P{}", i))).collect::<Vec<_>>().join("\n");
        let mut replay = JsonLinesReplay::from_reader(Cursor::new(input));
        let recorder = FeedRecorder::new(RecorderConfig::default()).unwrap();

        let count = pump(&mut replay, &recorder, &AtomicBool::new(false)).unwrap();
        assert_eq!(count, 5);
        assert_eq!(recorder.history_len(), 5);
        assert_eq!(recorder.drain_pending().len(), 5);
    }

    #[test]
    fn test_pump_honours_stop_flag() {
        let mut replay = JsonLinesReplay::from_reader(Cursor::new(line("BTC/USD")));
        let recorder = FeedRecorder::new(RecorderConfig::default()).unwrap();

        assert_eq!(pump(&mut replay, &recorder, &AtomicBool::new(true)).unwrap(), 0);
        assert_eq!(recorder.history_len(), 0);
    }
}

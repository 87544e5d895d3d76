//! # Persistence Backends
//!
//! A backend knows how to open a sink for a path; a sink knows how to append
//! batches of records to the file it was opened on. Backends differ only in
//! serialization:
//!
//! - **`csv`**: fixed-column tabular text with a single header line per file.
//! - **`jsonl`**: one JSON object per line, no preamble.
//!
//! ## Contract
//!
//! - `open_sink` uses create/truncate semantics. A stale file from an earlier
//!   run is overwritten, never appended to.
//! - `write_batch` may be called many times on one sink (successive flushes
//!   into the same segment append) and performs one logical I/O flush per call.
//! - Headers are written at most once per physical file.
//! - A failed `write_batch` leaves the file as it was after the last
//!   successful one, so the caller can retry the same batch.
//!
//! The recorder holds the backend as `Arc<dyn SinkBackend>`, so tests can swap
//! in [`MemoryBackend`](memory::MemoryBackend).

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::record::Record;
use crate::error::Result;

/// Tabular CSV backend.
pub mod csv_sink;
/// One-object-per-line JSON backend.
pub mod jsonl_sink;
/// In-memory backend with failure injection.
pub mod memory;
/// Commit-offset file writer shared by the file backends.
pub mod segment_file;
/// One-shot full-history exports.
pub mod snapshot;

pub use csv_sink::{read_csv, CsvBackend, CsvSink};
pub use jsonl_sink::{read_jsonl, JsonLinesBackend, JsonLinesSink};
pub use memory::MemoryBackend;
pub use segment_file::{SegmentFile, SegmentStorage};
pub use snapshot::save_snapshot_csv;

/// An open, writable destination for one segment.
pub trait BufferedSink: Send {
    /// Path this sink was opened on.
    fn path(&self) -> &Path;

    /// Appends `records` in order and flushes once. Returns the count written.
    fn write_batch(&mut self, records: &[Record]) -> Result<usize>;

    /// Flushes and releases the underlying handle.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Factory for sinks of one serialization format.
pub trait SinkBackend: Send + Sync {
    /// Format name used in logs.
    fn name(&self) -> &'static str;

    /// Extension (without dot) appended to extensionless base paths.
    fn extension(&self) -> &'static str;

    /// Creates or truncates `path` and returns a sink positioned at its start.
    fn open_sink(&self, path: &Path) -> Result<Box<dyn BufferedSink>>;
}

/// Closes a sink handle. Equivalent to `sink.close()`.
pub fn close_sink(sink: Box<dyn BufferedSink>) -> Result<()> {
    sink.close()
}

/// File formats selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkFormat {
    #[default]
    Csv,
    Jsonl,
}

impl SinkFormat {
    pub fn backend(&self) -> Arc<dyn SinkBackend> {
        match self {
            SinkFormat::Csv => Arc::new(CsvBackend),
            SinkFormat::Jsonl => Arc::new(JsonLinesBackend),
        }
    }
}

impl fmt::Display for SinkFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkFormat::Csv => f.write_str("csv"),
            SinkFormat::Jsonl => f.write_str("jsonl"),
        }
    }
}

impl FromStr for SinkFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(SinkFormat::Csv),
            "jsonl" | "json" | "ndjson" => Ok(SinkFormat::Jsonl),
            other => Err(format!("unknown output format '{}' (expected csv or jsonl)", other)),
        }
    }
}

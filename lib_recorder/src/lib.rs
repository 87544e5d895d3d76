//! # lib_recorder
//!
//! Buffering, flush-triggering and time-segmented persistence for a
//! market-data feed. A single producer calls [`FeedRecorder::ingest`]; any
//! number of consumers poll with [`FeedRecorder::drain_pending`]; records are
//! persisted in batches to CSV or JSON-lines files that roll over hourly or
//! daily.

pub mod configs;
pub mod core;
pub mod error;
pub mod ingestors;
pub mod sinks;

// Re-export everything callers normally need
pub use configs::RecorderConfig;
pub use self::core::*;
pub use error::{RecorderError, Result};
pub use ingestors::{pump, JsonLinesReplay, RecordSource};
pub use sinks::{BufferedSink, CsvBackend, JsonLinesBackend, MemoryBackend, SinkBackend, SinkFormat};

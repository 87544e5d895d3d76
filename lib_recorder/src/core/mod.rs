//! # Core Recording Module
//!
//! The buffering, flush-triggering and time-segmentation engine. Everything
//! here is synchronous and driven by the producer's `ingest` calls; there is no
//! background timer thread.
//!
//! ## Core Components:
//!
//! - **`record`**: The ticker record shape and its CSV column order.
//!
//! - **`store`**: History (append-only) and the Pending Queue (drained by
//!   consumers, cleared by flushes), plus the flushed-cursor marking the next batch.
//!
//! - **`flush_trigger`**: Pure OR-policy decision over elapsed time and
//!   buffered bytes. A zero threshold disables that half.
//!
//! - **`segment`**: UTC segment keys, filename derivation and the single
//!   authoritative active-file state.
//!
//! - **`clock`**: Monotonic + wall time behind one trait, so tests can
//!   simulate hours passing.
//!
//! - **`recorder`**: The coordinator tying the above to a sink backend under
//!   one data lock.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// Monotonic and wall-clock time sources.
pub mod clock;
/// Pure flush-trigger policy.
pub mod flush_trigger;
/// The ticker record.
pub mod record;
/// The concurrency coordinator.
pub mod recorder;
/// Segment keys and active-file state.
pub mod segment;
/// History and Pending Queue.
pub mod store;

// --- Public API Re-exports ---
pub use clock::{Clock, ManualClock, SystemClock};
pub use flush_trigger::{FlushConfig, FlushDecision, DEFAULT_FLUSH_INTERVAL, DEFAULT_SIZE_THRESHOLD};
pub use record::{Record, CSV_HEADER, RECORD_SIZE_BYTES};
pub use recorder::{ErrorCallback, FeedRecorder, RecorderStats, UpdateCallback};
pub use segment::{segment_filename, SegmentMode, SegmentResolver};
pub use store::RecordStore;

//! # History & Pending Store
//!
//! Owns the two views over received records:
//!
//! - **History**: append-only, every record ever ingested, never shrinks while
//!   the owning recorder lives. It also carries a flushed-cursor; the suffix
//!   past the cursor is the batch the next flush persists.
//! - **Pending Queue**: the delta handed to polling consumers. Cleared by a
//!   drain *and* by every successful flush, so callback-only clients that never
//!   poll do not grow it without bound.
//!
//! The store is not synchronized on its own. `FeedRecorder` keeps it behind the
//! data lock, which is what makes `drain_pending` exclusive across threads.

use crate::core::record::{Record, RECORD_SIZE_BYTES};

/// Initial capacity of the pending queue after a drain.
const PENDING_INITIAL_CAPACITY: usize = 1000;

#[derive(Debug, Default)]
pub struct RecordStore {
    history: Vec<Record>,
    pending: Vec<Record>,
    /// Number of History entries already persisted.
    flushed: usize,
}

impl RecordStore {
    pub fn new() -> Self {
        Self {
            history: Vec::with_capacity(PENDING_INITIAL_CAPACITY),
            pending: Vec::with_capacity(PENDING_INITIAL_CAPACITY),
            flushed: 0,
        }
    }

    /// Appends to History and to the Pending Queue. Never fails; an allocation
    /// failure here aborts the process.
    pub fn ingest(&mut self, record: Record) {
        self.pending.push(record.clone());
        self.history.push(record);
    }

    /// Returns and clears the Pending Queue, in ingest order.
    pub fn drain_pending(&mut self) -> Vec<Record> {
        std::mem::replace(&mut self.pending, Vec::with_capacity(PENDING_INITIAL_CAPACITY))
    }

    /// Full copy of History. O(n): prefer [`history_len`](Self::history_len)
    /// when only the size matters.
    pub fn snapshot_history(&self) -> Vec<Record> {
        self.history.clone()
    }

    /// Drops the Pending Queue without handing it out (automatic flush path).
    pub fn clear_pending_without_returning(&mut self) {
        self.pending.clear();
    }

    /// Borrow of the History slice, for writers that must not copy it.
    pub fn history(&self) -> &[Record] {
        &self.history
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Records ingested but not yet persisted, oldest first.
    pub fn unflushed(&self) -> &[Record] {
        &self.history[self.flushed..]
    }

    pub fn unflushed_len(&self) -> usize {
        self.history.len() - self.flushed
    }

    /// Estimated bytes held by the unflushed batch (count x record size).
    pub fn unflushed_bytes(&self) -> u64 {
        (self.unflushed_len() * RECORD_SIZE_BYTES) as u64
    }

    /// Advances the flushed-cursor past `count` more records.
    pub fn mark_flushed(&mut self, count: usize) {
        self.flushed = (self.flushed + count).min(self.history.len());
    }
}

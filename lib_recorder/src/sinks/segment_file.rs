//! Append-only segment file with a commit offset.
//!
//! Sinks encode a whole batch in memory and hand the bytes to
//! [`SegmentFile::append`]. A write that fails partway is rolled back to the
//! last committed offset, so a retried batch never lands on disk twice.

use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};

use crate::error::Result;

/// Byte storage a segment can be written to and cut back.
pub trait SegmentStorage: Write + Send {
    /// Discards everything past `len` and positions the next write there.
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl SegmentStorage for File {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)?;
        self.seek(SeekFrom::Start(len))?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct SegmentFile<F> {
    storage: F,
    committed: u64,
}

impl<F: SegmentStorage> SegmentFile<F> {
    /// Wraps freshly created (empty) storage.
    pub fn new(storage: F) -> Self {
        Self { storage, committed: 0 }
    }

    /// Bytes durably handed to the storage by successful appends.
    pub fn committed(&self) -> u64 {
        self.committed
    }

    pub fn get_ref(&self) -> &F {
        &self.storage
    }

    pub fn get_mut(&mut self) -> &mut F {
        &mut self.storage
    }

    /// Writes and flushes `bytes` as one unit. On failure the storage is
    /// truncated back to the previous commit before the error is returned.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let written = self.storage.write_all(bytes).and_then(|_| self.storage.flush());
        if let Err(e) = written {
            if let Err(rollback) = self.storage.truncate_to(self.committed) {
                log::error!(
                    "Cannot roll segment back to offset {} after failed write: {}",
                    self.committed,
                    rollback
                );
            }
            return Err(e.into());
        }
        self.committed += bytes.len() as u64;
        Ok(())
    }
}

/// In-memory storage that accepts a limited number of bytes, writing the
/// prefix that fits before failing like a full disk.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct CappedStorage {
    pub data: Vec<u8>,
    pub cap: Option<usize>,
}

#[cfg(test)]
impl Write for CappedStorage {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let room = match self.cap {
            Some(cap) => cap.saturating_sub(self.data.len()),
            None => buf.len(),
        };
        if room == 0 && !buf.is_empty() {
            return Err(io::Error::other("file too large"));
        }
        let n = room.min(buf.len());
        self.data.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
impl SegmentStorage for CappedStorage {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.data.truncate(len as usize);
        Ok(())
    }
}

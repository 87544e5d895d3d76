use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::core::record::Record;
use crate::error::Result;
use crate::sinks::segment_file::{SegmentFile, SegmentStorage};
use crate::sinks::{BufferedSink, SinkBackend};

/// Initial capacity of the per-batch encode buffer.
const JSONL_BATCH_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLinesBackend;

impl SinkBackend for JsonLinesBackend {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    fn extension(&self) -> &'static str {
        "jsonl"
    }

    fn open_sink(&self, path: &Path) -> Result<Box<dyn BufferedSink>> {
        Ok(Box::new(JsonLinesSink::create(path)?))
    }
}

/// JSON Lines file for one segment: one record object per line.
pub struct JsonLinesSink<F = File> {
    path: PathBuf,
    segment: SegmentFile<F>,
}

impl JsonLinesSink<File> {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::with_storage(path, file))
    }
}

impl<F: SegmentStorage> JsonLinesSink<F> {
    pub fn with_storage(path: &Path, storage: F) -> Self {
        Self {
            path: path.to_path_buf(),
            segment: SegmentFile::new(storage),
        }
    }
}

impl<F: SegmentStorage> BufferedSink for JsonLinesSink<F> {
    fn path(&self) -> &Path {
        &self.path
    }

    fn write_batch(&mut self, records: &[Record]) -> Result<usize> {
        let mut bytes = Vec::with_capacity(JSONL_BATCH_BYTES);
        for record in records {
            serde_json::to_writer(&mut bytes, record)?;
            bytes.push(b'\n');
        }
        self.segment.append(&bytes)?;
        Ok(records.len())
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Reads a JSON Lines file written by [`JsonLinesSink`]. Blank lines are skipped.
pub fn read_jsonl(path: &Path) -> Result<Vec<Record>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str::<Record>(&line)?);
    }
    Ok(records)
}

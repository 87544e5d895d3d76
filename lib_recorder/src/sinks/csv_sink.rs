use std::fs::File;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim, WriterBuilder};

use crate::core::record::Record;
use crate::error::Result;
use crate::sinks::segment_file::{SegmentFile, SegmentStorage};
use crate::sinks::{BufferedSink, SinkBackend};

/// Initial capacity of the per-batch encode buffer.
const CSV_BATCH_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvBackend;

impl SinkBackend for CsvBackend {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn extension(&self) -> &'static str {
        "csv"
    }

    fn open_sink(&self, path: &Path) -> Result<Box<dyn BufferedSink>> {
        Ok(Box::new(CsvSink::create(path)?))
    }
}

/// CSV file for one segment. The header row goes out with the first
/// committed batch and never again for the same file; a batch that failed to
/// commit leaves no rows behind, header included.
pub struct CsvSink<F = File> {
    path: PathBuf,
    segment: SegmentFile<F>,
    header_written: bool,
}

impl CsvSink<File> {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::with_storage(path, file))
    }
}

impl<F: SegmentStorage> CsvSink<F> {
    pub fn with_storage(path: &Path, storage: F) -> Self {
        Self {
            path: path.to_path_buf(),
            segment: SegmentFile::new(storage),
            header_written: false,
        }
    }

    fn encode(&self, records: &[Record]) -> Result<Vec<u8>> {
        let mut writer = WriterBuilder::new()
            .has_headers(!self.header_written)
            .from_writer(Vec::with_capacity(CSV_BATCH_BYTES));
        for record in records {
            writer.serialize(record)?;
        }
        writer.into_inner().map_err(|e| e.into_error().into())
    }
}

impl<F: SegmentStorage> BufferedSink for CsvSink<F> {
    fn path(&self) -> &Path {
        &self.path
    }

    fn write_batch(&mut self, records: &[Record]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let bytes = self.encode(records)?;
        self.segment.append(&bytes)?;
        self.header_written = true;
        Ok(records.len())
    }

    fn close(self: Box<Self>) -> Result<()> {
        // Every committed batch was already flushed by `append`.
        Ok(())
    }
}

/// Reads every row of a CSV file written by [`CsvSink`].
pub fn read_csv(path: &Path) -> Result<Vec<Record>> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_path(path)?;
    let mut records: Vec<Record> = Vec::new();
    for row in reader.deserialize::<Record>() {
        records.push(row?);
    }
    Ok(records)
}

use std::path::Path;

use crate::core::record::Record;
use crate::error::Result;
use crate::sinks::{BufferedSink, CsvSink};

/// Writes `records` to a fresh CSV file at `path` (header + rows), replacing
/// anything already there. Independent of any sink a recorder holds open.
pub fn save_snapshot_csv(path: &Path, records: &[Record]) -> Result<usize> {
    let mut sink: Box<dyn BufferedSink> = Box::new(CsvSink::create(path)?);
    let written = sink.write_batch(records)?;
    sink.close()?;
    log::info!("Saved snapshot of {} records to {}", written, path.display());
    Ok(written)
}

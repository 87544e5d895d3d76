//! In-memory backend. Keeps each "file" as a `Vec<Record>` keyed by path and can
//! be told to fail opens or writes, which makes it the fake sink for
//! exercising the recorder's failure paths without touching the disk.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::core::record::Record;
use crate::error::Result;
use crate::sinks::{BufferedSink, SinkBackend};

#[derive(Debug, Default)]
struct Shared {
    files: Mutex<HashMap<PathBuf, Vec<Record>>>,
    opened: Mutex<Vec<PathBuf>>,
    batches: AtomicUsize,
    closes: AtomicUsize,
    fail_opens: AtomicBool,
    fail_writes: AtomicBool,
}

/// Cloning shares state: keep a clone to inspect what the recorder wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents of `path`, or `None` if it was never opened.
    pub fn contents(&self, path: &Path) -> Option<Vec<Record>> {
        self.shared.files.lock().unwrap_or_else(PoisonError::into_inner).get(path).cloned()
    }

    /// Paths in the order they were opened.
    pub fn opened(&self) -> Vec<PathBuf> {
        self.shared.opened.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of successful `write_batch` calls.
    pub fn batches(&self) -> usize {
        self.shared.batches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }

    pub fn set_fail_opens(&self, fail: bool) {
        self.shared.fail_opens.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.shared.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Seeds a pre-existing "file", e.g. a stale segment from an earlier run.
    pub fn preload(&self, path: &Path, records: Vec<Record>) {
        self.shared
            .files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf(), records);
    }
}

impl SinkBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn extension(&self) -> &'static str {
        "mem"
    }

    fn open_sink(&self, path: &Path) -> Result<Box<dyn BufferedSink>> {
        if self.shared.fail_opens.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, format!("cannot open {}", path.display())).into());
        }
        // Truncate on open.
        self.shared
            .files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf(), Vec::new());
        self.shared
            .opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_path_buf());

        Ok(Box::new(MemorySink {
            path: path.to_path_buf(),
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct MemorySink {
    path: PathBuf,
    shared: Arc<Shared>,
}

impl BufferedSink for MemorySink {
    fn path(&self) -> &Path {
        &self.path
    }

    fn write_batch(&mut self, records: &[Record]) -> Result<usize> {
        if self.shared.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::other("injected write failure").into());
        }
        let mut files = self.shared.files.lock().unwrap_or_else(PoisonError::into_inner);
        files.entry(self.path.clone()).or_default().extend_from_slice(records);
        self.shared.batches.fetch_add(1, Ordering::SeqCst);
        Ok(records.len())
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

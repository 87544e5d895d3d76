//! # Segment Resolver
//!
//! Maps wall-clock time to a segment key and decides which file the recorder
//! persists into. Three modes:
//!
//! | mode     | key           | example file               |
//! |----------|---------------|----------------------------|
//! | `None`   | (none)        | `output.csv`               |
//! | `Hourly` | `YYYYMMDD_HH` | `output.20251112_10.csv`   |
//! | `Daily`  | `YYYYMMDD`    | `output.20251112.csv`      |
//!
//! Keys are derived in UTC so DST shifts never produce duplicate or missing
//! hours. The resolver is the single owner of `active_filename`; the recorder
//! opens and closes sinks, but reads the target path from here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentMode {
    /// Single file for the whole run.
    #[default]
    None,
    /// One file per UTC hour.
    Hourly,
    /// One file per UTC day.
    Daily,
}

impl SegmentMode {
    /// Segment key for `now`, or `None` when segmentation is off.
    pub fn key_for(&self, now: DateTime<Utc>) -> Option<String> {
        match self {
            SegmentMode::None => None,
            SegmentMode::Hourly => Some(now.format("%Y%m%d_%H").to_string()),
            SegmentMode::Daily => Some(now.format("%Y%m%d").to_string()),
        }
    }
}

impl fmt::Display for SegmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SegmentMode::None => "none",
            SegmentMode::Hourly => "hourly",
            SegmentMode::Daily => "daily",
        };
        f.write_str(name)
    }
}

impl FromStr for SegmentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "" => Ok(SegmentMode::None),
            "hourly" | "hour" => Ok(SegmentMode::Hourly),
            "daily" | "day" => Ok(SegmentMode::Daily),
            other => Err(format!("unknown segment mode '{}' (expected none, hourly or daily)", other)),
        }
    }
}

/// Builds the on-disk name for a segment.
///
/// The key goes immediately before the final extension of `base`. When `base`
/// has no extension, `default_ext` is used. Without a key the result is
/// `{base}` (or `{base}.{default_ext}` for an extensionless base).
pub fn segment_filename(base: &Path, key: Option<&str>, default_ext: &str) -> PathBuf {
    let stem = base.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let ext = base
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| default_ext.trim_start_matches('.').to_string());

    let name = match key {
        Some(key) => format!("{}.{}.{}", stem, key, ext),
        None => format!("{}.{}", stem, ext),
    };
    base.with_file_name(name)
}

/// Segment state: mode, base path and the single authoritative active file.
#[derive(Debug, Clone)]
pub struct SegmentResolver {
    mode: SegmentMode,
    base_path: Option<PathBuf>,
    extension: String,
    active_key: Option<String>,
    active_filename: Option<PathBuf>,
    segment_count: u64,
}

impl SegmentResolver {
    pub fn new(mode: SegmentMode, base_path: Option<PathBuf>, extension: &str) -> Self {
        Self {
            mode,
            base_path,
            extension: extension.to_string(),
            active_key: None,
            active_filename: None,
            segment_count: 0,
        }
    }

    pub fn mode(&self) -> SegmentMode {
        self.mode
    }

    pub fn base_path(&self) -> Option<&Path> {
        self.base_path.as_deref()
    }

    pub fn active_key(&self) -> Option<&str> {
        self.active_key.as_deref()
    }

    pub fn active_filename(&self) -> Option<&Path> {
        self.active_filename.as_deref()
    }

    pub fn segment_count(&self) -> u64 {
        self.segment_count
    }

    /// True once a segment has been activated.
    pub fn is_active(&self) -> bool {
        self.active_filename.is_some()
    }

    /// Target `(key, filename)` for `now`, or `None` without an output path.
    pub fn resolve(&self, now: DateTime<Utc>) -> Option<(Option<String>, PathBuf)> {
        let base = self.base_path.as_deref()?;
        let key = self.mode.key_for(now);
        let filename = segment_filename(base, key.as_deref(), &self.extension);
        Some((key, filename))
    }

    /// True when `now` falls into a different segment than the active one.
    /// Always false in `None` mode and before the first activation.
    pub fn crossed_boundary(&self, now: DateTime<Utc>) -> bool {
        if self.mode == SegmentMode::None || !self.is_active() {
            return false;
        }
        self.mode.key_for(now) != self.active_key
    }

    /// Makes `(key, filename)` the active segment and counts it.
    pub fn activate(&mut self, key: Option<String>, filename: PathBuf) {
        self.active_key = key;
        self.active_filename = Some(filename);
        self.segment_count += 1;
    }

    /// Forgets the active segment; the next `activate` starts a fresh file.
    pub fn deactivate(&mut self) {
        self.active_key = None;
        self.active_filename = None;
    }

    pub fn set_mode(&mut self, mode: SegmentMode) {
        self.mode = mode;
    }

    pub fn set_base_path(&mut self, base_path: Option<PathBuf>) {
        self.base_path = base_path;
    }
}

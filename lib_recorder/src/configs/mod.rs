//! # Recorder Configuration
//!
//! Everything a `FeedRecorder` needs at construction time, injected explicitly
//! instead of read from process-wide defaults. Serializable so the binary can
//! layer it from a JSON file, environment and CLI.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::flush_trigger::{FlushConfig, DEFAULT_FLUSH_INTERVAL, DEFAULT_SIZE_THRESHOLD};
use crate::core::segment::SegmentMode;
use crate::error::{RecorderError, Result};
use crate::sinks::SinkFormat;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderConfig {
    /// Base output path. `None` keeps records in memory only.
    pub output_path: Option<PathBuf>,
    pub format: SinkFormat,
    /// Time trigger in seconds, 0 disables.
    pub flush_interval_secs: u64,
    /// Size trigger in bytes, 0 disables.
    pub size_threshold_bytes: u64,
    pub segment_mode: SegmentMode,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            output_path: None,
            format: SinkFormat::Csv,
            flush_interval_secs: DEFAULT_FLUSH_INTERVAL.as_secs(),
            size_threshold_bytes: DEFAULT_SIZE_THRESHOLD,
            segment_mode: SegmentMode::None,
        }
    }
}

impl RecorderConfig {
    pub fn flush_config(&self) -> FlushConfig {
        FlushConfig::new(Duration::from_secs(self.flush_interval_secs), self.size_threshold_bytes)
    }

    /// Rejects output paths that cannot name a file.
    pub fn validate(&self) -> Result<()> {
        if let Some(path) = &self.output_path {
            if path.file_name().is_none() {
                return Err(RecorderError::Config(format!(
                    "output path '{}' does not name a file",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for RecorderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RecorderConfig
    Output path: {},
    Format: {},
    Flush interval: {}s,
    Size threshold: {} bytes,
    Segment mode: {}
",
            self.output_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(memory only)".to_string()),
            self.format,
            self.flush_interval_secs,
            self.size_threshold_bytes,
            self.segment_mode
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_flush_defaults() {
        let config = RecorderConfig::default();
        assert_eq!(config.flush_config(), FlushConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RecorderConfig =
            serde_json::from_str(r#"{ "outputPath": "out/ticker.csv", "segmentMode": "hourly" }"#).unwrap();
        assert_eq!(config.output_path, Some(PathBuf::from("out/ticker.csv")));
        assert_eq!(config.segment_mode, SegmentMode::Hourly);
        assert_eq!(config.flush_interval_secs, 30);
        assert_eq!(config.format, SinkFormat::Csv);
    }

    #[test]
    fn test_validate_rejects_directory_path() {
        let config = RecorderConfig {
            output_path: Some(PathBuf::from("out/..")),
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().is_config());
    }
}

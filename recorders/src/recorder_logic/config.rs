use anyhow::{anyhow, Context, Result};
use clap::Parser;
use lib_recorder::{RecorderConfig, SegmentMode, SinkFormat};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[clap(about = "Market-data feed recorder with batched, time-segmented output", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "FEED_RECORDER_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "FEED_RECORDER_OUTPUT_PATH", help = "Base output file. Omit to keep records in memory only.")]
    pub output_path: Option<PathBuf>,

    #[clap(long, env = "FEED_RECORDER_FORMAT", help = "Output format (csv, jsonl).")]
    pub format: Option<String>,

    #[clap(long, env = "FEED_RECORDER_SEGMENT_MODE", help = "File segmentation (none, hourly, daily).")]
    pub segment_mode: Option<String>,

    #[clap(long, env = "FEED_RECORDER_FLUSH_INTERVAL_SECS", help = "Flush after this many seconds. 0 disables the time trigger.")]
    pub flush_interval_secs: Option<u64>,

    #[clap(long, env = "FEED_RECORDER_SIZE_THRESHOLD_BYTES", help = "Flush once this many bytes are buffered. 0 disables the size trigger.")]
    pub size_threshold_bytes: Option<u64>,

    #[clap(long, env = "FEED_RECORDER_REPLAY_PATH", help = "JSON-lines capture to replay as the producer.")]
    pub replay_path: Option<PathBuf>,

    #[clap(long, env = "FEED_RECORDER_REPLAY_PACE_MS", help = "Delay in milliseconds between replayed records.")]
    pub replay_pace_ms: Option<u64>,

    #[clap(long, env = "FEED_RECORDER_STATS_INTERVAL_SECS", help = "Interval in seconds between consumer drains and stats reports.")]
    pub stats_interval_secs: Option<u64>,

    #[clap(long, env = "FEED_RECORDER_SNAPSHOT_PATH", help = "Write a CSV snapshot of the full history here on shutdown.")]
    pub snapshot_path: Option<PathBuf>,

    #[clap(long, env = "FEED_RECORDER_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "FEED_RECORDER_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "FEED_RECORDER_LOG_KEEP_FILES", help = "Number of log files to keep, including the current run.")]
    pub log_keep_files: Option<usize>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            config_path: other.config_path.or(self.config_path),
            output_path: other.output_path.or(self.output_path),
            format: other.format.or(self.format),
            segment_mode: other.segment_mode.or(self.segment_mode),
            flush_interval_secs: other.flush_interval_secs.or(self.flush_interval_secs),
            size_threshold_bytes: other.size_threshold_bytes.or(self.size_threshold_bytes),
            replay_path: other.replay_path.or(self.replay_path),
            replay_pace_ms: other.replay_pace_ms.or(self.replay_pace_ms),
            stats_interval_secs: other.stats_interval_secs.or(self.stats_interval_secs),
            snapshot_path: other.snapshot_path.or(self.snapshot_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            log_keep_files: other.log_keep_files.or(self.log_keep_files),
        }
    }

    fn defaults() -> Config {
        let recorder = RecorderConfig::default();
        Config {
            format: Some(recorder.format.to_string()),
            segment_mode: Some(recorder.segment_mode.to_string()),
            flush_interval_secs: Some(recorder.flush_interval_secs),
            size_threshold_bytes: Some(recorder.size_threshold_bytes),
            replay_pace_ms: Some(0),
            stats_interval_secs: Some(10),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            log_keep_files: Some(5),
            ..Default::default()
        }
    }

    /// Builds and validates the library configuration.
    pub fn recorder_config(&self) -> Result<RecorderConfig> {
        let defaults = RecorderConfig::default();
        let format = match &self.format {
            Some(s) => s.parse::<SinkFormat>().map_err(|e| anyhow!(e))?,
            None => defaults.format,
        };
        let segment_mode = match &self.segment_mode {
            Some(s) => s.parse::<SegmentMode>().map_err(|e| anyhow!(e))?,
            None => defaults.segment_mode,
        };

        let config = RecorderConfig {
            output_path: self.output_path.clone(),
            format,
            flush_interval_secs: self.flush_interval_secs.unwrap_or(defaults.flush_interval_secs),
            size_threshold_bytes: self.size_threshold_bytes.unwrap_or(defaults.size_threshold_bytes),
            segment_mode,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"))
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    pub fn log_keep_files(&self) -> usize {
        self.log_keep_files.unwrap_or(5).max(1)
    }

    pub fn replay_pace(&self) -> Duration {
        Duration::from_millis(self.replay_pace_ms.unwrap_or(0))
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs.unwrap_or(10).max(1))
    }
}

/// Where the file layer of the configuration came from.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    File(PathBuf),
    NotFound(PathBuf),
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "config file {}", path.display()),
            ConfigSource::NotFound(path) => write!(
                f,
                "no config file at {}; using defaults and environment/CLI variables",
                path.display()
            ),
        }
    }
}

/// Layers: built-in defaults < JSON file < environment/CLI.
///
/// Runs before logging is set up, so an unreadable or malformed config file
/// is returned as an error instead of being logged.
pub fn load_config() -> Result<(Config, ConfigSource)> {
    let cli_args = Config::parse();
    resolve(cli_args)
}

fn resolve(cli_args: Config) -> Result<(Config, ConfigSource)> {
    let config_file_path = cli_args
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("feed_recorder.conf"));

    let mut current_config = Config::defaults();

    let source = if config_file_path.exists() {
        let config_str = fs::read_to_string(&config_file_path)
            .with_context(|| format!("Failed to read config file {}", config_file_path.display()))?;
        let file_config = serde_json::from_str::<Config>(&config_str)
            .with_context(|| format!("Failed to parse config file {}", config_file_path.display()))?;
        current_config = current_config.merge(file_config);
        ConfigSource::File(config_file_path)
    } else {
        ConfigSource::NotFound(config_file_path)
    };

    // clap has already folded the environment into the CLI values.
    Ok((current_config.merge(cli_args), source))
}

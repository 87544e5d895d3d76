use anyhow::{bail, Result};
use chrono::{DateTime, Local};
use log::LevelFilter;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::SystemTime;

const LOG_FILE_PREFIX: &str = "feed_recorder_";
const LOG_FILE_EXT: &str = "log";

/// Installs the global logger: stdout for everything up to `log_level`,
/// stderr for warnings and errors, and one timestamped file per run.
///
/// Only this recorder's own log files are rotated, so the directory can be
/// shared with segment output.
pub fn setup_logging(log_dir: &Path, log_level: &str, keep_files: usize) -> Result<PathBuf> {
    let level = parse_level(log_level)?;
    fs::create_dir_all(log_dir)?;

    // The new file counts towards `keep_files`.
    cleanup_old_logs(log_dir, keep_files.saturating_sub(1))?;
    let log_path = log_file_path(log_dir, Local::now());

    fern::Dispatch::new()
        .format(|out, message, record| {
            let current = thread::current();
            out.finish(format_args!(
                "{}[{}][{}][{}] {}",
                Local::now().format("[%Y-%m-%d %H:%M:%S%.3f]"),
                current.name().unwrap_or("-"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(
            fern::Dispatch::new()
                .filter(|meta| meta.level() > log::Level::Warn)
                .chain(std::io::stdout()),
        )
        .chain(
            fern::Dispatch::new()
                .level(LevelFilter::Warn)
                .chain(std::io::stderr()),
        )
        .chain(fern::log_file(&log_path)?)
        .apply()?;

    Ok(log_path)
}

pub fn parse_level(log_level: &str) -> Result<LevelFilter> {
    let level = match log_level.trim().to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" | "warning" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        other => bail!("Unknown log level '{}' (expected trace, debug, info, warn, error, off)", other),
    };
    Ok(level)
}

pub fn log_file_path(log_dir: &Path, now: DateTime<Local>) -> PathBuf {
    log_dir.join(format!(
        "{}{}.{}",
        LOG_FILE_PREFIX,
        now.format("%Y-%m-%d_%H-%M-%S"),
        LOG_FILE_EXT
    ))
}

fn is_recorder_log(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == LOG_FILE_EXT)
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX))
}

/// Deletes all but the `keep` newest recorder logs. Returns how many went.
fn cleanup_old_logs(log_dir: &Path, keep: usize) -> Result<usize> {
    let mut entries: Vec<(SystemTime, PathBuf)> = fs::read_dir(log_dir)?
        .filter_map(|res| res.ok())
        .map(|e| e.path())
        .filter(|path| is_recorder_log(path))
        .map(|path| {
            let modified = fs::metadata(&path)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, path)
        })
        .collect();

    // Newest first; names carry the start time and break ties.
    entries.sort_by(|a, b| b.cmp(a));

    let mut removed = 0;
    for (_, path) in entries.iter().skip(keep) {
        match fs::remove_file(path) {
            Ok(()) => removed += 1,
            // The logger is not installed yet.
            Err(e) => eprintln!("Failed to delete old log file {}: {}", path.display(), e),
        }
    }
    Ok(removed)
}

//! Logging setup
//!
//! The TUI owns the terminal, so it logs to a timestamped file under
//! `<data_local_dir>/wslm/logs/` and removes files older than the retention
//! period on startup. The CLI logs to stderr.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogSettings, data_dir};

pub fn log_directory() -> PathBuf {
    data_dir().join("logs")
}

/// `wslm_<timestamp>.log` inside `dir`
pub fn log_file_path(dir: &Path) -> PathBuf {
    let now = chrono::Local::now();
    dir.join(format!("wslm_{}.log", now.format("%Y-%m-%d_%H-%M-%S")))
}

/// Delete `.log` files in `dir` older than `retention_hours`.
/// Returns how many were removed.
pub fn cleanup_old_logs(dir: &Path, retention_hours: u32) -> io::Result<u32> {
    if !dir.exists() {
        return Ok(0);
    }

    let retention = Duration::from_secs(u64::from(retention_hours) * 3600);
    let now = SystemTime::now();
    let mut deleted = 0;

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("log") {
            continue;
        }

        let age = fs::metadata(&path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());
        if age.is_some_and(|age| age > retention) && fs::remove_file(&path).is_ok() {
            deleted += 1;
        }
    }

    Ok(deleted)
}

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(LogSettings::parse_level(level)))
}

/// File logging for the TUI. Returns the log file path, or `None` when
/// logging is disabled.
pub fn init_file(settings: &LogSettings) -> io::Result<Option<PathBuf>> {
    if !settings.enabled || LogSettings::parse_level(&settings.level) == "off" {
        return Ok(None);
    }

    let dir = log_directory();
    fs::create_dir_all(&dir)?;
    let deleted = cleanup_old_logs(&dir, settings.retention_hours)?;

    let path = log_file_path(&dir);
    let file = File::create(&path)?;

    let layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter(&settings.level))
        .with(layer)
        .init();

    tracing::info!(path = %path.display(), level = %settings.level, "logging initialized");
    if deleted > 0 {
        tracing::info!("cleaned up {deleted} old log file(s)");
    }

    Ok(Some(path))
}

/// Stderr logging for the CLI
pub fn init_stderr(level: &str) {
    let layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .without_time();

    tracing_subscriber::registry()
        .with(filter(level))
        .with(layer)
        .init();
}

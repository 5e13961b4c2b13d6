use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::constants::{DEFAULT_LOG_FILTER, LOG_FILE_PREFIX};

/// Route stage logs to the console and to a daily JSON file in `log_dir`.
///
/// The returned guard flushes the file writer when dropped, so the caller
/// keeps it alive until the run ends. Human-readable progress goes to stderr
/// so stdout carries only the stage summaries.
pub fn init_logging(log_dir: &Path) -> WorkerGuard {
    if let Err(e) = fs::create_dir_all(log_dir) {
        eprintln!("Log directory {} unavailable: {}", log_dir.display(), e);
    }

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().with_writer(file_writer))
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
    if installed.is_err() {
        eprintln!("A tracing subscriber is already installed, keeping it");
    }
    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_is_created_under_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("nested").join("logs");
        let guard = init_logging(&log_dir);
        tracing::info!("logging ready");
        drop(guard);

        let names: Vec<String> = fs::read_dir(&log_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().any(|name| name.starts_with(LOG_FILE_PREFIX)), "{names:?}");
    }
}

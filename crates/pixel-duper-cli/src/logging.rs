use std::env;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILE: &str = "logs/pixel-duper.log";

/// Pretty terminal output plus a plain-text log file, both filtered by
/// `TRACING_LEVEL`. The file is `LOG_FILE_PATH` or `logs/pixel-duper.log`.
///
/// Buffered lines reach the file when the returned guard is dropped.
pub fn init_logger() -> WorkerGuard {
    let level = env::var("TRACING_LEVEL").unwrap_or_else(|_| "info".to_string());
    let log_file = env::var("LOG_FILE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOG_FILE));
    let (directory, file_name) = split_log_path(&log_file);
    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name));

    let terminal = fmt::layer()
        .with_writer(std::io::stdout)
        .pretty()
        .with_file(false)
        .without_time();
    let file = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(false);

    tracing_subscriber::registry()
        .with(EnvFilter::new(level))
        .with(terminal)
        .with(file)
        .init();

    info!("pixel-duper log file: {}", log_file.display());

    guard
}

fn split_log_path(path: &Path) -> (PathBuf, PathBuf) {
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("pixel-duper.log"));
    (directory.to_path_buf(), file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_log_path() {
        assert_eq!(
            split_log_path(Path::new("logs/pixel-duper.log")),
            (PathBuf::from("logs"), PathBuf::from("pixel-duper.log"))
        );
        assert_eq!(
            split_log_path(Path::new("scan.log")),
            (PathBuf::from("."), PathBuf::from("scan.log"))
        );
    }
}

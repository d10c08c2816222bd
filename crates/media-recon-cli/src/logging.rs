use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILE: &str = "./logs/media-recon.log";

/// Split a log file path into the directory the appender creates and the
/// file name it writes. A bare name lands in the working directory.
fn log_destination(raw: &str) -> (PathBuf, OsString) {
    let path = Path::new(raw);
    match path.file_name() {
        Some(name) => {
            let dir = match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
                _ => PathBuf::from("."),
            };
            (dir, name.to_os_string())
        }
        None => {
            let fallback = Path::new(DEFAULT_LOG_FILE);
            (PathBuf::from("./logs"), fallback.file_name().map(OsString::from).unwrap_or_default())
        }
    }
}

/// Stdout plus a plain-text log file. The returned guard flushes the file
/// writer on drop, so `main` must hold it until exit.
pub fn init_logger() -> impl Drop {
    let filter = env::var("TRACING_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter_layer = EnvFilter::new(filter);

    let log_file_path = env::var("LOG_FILE_PATH").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());
    let (dir, file_name) = log_destination(&log_file_path);

    let file_appender = tracing_appender::rolling::never(&dir, &file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .pretty()
                .with_file(false)
                .with_line_number(false)
                .without_time()
                .with_ansi(true),
        )
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_ansi(false),
        )
        .with(filter_layer)
        .init();

    info!("Logging to stdout and {}", dir.join(&file_name).display());

    guard
}

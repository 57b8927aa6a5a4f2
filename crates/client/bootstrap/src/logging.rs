//! Logging setup shared by host front-ends.
use std::path::PathBuf;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Platform-specific log directory.
///
/// - macOS: `~/Library/Caches/tabletop/logs`
/// - Linux: `~/.cache/tabletop/logs` (or `$XDG_CACHE_HOME/tabletop/logs`)
/// - Windows: `%LOCALAPPDATA%\tabletop\logs`
/// - Fallback: `/tmp/tabletop/logs`
pub fn log_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "tabletop")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("/tmp/tabletop"))
        .join("logs")
}

/// Platform-specific data directory for persisted sessions.
pub fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "tabletop")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./save_data"))
}

/// Logs to stderr and to `<log_dir>/<session_id>/host.log`.
///
/// The filter comes from `RUST_LOG`, defaulting to `info`. Keep the returned
/// guard alive for as long as file output is wanted.
pub fn setup_logging(session_id: &str) -> Result<WorkerGuard> {
    let session_log_dir = log_dir().join(session_id);
    std::fs::create_dir_all(&session_log_dir)?;

    let file_appender = tracing_appender::rolling::never(&session_log_dir, "host.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false);
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    tracing::info!("Logging initialized: session={}", session_id);
    tracing::info!("Log file: {}/host.log", session_log_dir.display());

    Ok(guard)
}

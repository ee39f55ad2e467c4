//! File-based logging setup for host applications.

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;

/// Initialize file logging and return the async guard.
///
/// The log goes straight to a file so the host's own output stays clean;
/// keep the guard alive for the life of the process so buffered lines are
/// flushed.
pub fn init_logging(log_file: &str) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::never(".", log_file);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to init logging: {e}"))?;
    tracing::info!("logging to {}", log_file);
    Ok(guard)
}

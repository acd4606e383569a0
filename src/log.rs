use crate::error::{Error, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber writing to `log_path` through a
/// non-blocking appender. The returned guard flushes buffered records on
/// drop, so callers keep it alive for the process lifetime.
///
/// Filtering takes `level` when given, otherwise the `WORKLENS_LOG`
/// environment variable, otherwise `info`. Calling this twice is fine: the
/// first subscriber stays installed and later calls still return a guard.
pub fn init_tracing(log_path: &Path, level: Option<&str>) -> Result<WorkerGuard> {
    let filter = match level {
        Some(level) => {
            EnvFilter::try_new(level).map_err(|err| Error::TracingInit(err.to_string()))?
        }
        None => EnvFilter::try_from_env("WORKLENS_LOG")
            .unwrap_or_else(|_| EnvFilter::new("info")),
    };

    if let Some(parent) = log_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    // Err here means a subscriber is already set for this process; the
    // existing one keeps working and the new appender simply stays idle.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();

    Ok(guard)
}

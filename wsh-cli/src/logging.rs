//! Log setup.
//!
//! Logs go to stderr by default. While the terminal is in raw mode stderr is
//! the user's screen, so `--log-file` sends them to a file instead.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const LOG_ENV: &str = "WSH_LOG";
const DEFAULT_FILTER: &str = "warn";

/// Install the global subscriber. Keep the returned guard alive until exit so
/// buffered file logs are flushed.
pub fn init(log_file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| anyhow::anyhow!("failed to open log file {}: {}", path.display(), e))?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);

            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(non_blocking)
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false)
                        .with_ansi(false),
                )
                .try_init();
            Ok(Some(guard))
        }
        None => {
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
                .try_init();
            Ok(None)
        }
    }
}

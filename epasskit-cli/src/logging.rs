//! Routes the library's log output into `tracing`.

use std::sync::Arc;

use epasskit_core::logger::{set_logger, LogLevel, Logger};
use tracing_subscriber::EnvFilter;

/// Forwards every record from the library to the `tracing` subscriber.
struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: String) {
        match level {
            LogLevel::Trace => tracing::trace!(target: "epasskit", "{message}"),
            LogLevel::Debug => tracing::debug!(target: "epasskit", "{message}"),
            LogLevel::Info => tracing::info!(target: "epasskit", "{message}"),
            LogLevel::Warn => tracing::warn!(target: "epasskit", "{message}"),
            LogLevel::Error => tracing::error!(target: "epasskit", "{message}"),
        }
    }
}

/// Installs a stderr subscriber filtered by `RUST_LOG` (default `warn`, or `debug` when
/// `verbose`) and bridges the library logger into it.
pub fn init(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .try_init();

    set_logger(Arc::new(TracingLogger));
}

//! Bridges the `log` facade used inside the crate to a logger supplied by the host app.

use std::sync::{Arc, OnceLock};

/// A sink for log messages produced by the scan session.
///
/// Implemented by the host app and installed once with [`set_logger`].
///
/// ```rust
/// use epasskit_core::logger::{LogLevel, Logger};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         eprintln!("[{level:?}] {message}");
///     }
/// }
/// ```
///
/// ## Kotlin
///
/// ```kotlin
/// object EPassKitLogger : Logger {
///     override fun log(level: LogLevel, message: String) {
///         Log.println(level.toAndroidPriority(), "epasskit", message)
///     }
/// }
///
/// setLogger(EPassKitLogger) // once, in Application.onCreate
/// ```
#[uniffi::export(with_foreign)]
pub trait Logger: Sync + Send {
    /// Records `message` at `level`.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity of a log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum LogLevel {
    /// Very detailed tracing output.
    Trace,
    /// Debugging information, such as chip read steps.
    Debug,
    /// Session milestones.
    Info,
    /// Recoverable problems, such as a dropped NFC link.
    Warn,
    /// Failed operations.
    Error,
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warn,
            log::Level::Info => Self::Info,
            log::Level::Debug => Self::Debug,
            log::Level::Trace => Self::Trace,
        }
    }
}

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// `log::Log` implementation forwarding to the installed [`Logger`].
struct ForeignLogger;

impl ForeignLogger {
    /// Debug and trace output from dependencies is dropped; only this crate's is forwarded.
    fn accepts(record: &log::Record) -> bool {
        let verbose = matches!(record.level(), log::Level::Debug | log::Level::Trace);
        !verbose
            || record
                .module_path()
                .is_some_and(|path| path.starts_with("epasskit"))
    }
}

impl log::Log for ForeignLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if !Self::accepts(record) {
            return;
        }
        match LOGGER_INSTANCE.get() {
            Some(logger) => logger.log(record.level().into(), record.args().to_string()),
            None => eprintln!("epasskit logger not set: {}", record.args()),
        }
    }

    fn flush(&self) {}
}

/// Installs `logger` as the destination of every log message of the crate.
///
/// Only the first call takes effect; later calls are reported and ignored.
#[uniffi::export]
pub fn set_logger(logger: Arc<dyn Logger>) {
    if LOGGER_INSTANCE.set(logger).is_err() {
        eprintln!("epasskit logger already set");
        return;
    }

    static LOGGER: ForeignLogger = ForeignLogger;
    if let Err(e) = log::set_logger(&LOGGER) {
        eprintln!("failed to install epasskit logger: {e}");
        return;
    }
    log::set_max_level(log::LevelFilter::Trace);
}

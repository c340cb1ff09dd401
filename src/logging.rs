//! Log capability passed explicitly to every component that traces.
//!
//! Components never reach for a process-wide logger of their own. They
//! receive a [`Logger`] at construction and report through it. The default
//! logger forwards to the `log` facade, so a host that already installed
//! `env_logger` (or any other `log` backend) sees the traces with no extra
//! wiring; hosts with their own tracing implement [`LogHandler`].

use log::Level;
use std::fmt;
use std::sync::Arc;

/// Log target used by the default handler.
pub const LOG_TARGET: &str = "petalsonic_io";

/// Sink for the traces emitted by this crate.
pub trait LogHandler: Send + Sync {
    fn log(&self, level: Level, message: &str);
}

/// Forwards to the `log` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCrateHandler;

impl LogHandler for LogCrateHandler {
    fn log(&self, level: Level, message: &str) {
        log::log!(target: LOG_TARGET, level, "{}", message);
    }
}

/// Discards every trace.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogHandler;

impl LogHandler for NullLogHandler {
    fn log(&self, _level: Level, _message: &str) {}
}

/// Cheap, clonable reference to a [`LogHandler`].
#[derive(Clone)]
pub struct Logger {
    handler: Arc<dyn LogHandler>,
}

impl Logger {
    pub fn new(handler: Arc<dyn LogHandler>) -> Self {
        Self { handler }
    }

    pub fn silent() -> Self {
        Self::new(Arc::new(NullLogHandler))
    }

    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        match args.as_str() {
            Some(message) => self.handler.log(level, message),
            None => self.handler.log(level, &args.to_string()),
        }
    }

    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(Arc::new(LogCrateHandler))
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every trace so tests can assert on them.
    #[derive(Default)]
    pub(crate) struct RecordingHandler {
        pub(crate) records: Mutex<Vec<(Level, String)>>,
    }

    impl LogHandler for RecordingHandler {
        fn log(&self, level: Level, message: &str) {
            self.records
                .lock()
                .unwrap()
                .push((level, message.to_string()));
        }
    }

    #[test]
    fn test_logger_routes_to_handler() {
        let handler = Arc::new(RecordingHandler::default());
        let logger = Logger::new(handler.clone());

        logger.error(format_args!("failed to open {}", "a.wav"));
        logger.debug(format_args!("plain"));

        let records = handler.records.lock().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], (Level::Error, "failed to open a.wav".to_string()));
        assert_eq!(records[1], (Level::Debug, "plain".to_string()));
    }

    #[test]
    fn test_default_logger_does_not_panic() {
        let _ = env_logger::builder().is_test(true).try_init();
        Logger::default().info(format_args!("hello {}", 1));
        Logger::silent().error(format_args!("dropped"));
    }
}

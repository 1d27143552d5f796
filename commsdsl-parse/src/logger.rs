//! Diagnostics reporting.
//!
//! Every message produced while parsing, validating or preparing a schema is
//! routed through a [`Logger`]. By default messages are forwarded to
//! `tracing`; callers may inject their own report callback instead.

use serde::Deserialize;
use std::cell::Cell;
use std::fmt;

/// Severity of a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorLevel {
    /// Debug output.
    Debug,
    /// Informational message.
    #[default]
    Info,
    /// Warning, does not fail the current phase on its own.
    Warning,
    /// Error, fails the current phase.
    Error,
}

impl ErrorLevel {
    /// Returns the lowercase name of the level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ErrorLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback receiving every reported diagnostic.
pub type ErrorReportFn = Box<dyn Fn(ErrorLevel, &str)>;

/// Diagnostics sink with severity filtering and counters.
pub struct Logger {
    callback: Option<ErrorReportFn>,
    min_level: ErrorLevel,
    warnings: Cell<usize>,
    errors: Cell<usize>,
}

impl Logger {
    /// Creates a logger forwarding to `tracing`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            callback: None,
            min_level: ErrorLevel::Info,
            warnings: Cell::new(0),
            errors: Cell::new(0),
        }
    }

    /// Replaces the report callback.
    pub fn set_callback<F>(&mut self, callback: F)
    where
        F: Fn(ErrorLevel, &str) + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    /// Sets the minimal level of messages passed to the sink.
    pub fn set_min_level(&mut self, level: ErrorLevel) {
        self.min_level = level;
    }

    /// Returns the minimal reported level.
    #[must_use]
    pub const fn min_level(&self) -> ErrorLevel {
        self.min_level
    }

    /// Reports a message. Warnings and errors are counted even when filtered out.
    pub fn log(&self, level: ErrorLevel, msg: &str) {
        match level {
            ErrorLevel::Warning => self.warnings.set(self.warnings.get() + 1),
            ErrorLevel::Error => self.errors.set(self.errors.get() + 1),
            _ => {}
        }

        if level < self.min_level {
            return;
        }

        if let Some(callback) = &self.callback {
            callback(level, msg);
            return;
        }

        match level {
            ErrorLevel::Debug => tracing::debug!("{}", msg),
            ErrorLevel::Info => tracing::info!("{}", msg),
            ErrorLevel::Warning => tracing::warn!("{}", msg),
            ErrorLevel::Error => tracing::error!("{}", msg),
        }
    }

    /// Reports a debug message.
    pub fn debug(&self, msg: &str) {
        self.log(ErrorLevel::Debug, msg);
    }

    /// Reports an informational message.
    pub fn info(&self, msg: &str) {
        self.log(ErrorLevel::Info, msg);
    }

    /// Reports a warning.
    pub fn warning(&self, msg: &str) {
        self.log(ErrorLevel::Warning, msg);
    }

    /// Reports an error.
    pub fn error(&self, msg: &str) {
        self.log(ErrorLevel::Error, msg);
    }

    /// Returns true if at least one warning was reported.
    #[must_use]
    pub fn had_warning(&self) -> bool {
        self.warnings.get() > 0
    }

    /// Returns the number of reported warnings.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.warnings.get()
    }

    /// Returns the number of reported errors.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors.get()
    }

    /// Clears the warning and error counters.
    pub fn reset_counters(&self) {
        self.warnings.set(0);
        self.errors.set(0);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("custom_callback", &self.callback.is_some())
            .field("min_level", &self.min_level)
            .field("warnings", &self.warnings.get())
            .field("errors", &self.errors.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_filtering_and_counters() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut logger = Logger::new();
        logger.set_callback(move |level, msg| sink.borrow_mut().push((level, msg.to_string())));
        logger.set_min_level(ErrorLevel::Error);

        logger.debug("dbg");
        logger.warning("careful");
        logger.error("broken");

        assert!(logger.had_warning());
        assert_eq!(logger.error_count(), 1);
        assert_eq!(*seen.borrow(), vec![(ErrorLevel::Error, "broken".to_string())]);

        logger.reset_counters();
        assert!(!logger.had_warning());
    }

    #[test]
    fn test_level_order() {
        assert!(ErrorLevel::Debug < ErrorLevel::Info);
        assert!(ErrorLevel::Warning < ErrorLevel::Error);
        assert_eq!(ErrorLevel::Warning.to_string(), "warning");
    }
}

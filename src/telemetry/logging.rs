//! Logging
//!
//! Structured logging for token lifecycle events. Secrets never reach a
//! logger; contexts carry only names, grant types and URLs.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    Info,
    /// Warn level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Log context.
#[derive(Debug, Clone, Default)]
pub struct LogContext {
    /// Provider name.
    pub provider: Option<String>,
    /// Operation name.
    pub operation: Option<String>,
    /// Grant type in use.
    pub grant_type: Option<String>,
    /// Request URL.
    pub url: Option<String>,
    /// Additional context.
    pub extra: HashMap<String, String>,
}

impl LogContext {
    /// Create new log context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set provider.
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Set operation.
    pub fn operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Set grant type.
    pub fn grant_type(mut self, grant_type: impl Into<String>) -> Self {
        self.grant_type = Some(grant_type.into());
        self
    }

    /// Set URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Add extra context.
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Logger interface.
pub trait Logger: Send + Sync {
    /// Log at a level.
    fn log(&self, level: LogLevel, message: &str, context: &LogContext);

    /// Check if a log level is enabled.
    fn is_enabled(&self, level: LogLevel) -> bool;

    fn trace(&self, message: &str, context: &LogContext) {
        self.log(LogLevel::Trace, message, context);
    }

    fn debug(&self, message: &str, context: &LogContext) {
        self.log(LogLevel::Debug, message, context);
    }

    fn info(&self, message: &str, context: &LogContext) {
        self.log(LogLevel::Info, message, context);
    }

    fn warn(&self, message: &str, context: &LogContext) {
        self.log(LogLevel::Warn, message, context);
    }

    fn error(&self, message: &str, context: &LogContext) {
        self.log(LogLevel::Error, message, context);
    }
}

/// No-op logger implementation.
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn log(&self, _level: LogLevel, _message: &str, _context: &LogContext) {}

    fn is_enabled(&self, _level: LogLevel) -> bool {
        false
    }
}

/// Logger that emits `tracing` events.
pub struct TracingLogger {
    min_level: LogLevel,
}

impl TracingLogger {
    /// Create new tracing logger (debug and above).
    pub fn new() -> Self {
        Self::with_level(LogLevel::Debug)
    }

    /// Create tracing logger with minimum level.
    pub fn with_level(min_level: LogLevel) -> Self {
        Self { min_level }
    }
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str, context: &LogContext) {
        if !self.is_enabled(level) {
            return;
        }

        let provider = context.provider.as_deref().unwrap_or("");
        let operation = context.operation.as_deref().unwrap_or("");
        let grant_type = context.grant_type.as_deref().unwrap_or("");
        let url = context.url.as_deref().unwrap_or("");

        macro_rules! emit {
            ($macro:ident) => {
                tracing::$macro!(
                    provider,
                    operation,
                    grant_type,
                    url,
                    extra = ?context.extra,
                    "{}",
                    message
                )
            };
        }

        match level {
            LogLevel::Trace => emit!(trace),
            LogLevel::Debug => emit!(debug),
            LogLevel::Info => emit!(info),
            LogLevel::Warn => emit!(warn),
            LogLevel::Error => emit!(error),
        }
    }

    fn is_enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }
}

/// Log entry for in-memory storage.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Log level.
    pub level: LogLevel,
    /// Log message.
    pub message: String,
    /// Log context.
    pub context: LogContext,
    /// Timestamp in milliseconds.
    pub timestamp: u64,
}

/// In-memory logger for testing.
pub struct InMemoryLogger {
    entries: Mutex<Vec<LogEntry>>,
    min_level: LogLevel,
}

impl InMemoryLogger {
    /// Create new in-memory logger.
    pub fn new() -> Self {
        Self::with_level(LogLevel::Trace)
    }

    /// Create in-memory logger with minimum level.
    pub fn with_level(min_level: LogLevel) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            min_level,
        }
    }

    /// Get all log entries.
    pub fn get_entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// Get entries by level.
    pub fn get_entries_by_level(&self, level: LogLevel) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.level == level)
            .cloned()
            .collect()
    }

    /// Messages of all entries, in order.
    pub fn messages(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.message.clone())
            .collect()
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

impl Default for InMemoryLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger for InMemoryLogger {
    fn log(&self, level: LogLevel, message: &str, context: &LogContext) {
        if level >= self.min_level {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64;

            self.entries.lock().unwrap().push(LogEntry {
                level,
                message: message.to_string(),
                context: context.clone(),
                timestamp: now,
            });
        }
    }

    fn is_enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Error > LogLevel::Warn);
        assert!(LogLevel::Warn > LogLevel::Info);
        assert!(LogLevel::Info > LogLevel::Debug);
        assert!(LogLevel::Debug > LogLevel::Trace);
    }

    #[test]
    fn test_in_memory_logger() {
        let logger = InMemoryLogger::new();
        let context = LogContext::new()
            .provider("platformsh")
            .operation("acquire_token");

        logger.info("Token acquired", &context);
        logger.debug("Debug info", &context);
        logger.error("Error occurred", &context);

        assert_eq!(logger.get_entries().len(), 3);
        assert_eq!(logger.get_entries_by_level(LogLevel::Error).len(), 1);
        assert_eq!(logger.messages()[0], "Token acquired");
    }

    #[test]
    fn test_log_context_builder() {
        let context = LogContext::new()
            .provider("platformsh")
            .operation("refresh")
            .grant_type("refresh_token")
            .url("https://api.example.com/projects")
            .extra("status", "401");

        assert_eq!(context.grant_type, Some("refresh_token".to_string()));
        assert_eq!(context.extra.get("status"), Some(&"401".to_string()));
    }

    #[test]
    fn test_min_level_filtering() {
        let logger = InMemoryLogger::with_level(LogLevel::Warn);
        let context = LogContext::new();

        logger.trace("trace", &context);
        logger.debug("debug", &context);
        logger.info("info", &context);
        logger.warn("warn", &context);
        logger.error("error", &context);

        assert_eq!(logger.get_entries().len(), 2);
    }

    #[test]
    fn test_tracing_logger_filters() {
        let logger = TracingLogger::with_level(LogLevel::Info);
        assert!(!logger.is_enabled(LogLevel::Debug));
        assert!(logger.is_enabled(LogLevel::Warn));
        logger.info("emitted without a subscriber", &LogContext::new());
    }
}

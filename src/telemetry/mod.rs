//! Telemetry
//!
//! Observability components for the middleware.
//!
//! - **Logging**: structured logging with context, backed by `tracing` or
//!   recorded in memory for tests

pub mod logging;

pub use logging::{
    InMemoryLogger, LogContext, LogEntry, LogLevel, Logger, NoOpLogger, TracingLogger,
};

//! Logging capability for the dispatch path
//!
//! The dispatch loop and consumers log through an injected [`Logger`] rather
//! than straight to the global subscriber, so a test can capture exactly what
//! a component reported.

use crate::events::EventType;
use parking_lot::Mutex;
use tracing::Level;

/// Sink for diagnostic records emitted while dispatching events
pub trait Logger: Send + Sync {
    /// Record a message, optionally tagged with the event type it concerns
    fn log(&self, level: Level, event_type: Option<EventType>, message: &str);

    /// Record a warning tagged with an event type
    fn warn(&self, event_type: EventType, message: &str) {
        self.log(Level::WARN, Some(event_type), message);
    }

    /// Record an error tagged with an event type
    fn error(&self, event_type: EventType, message: &str) {
        self.log(Level::ERROR, Some(event_type), message);
    }
}

/// Logger that forwards to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: Level, event_type: Option<EventType>, message: &str) {
        let code = event_type.map(EventType::code);
        match level {
            Level::ERROR => tracing::error!(event_type = code, "{}", message),
            Level::WARN => tracing::warn!(event_type = code, "{}", message),
            Level::INFO => tracing::info!(event_type = code, "{}", message),
            Level::DEBUG => tracing::debug!(event_type = code, "{}", message),
            _ => tracing::trace!(event_type = code, "{}", message),
        }
    }
}

/// A captured log record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Severity.
    pub level: Level,
    /// Event type tag, if any.
    pub event_type: Option<EventType>,
    /// Message text.
    pub message: String,
}

/// Logger that keeps every record in memory
#[derive(Debug, Default)]
pub struct MemoryLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLogger {
    /// Create an empty logger
    pub fn new() -> Self {
        Self::default()
    }

    /// All records captured so far
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Records at the given level
    pub fn records_at(&self, level: Level) -> Vec<LogRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.level == level)
            .cloned()
            .collect()
    }
}

impl Logger for MemoryLogger {
    fn log(&self, level: Level, event_type: Option<EventType>, message: &str) {
        self.records.lock().push(LogRecord {
            level,
            event_type,
            message: message.to_string(),
        });
    }
}

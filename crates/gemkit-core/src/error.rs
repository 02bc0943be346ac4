//! Error handling for GemKit
//!
//! Provides error types for all layers of the event core:
//! - Hardware errors (resource acquire/release)
//! - Signal errors (readiness that cannot be turned into a payload)
//! - Dispatch errors (handler lifecycle and wait loop)
//!
//! All error types use `thiserror` for ergonomic error handling.

use crate::events::EventType;
use thiserror::Error;

/// Hardware resource error type
///
/// Raised while acquiring or releasing the OS resource behind an event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HardwareError {
    /// The resource could not be acquired
    #[error("Hardware unavailable for {event_type}: {reason}")]
    Unavailable {
        /// The event type whose resource failed.
        event_type: EventType,
        /// What went wrong.
        reason: String,
    },

    /// The resource could not be fully released
    #[error("Failed to release hardware for {event_type}: {reason}")]
    ReleaseFailed {
        /// The event type whose resource failed to release.
        event_type: EventType,
        /// What went wrong.
        reason: String,
    },
}

impl HardwareError {
    /// Shorthand for an [`HardwareError::Unavailable`] error
    pub fn unavailable(event_type: EventType, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            event_type,
            reason: reason.into(),
        }
    }

    /// The event type this error is tagged with
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Unavailable { event_type, .. } | Self::ReleaseFailed { event_type, .. } => {
                *event_type
            }
        }
    }
}

/// Signal error type
///
/// Represents readiness notifications that could not be turned into a payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignalError {
    /// The armed resource produced something unreadable or unrecognized
    #[error("Unexpected signal on {event_type}: {reason}")]
    Unexpected {
        /// The event type that fired.
        event_type: EventType,
        /// Why the signal could not be decoded.
        reason: String,
    },

    /// The resource is permanently gone (EOF, hang-up, descriptor error)
    #[error("Resource for {event_type} is gone")]
    ResourceGone {
        /// The event type whose resource vanished.
        event_type: EventType,
    },

    /// A consumer received an event type it does not handle
    #[error("Unexpected event type: {}", .event_type.code())]
    UnexpectedEvent {
        /// The unrecognized event type.
        event_type: EventType,
    },
}

impl SignalError {
    /// Shorthand for an [`SignalError::Unexpected`] error
    pub fn unexpected(event_type: EventType, reason: impl Into<String>) -> Self {
        Self::Unexpected {
            event_type,
            reason: reason.into(),
        }
    }
}

/// Dispatch error type
///
/// Errors surfaced by the event handler to whoever started it.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// One or more required resources failed to arm
    #[error("Startup failed: {}", join_errors(.0))]
    StartupFailed(Vec<HardwareError>),

    /// A required resource became permanently unavailable while running
    #[error("Required resource for {event_type} was lost")]
    ResourceLost {
        /// The event type whose resource was lost.
        event_type: EventType,
    },

    /// Operation not allowed in the handler's current state
    #[error("Cannot {operation} while handler is {current}")]
    InvalidState {
        /// The current state name.
        current: String,
        /// The rejected operation.
        operation: String,
    },

    /// The wait primitive itself failed
    #[error("Poll error: {0}")]
    Poll(#[from] std::io::Error),
}

fn join_errors(errors: &[HardwareError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Main error type for GemKit
///
/// A unified error type that can represent any error from all layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Hardware error
    #[error(transparent)]
    Hardware(#[from] HardwareError),

    /// Signal error
    #[error(transparent)]
    Signal(#[from] SignalError),

    /// Dispatch error
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a startup failure
    pub fn is_startup_failure(&self) -> bool {
        matches!(self, Error::Dispatch(DispatchError::StartupFailed(_)))
    }

    /// Check if this is a hardware error
    pub fn is_hardware_error(&self) -> bool {
        matches!(self, Error::Hardware(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

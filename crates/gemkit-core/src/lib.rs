//! # GemKit Core
//!
//! Core types, traits, and utilities for GemKit.
//! Provides the event type table, payloads, the printer status model,
//! the subscription registry, and the logging capability used on the
//! dispatch path.

pub mod error;
pub mod events;
pub mod logger;
pub mod status;
pub mod subscription;

pub use error::{DispatchError, Error, HardwareError, Result, SignalError};
pub use events::{EventType, Payload};
pub use logger::{LogRecord, Logger, MemoryLogger, TracingLogger};
pub use status::{PrinterState, PrinterStatus, Progress, StateChange, UiSubState};
pub use subscription::{CallbackConsumer, Subscriber, SubscriptionRegistry};

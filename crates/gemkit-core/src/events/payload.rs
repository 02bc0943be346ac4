//! Payloads delivered to subscribers.

use crate::status::PrinterStatus;
use std::fmt;

/// Typed data produced when an event fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// A GPIO interrupt line changed.
    Interrupt {
        /// GPIO pin number.
        pin: u32,
        /// Logic level read after the edge (0 or 1).
        level: u8,
    },
    /// The print engine reported a new status.
    PrinterStatus(PrinterStatus),
    /// A line of text from stdin or a UI command stream.
    Input(String),
    /// A timer expired.
    TimerExpired {
        /// Number of intervals elapsed since the previous expiry.
        expirations: u64,
    },
}

impl Payload {
    /// The printer status, if this is a status payload
    pub fn printer_status(&self) -> Option<&PrinterStatus> {
        match self {
            Payload::PrinterStatus(status) => Some(status),
            _ => None,
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Interrupt { pin, level } => write!(f, "GPIO {} -> {}", pin, level),
            Payload::PrinterStatus(status) => write!(f, "Status: {}", status.state),
            Payload::Input(line) => write!(f, "Input: {}", line),
            Payload::TimerExpired { expirations } => {
                write!(f, "Timer expired ({}x)", expirations)
            }
        }
    }
}

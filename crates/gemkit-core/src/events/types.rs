//! Event type identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of monitorable event sources
///
/// Ordering follows the numeric code and is the scan order used when
/// several sources become ready in the same wakeup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum EventType {
    /// Door open/close sensor interrupt.
    DoorSensor = 1,
    /// Front panel button interrupt.
    ButtonPress = 2,
    /// Motor controller interrupt (command complete or fault).
    MotorInterrupt = 3,
    /// Tray rotation sensor interrupt.
    RotationSensor = 4,
    /// Printer status update from the print engine.
    PrinterStatus = 5,
    /// Terminal input on stdin.
    StdinInput = 6,
    /// Command line from a UI process.
    UiCommand = 7,
    /// Delay timer expiry.
    DelayTimer = 8,
    /// Motor watchdog timer expiry.
    MotorTimeout = 9,
}

impl EventType {
    /// Every event type, in scan order
    pub const ALL: [EventType; 9] = [
        EventType::DoorSensor,
        EventType::ButtonPress,
        EventType::MotorInterrupt,
        EventType::RotationSensor,
        EventType::PrinterStatus,
        EventType::StdinInput,
        EventType::UiCommand,
        EventType::DelayTimer,
        EventType::MotorTimeout,
    ];

    /// Stable numeric code used to tag log records
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Look up an event type by its numeric code
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|et| et.code() == code)
    }

    /// Whether this event is driven by a GPIO interrupt line
    pub fn is_interrupt(self) -> bool {
        matches!(
            self,
            EventType::DoorSensor
                | EventType::ButtonPress
                | EventType::MotorInterrupt
                | EventType::RotationSensor
        )
    }

    /// Whether this event is driven by a timer
    pub fn is_timer(self) -> bool {
        matches!(self, EventType::DelayTimer | EventType::MotorTimeout)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventType::DoorSensor => "DoorSensor",
            EventType::ButtonPress => "ButtonPress",
            EventType::MotorInterrupt => "MotorInterrupt",
            EventType::RotationSensor => "RotationSensor",
            EventType::PrinterStatus => "PrinterStatus",
            EventType::StdinInput => "StdinInput",
            EventType::UiCommand => "UiCommand",
            EventType::DelayTimer => "DelayTimer",
            EventType::MotorTimeout => "MotorTimeout",
        };
        f.write_str(name)
    }
}

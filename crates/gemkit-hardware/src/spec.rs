//! Resource descriptors
//!
//! Describes, per event type, which physical resource backs it and whether
//! startup may proceed without it. This is plain configuration data; the
//! [`Board`](crate::Board) turns it into acquired handles.

use gemkit_core::EventType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// GPIO edge that raises an interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    /// Interrupts disabled.
    None,
    /// Low to high transition.
    #[default]
    Rising,
    /// High to low transition.
    Falling,
    /// Either transition.
    Both,
}

impl Edge {
    /// Value written to the sysfs `edge` attribute
    pub fn as_sysfs(self) -> &'static str {
        match self {
            Edge::None => "none",
            Edge::Rising => "rising",
            Edge::Falling => "falling",
            Edge::Both => "both",
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sysfs())
    }
}

/// What backs an event type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceSpec {
    /// Sysfs GPIO input configured for edge interrupts.
    Gpio {
        /// Kernel GPIO number.
        pin: u32,
        /// Edge that raises the interrupt.
        #[serde(default)]
        edge: Edge,
        /// Invert the logic level.
        #[serde(default)]
        active_low: bool,
    },
    /// The process's standard input.
    Stdin,
    /// Timer owned by the dispatch loop.
    Timer {
        /// Interval until expiry, in milliseconds.
        interval_ms: u64,
        /// Re-arm after each expiry.
        #[serde(default)]
        periodic: bool,
    },
    /// A descriptor handed to the event handler at runtime.
    External,
}

impl fmt::Display for ResourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceSpec::Gpio { pin, edge, .. } => write!(f, "GPIO {} ({})", pin, edge),
            ResourceSpec::Stdin => write!(f, "stdin"),
            ResourceSpec::Timer {
                interval_ms,
                periodic,
            } => write!(
                f,
                "timer {}ms{}",
                interval_ms,
                if *periodic { " periodic" } else { "" }
            ),
            ResourceSpec::External => write!(f, "external descriptor"),
        }
    }
}

/// Whether startup fails when a resource cannot be acquired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    /// Acquire failure aborts startup.
    #[default]
    Required,
    /// Acquire failure is logged and the event stays unconfigured.
    Optional,
}

impl Requirement {
    /// Whether this is [`Requirement::Required`]
    pub fn is_required(self) -> bool {
        self == Requirement::Required
    }
}

impl From<bool> for Requirement {
    fn from(required: bool) -> Self {
        if required {
            Requirement::Required
        } else {
            Requirement::Optional
        }
    }
}

/// Timer parameters handed to the dispatch loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSpec {
    /// Time until (each) expiry.
    pub interval: Duration,
    /// Re-arm after each expiry.
    pub periodic: bool,
}

/// One row of the event-to-resource table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBinding {
    /// Event type served by this resource.
    pub event_type: EventType,
    /// Startup fails without this resource.
    #[serde(default = "default_required")]
    pub required: bool,
    /// The backing resource.
    pub source: ResourceSpec,
}

fn default_required() -> bool {
    true
}

impl ResourceBinding {
    /// Create a binding
    pub fn new(event_type: EventType, source: ResourceSpec, requirement: Requirement) -> Self {
        Self {
            event_type,
            required: requirement.is_required(),
            source,
        }
    }

    /// Requirement level of this binding
    pub fn requirement(&self) -> Requirement {
        Requirement::from(self.required)
    }
}

/// Door sensor GPIO on the reference board.
pub const DOOR_SENSOR_PIN: u32 = 47;
/// Front panel button GPIO on the reference board.
pub const BUTTON_PIN: u32 = 30;
/// Motor controller interrupt GPIO on the reference board.
pub const MOTOR_INTERRUPT_PIN: u32 = 60;
/// Tray rotation sensor GPIO on the reference board.
pub const ROTATION_SENSOR_PIN: u32 = 51;

/// The reference board's event table
pub fn default_bindings() -> Vec<ResourceBinding> {
    use Requirement::{Optional, Required};

    vec![
        ResourceBinding::new(
            EventType::DoorSensor,
            ResourceSpec::Gpio {
                pin: DOOR_SENSOR_PIN,
                edge: Edge::Both,
                active_low: false,
            },
            Required,
        ),
        ResourceBinding::new(
            EventType::ButtonPress,
            ResourceSpec::Gpio {
                pin: BUTTON_PIN,
                edge: Edge::Falling,
                active_low: true,
            },
            Required,
        ),
        ResourceBinding::new(
            EventType::MotorInterrupt,
            ResourceSpec::Gpio {
                pin: MOTOR_INTERRUPT_PIN,
                edge: Edge::Rising,
                active_low: false,
            },
            Required,
        ),
        // not fitted on early board revisions
        ResourceBinding::new(
            EventType::RotationSensor,
            ResourceSpec::Gpio {
                pin: ROTATION_SENSOR_PIN,
                edge: Edge::Rising,
                active_low: false,
            },
            Optional,
        ),
        ResourceBinding::new(EventType::PrinterStatus, ResourceSpec::External, Required),
        ResourceBinding::new(EventType::StdinInput, ResourceSpec::Stdin, Optional),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_sysfs_values() {
        assert_eq!(Edge::Rising.as_sysfs(), "rising");
        assert_eq!(Edge::Both.to_string(), "both");
        assert_eq!(Edge::default(), Edge::Rising);
    }

    #[test]
    fn test_requirement_from_bool() {
        assert!(Requirement::from(true).is_required());
        assert!(!Requirement::from(false).is_required());
    }

    #[test]
    fn test_default_bindings_unique() {
        let bindings = default_bindings();
        let mut types: Vec<EventType> = bindings.iter().map(|b| b.event_type).collect();
        types.sort();
        types.dedup();
        assert_eq!(types.len(), bindings.len());
    }

    #[test]
    fn test_rotation_sensor_is_optional() {
        let rotation = default_bindings()
            .into_iter()
            .find(|b| b.event_type == EventType::RotationSensor)
            .unwrap();
        assert_eq!(rotation.requirement(), Requirement::Optional);
    }
}

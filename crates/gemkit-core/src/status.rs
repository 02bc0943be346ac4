//! Printer status model
//!
//! The print engine publishes a [`PrinterStatus`] whenever its state machine
//! enters or leaves a state. Statuses travel over the status channel as one
//! JSON object per line.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level printer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrinterState {
    /// Power-on, before initialization.
    PrinterOn,
    /// Hardware initialization in progress.
    Initializing,
    /// Door is closed.
    DoorClosed,
    /// Door is open.
    DoorOpen,
    /// Build head homing.
    Homing,
    /// Build head at home position.
    Home,
    /// Idle and ready for a print.
    Idle,
    /// Preparing a print job.
    PrintSetup,
    /// Moving to the first layer position.
    MovingToStartPosition,
    /// Print in progress.
    Printing,
    /// Exposing a layer.
    Exposing,
    /// Separating a layer from the tray.
    Separating,
    /// Print paused.
    Paused,
    /// Unrecoverable printer error.
    Error,
}

impl fmt::Display for PrinterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PrinterOn => "PrinterOn",
            Self::Initializing => "Initializing",
            Self::DoorClosed => "DoorClosed",
            Self::DoorOpen => "DoorOpen",
            Self::Homing => "Homing",
            Self::Home => "Home",
            Self::Idle => "Idle",
            Self::PrintSetup => "PrintSetup",
            Self::MovingToStartPosition => "MovingToStartPosition",
            Self::Printing => "Printing",
            Self::Exposing => "Exposing",
            Self::Separating => "Separating",
            Self::Paused => "Paused",
            Self::Error => "Error",
        };
        f.write_str(name)
    }
}

/// Finer-grained state shown by user interfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UiSubState {
    /// Print data download in progress.
    Downloading,
    /// Print data downloaded.
    Downloaded,
    /// No print data loaded.
    NoPrintData,
    /// Print data failed to load.
    PrintDataLoadFailed,
    /// Print data loaded.
    PrintDataLoaded,
    /// Leaving the door-open state.
    ExitingDoorOpen,
    /// Pause requested, finishing the current layer.
    AboutToPause,
    /// Print was canceled.
    PrintCanceled,
    /// Print finished.
    PrintCompleted,
}

impl fmt::Display for UiSubState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Downloading => "Downloading",
            Self::Downloaded => "Downloaded",
            Self::NoPrintData => "NoPrintData",
            Self::PrintDataLoadFailed => "PrintDataLoadFailed",
            Self::PrintDataLoaded => "PrintDataLoaded",
            Self::ExitingDoorOpen => "ExitingDoorOpen",
            Self::AboutToPause => "AboutToPause",
            Self::PrintCanceled => "PrintCanceled",
            Self::PrintCompleted => "PrintCompleted",
        };
        f.write_str(name)
    }
}

/// Whether the status marks entering a state, leaving it, or neither
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StateChange {
    /// Steady state report.
    #[default]
    NoChange,
    /// The state is being entered.
    Entering,
    /// The state is being left.
    Leaving,
}

/// Print progress, present only while a print is active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Layer currently being printed (1-based).
    pub current_layer: u32,
    /// Total layers in the job.
    pub num_layers: u32,
    /// Estimated time left, in seconds.
    pub estimated_seconds_remaining: u32,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}, {}s remaining",
            self.current_layer, self.num_layers, self.estimated_seconds_remaining
        )
    }
}

/// Snapshot of the printer state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterStatus {
    /// Current state.
    pub state: PrinterState,
    /// Optional UI sub-state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_state: Option<UiSubState>,
    /// Transition marker.
    #[serde(default)]
    pub change: StateChange,
    /// Current layer; zero when not printing.
    #[serde(default)]
    pub current_layer: u32,
    /// Total layers in the job.
    #[serde(default)]
    pub num_layers: u32,
    /// Estimated seconds remaining in the job.
    #[serde(default)]
    pub estimated_seconds_remaining: u32,
}

impl PrinterStatus {
    /// Create a steady-state status with no progress
    pub fn new(state: PrinterState) -> Self {
        Self {
            state,
            sub_state: None,
            change: StateChange::NoChange,
            current_layer: 0,
            num_layers: 0,
            estimated_seconds_remaining: 0,
        }
    }

    /// Set the transition marker
    pub fn with_change(mut self, change: StateChange) -> Self {
        self.change = change;
        self
    }

    /// Set the UI sub-state
    pub fn with_sub_state(mut self, sub_state: UiSubState) -> Self {
        self.sub_state = Some(sub_state);
        self
    }

    /// Set the progress fields
    pub fn with_progress(
        mut self,
        current_layer: u32,
        num_layers: u32,
        estimated_seconds_remaining: u32,
    ) -> Self {
        self.current_layer = current_layer;
        self.num_layers = num_layers;
        self.estimated_seconds_remaining = estimated_seconds_remaining;
        self
    }

    /// Whether a print is active
    pub fn is_printing(&self) -> bool {
        self.current_layer != 0
    }

    /// Progress fields, only when a print is active
    pub fn progress(&self) -> Option<Progress> {
        self.is_printing().then_some(Progress {
            current_layer: self.current_layer,
            num_layers: self.num_layers,
            estimated_seconds_remaining: self.estimated_seconds_remaining,
        })
    }

    /// Encode as a single newline-terminated JSON line
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Decode one line produced by [`PrinterStatus::to_line`]
    pub fn from_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_only_while_printing() {
        let idle = PrinterStatus::new(PrinterState::Idle).with_progress(0, 10, 42);
        assert!(!idle.is_printing());
        assert_eq!(idle.progress(), None);

        let printing = PrinterStatus::new(PrinterState::Printing).with_progress(3, 10, 42);
        let progress = printing.progress().expect("printing has progress");
        assert_eq!(progress.to_string(), "3/10, 42s remaining");
    }

    #[test]
    fn test_line_encoding() {
        let status = PrinterStatus::new(PrinterState::Printing)
            .with_change(StateChange::Entering)
            .with_progress(1, 5, 120);
        let line = status.to_line().unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
        assert_eq!(PrinterStatus::from_line(&line).unwrap(), status);
    }

    #[test]
    fn test_missing_fields_default() {
        let status = PrinterStatus::from_line(r#"{"state":"Home"}"#).unwrap();
        assert_eq!(status, PrinterStatus::new(PrinterState::Home));
    }

    #[test]
    fn test_unknown_state_rejected() {
        assert!(PrinterStatus::from_line(r#"{"state":"Melting"}"#).is_err());
    }
}

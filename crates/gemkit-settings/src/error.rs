//! Error types for the settings crate.
//!
//! Loading and saving report [`SettingsError`]; semantic problems found by
//! validation are [`ConfigError`]s wrapped inside it.

use gemkit_core::EventType;
use std::io;
use thiserror::Error;

/// Errors that can occur while loading or saving configuration.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// I/O error during file operations.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error.
    #[error("Invalid TOML config: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("Failed to serialize config: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    /// The configuration failed validation.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl SettingsError {
    pub(crate) fn io(path: &std::path::Path, source: io::Error) -> Self {
        SettingsError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Errors related to configuration validation.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration file format is not supported.
    #[error("Unsupported config format: {0} (expected .toml or .json)")]
    UnsupportedFormat(String),

    /// An event type is bound more than once.
    #[error("Event type {0} is bound more than once")]
    DuplicateEvent(EventType),

    /// Two events claim the same GPIO pin.
    #[error("GPIO pin {pin} is used by both {first} and {second}")]
    DuplicatePin {
        pin: u32,
        first: EventType,
        second: EventType,
    },

    /// A configuration value is out of valid range.
    #[error("Value out of range for '{key}': {value}")]
    ValueOutOfRange { key: String, value: String },

    /// The platform has no per-user configuration directory.
    #[error("No configuration directory on this platform")]
    NoConfigDirectory,
}

/// Result type alias for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;

/// Result type alias for validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::DuplicatePin {
            pin: 47,
            first: EventType::DoorSensor,
            second: EventType::ButtonPress,
        };
        assert_eq!(
            err.to_string(),
            "GPIO pin 47 is used by both DoorSensor and ButtonPress"
        );

        let err = ConfigError::UnsupportedFormat("yaml".to_string());
        assert_eq!(
            err.to_string(),
            "Unsupported config format: yaml (expected .toml or .json)"
        );
    }

    #[test]
    fn test_error_conversion() {
        let config_err = ConfigError::DuplicateEvent(EventType::StdinInput);
        let settings_err: SettingsError = config_err.into();
        assert!(matches!(settings_err, SettingsError::Config(_)));

        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let settings_err = SettingsError::io(std::path::Path::new("/etc/gemkit.toml"), io_err);
        assert_eq!(
            settings_err.to_string(),
            "I/O error on /etc/gemkit.toml: file not found"
        );
    }
}

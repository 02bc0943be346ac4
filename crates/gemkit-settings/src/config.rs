//! Configuration management
//!
//! The configuration file describes which hardware backs each event type,
//! where the sysfs GPIO tree lives, and how the dispatch loop and logging
//! are tuned. Files are TOML or JSON, chosen by extension:
//!
//! ```toml
//! [gpio]
//! sysfs_root = "/sys/class/gpio"
//!
//! [logging]
//! level = "info"
//!
//! [handler]
//! events_capacity = 64
//!
//! [[events]]
//! event_type = "door_sensor"
//! required = true
//!
//! [events.source]
//! kind = "gpio"
//! pin = 47
//! edge = "both"
//! ```

use crate::error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
use gemkit_core::EventType;
use gemkit_hardware::{
    default_bindings, Board, ResourceBinding, ResourceSpec, SysfsGpio, DEFAULT_SYSFS_ROOT,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Sysfs GPIO settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpioSettings {
    /// Root of the sysfs GPIO class directory
    pub sysfs_root: PathBuf,
}

impl Default for GpioSettings {
    fn default() -> Self {
        Self {
            sysfs_root: PathBuf::from(DEFAULT_SYSFS_ROOT),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Minimum level: trace, debug, info, warn or error
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingSettings {
    /// Parsed log level
    pub fn level(&self) -> ConfigResult<tracing::Level> {
        self.level
            .parse()
            .map_err(|_| ConfigError::ValueOutOfRange {
                key: "logging.level".to_string(),
                value: self.level.clone(),
            })
    }
}

/// Dispatch loop settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerSettings {
    /// Readiness notifications collected per wakeup
    pub events_capacity: usize,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            events_capacity: 64,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// GPIO settings
    #[serde(default)]
    pub gpio: GpioSettings,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Dispatch loop settings
    #[serde(default)]
    pub handler: HandlerSettings,
    /// Event-to-resource bindings, armed in this order
    #[serde(default = "default_bindings")]
    pub events: Vec<ResourceBinding>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gpio: GpioSettings::default(),
            logging: LoggingSettings::default(),
            handler: HandlerSettings::default(),
            events: default_bindings(),
        }
    }
}

#[derive(Clone, Copy)]
enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> ConfigResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Format::Json),
            Some("toml") => Ok(Format::Toml),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-user default location of the config file
    pub fn default_path() -> ConfigResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("gemkit").join("gemkit.toml"))
            .ok_or(ConfigError::NoConfigDirectory)
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = Format::of(path)?;
        let content =
            std::fs::read_to_string(path).map_err(|e| SettingsError::io(path, e))?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!(
            "Loaded config from {} with {} event binding(s)",
            path.display(),
            config.events.len()
        );
        Ok(config)
    }

    /// Load the file at `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match Format::of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => self.to_toml_string()?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| SettingsError::io(parent, e))?;
        }
        std::fs::write(path, content).map_err(|e| SettingsError::io(path, e))?;
        Ok(())
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> SettingsResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        self.logging.level()?;

        if self.handler.events_capacity == 0 {
            return Err(ConfigError::ValueOutOfRange {
                key: "handler.events_capacity".to_string(),
                value: "0".to_string(),
            });
        }

        let mut seen = Vec::with_capacity(self.events.len());
        let mut pins: BTreeMap<u32, EventType> = BTreeMap::new();
        for binding in &self.events {
            if seen.contains(&binding.event_type) {
                return Err(ConfigError::DuplicateEvent(binding.event_type));
            }
            seen.push(binding.event_type);

            match binding.source {
                ResourceSpec::Gpio { pin, .. } => {
                    if let Some(first) = pins.insert(pin, binding.event_type) {
                        return Err(ConfigError::DuplicatePin {
                            pin,
                            first,
                            second: binding.event_type,
                        });
                    }
                }
                ResourceSpec::Timer { interval_ms: 0, .. } => {
                    return Err(ConfigError::ValueOutOfRange {
                        key: format!("events.{}.source.interval_ms", binding.event_type),
                        value: "0".to_string(),
                    });
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Binding for an event type
    pub fn binding(&self, event_type: EventType) -> Option<&ResourceBinding> {
        self.events.iter().find(|b| b.event_type == event_type)
    }

    /// Build the board described by this configuration
    pub fn board(&self) -> Board {
        Board::from_bindings(SysfsGpio::new(self.gpio.sysfs_root.clone()), &self.events)
    }
}

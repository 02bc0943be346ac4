//! GemKit Settings Crate
//!
//! Loads, validates and saves the board configuration: which resource backs
//! each event type, plus logging and dispatch loop tuning.

pub mod config;
pub mod error;

pub use config::{Config, GpioSettings, HandlerSettings, LoggingSettings};
pub use error::{ConfigError, ConfigResult, SettingsError, SettingsResult};

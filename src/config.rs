//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use btleplug::api::BDAddr;
use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{Result, TelemetryError};
use crate::frame::protocol::{
    DataCharacteristic, DEFAULT_DATA_HANDLE, DEFAULT_DEVICE_ADDRESS, TELEMETRY_CHARACTERISTIC_UUID,
    TELEMETRY_SERVICE_UUID,
};
use crate::window::DEFAULT_WINDOW_CAPACITY;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Peripheral identity
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default = "default_data_handle")]
    pub data_handle: u16,

    #[serde(default = "default_service_uuid")]
    pub service_uuid: Uuid,

    #[serde(default = "default_characteristic_uuid")]
    pub characteristic_uuid: Uuid,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

/// Acquisition loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AcquisitionConfig {
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,

    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

/// Terminal consumer configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DisplayConfig {
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily-rolling log files; empty logs to stdout only
    #[serde(default)]
    pub file_dir: String,
}

// Default value functions
fn default_address() -> String { DEFAULT_DEVICE_ADDRESS.to_string() }
fn default_data_handle() -> u16 { DEFAULT_DATA_HANDLE }
fn default_service_uuid() -> Uuid { TELEMETRY_SERVICE_UUID }
fn default_characteristic_uuid() -> Uuid { TELEMETRY_CHARACTERISTIC_UUID }
fn default_connect_timeout_ms() -> u64 { 10000 }

fn default_window_capacity() -> usize { DEFAULT_WINDOW_CAPACITY }
fn default_poll_timeout_ms() -> u64 { 1000 }

fn default_refresh_interval_ms() -> u64 { 100 }

fn default_log_level() -> String { "info".to_string() }

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            data_handle: default_data_handle(),
            service_uuid: default_service_uuid(),
            characteristic_uuid: default_characteristic_uuid(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            window_capacity: default_window_capacity(),
            poll_timeout_ms: default_poll_timeout_ms(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { refresh_interval_ms: default_refresh_interval_ms() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_dir: String::new(),
        }
    }
}

impl DeviceConfig {
    /// The data characteristic described by this section
    pub fn characteristic(&self) -> DataCharacteristic {
        DataCharacteristic::new(self.data_handle, self.characteristic_uuid)
    }
}

impl AcquisitionConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

impl DisplayConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ble_telemetry::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Validate device identity
        if BDAddr::from_str(&self.device.address).is_err() {
            return Err(invalid(format!(
                "device address '{}' is not a valid Bluetooth address",
                self.device.address
            )));
        }

        // The CCCD lives at data_handle + 1, so the last handle is unusable
        if self.device.data_handle == 0 || self.device.data_handle == u16::MAX {
            return Err(invalid("data_handle must be between 0x0001 and 0xFFFE"));
        }

        if self.device.connect_timeout_ms == 0 || self.device.connect_timeout_ms > 60000 {
            return Err(invalid("connect_timeout_ms must be between 1 and 60000"));
        }

        // Validate acquisition
        if self.acquisition.window_capacity == 0 || self.acquisition.window_capacity > 100_000 {
            return Err(invalid("window_capacity must be between 1 and 100000"));
        }

        if self.acquisition.poll_timeout_ms == 0 || self.acquisition.poll_timeout_ms > 10000 {
            return Err(invalid("poll_timeout_ms must be between 1 and 10000"));
        }

        // Validate display
        if self.display.refresh_interval_ms == 0 || self.display.refresh_interval_ms > 60000 {
            return Err(invalid("refresh_interval_ms must be between 1 and 60000"));
        }

        // Validate logging
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(invalid("log level must be one of: trace, debug, info, warn, error"));
        }

        Ok(())
    }
}

fn invalid(message: impl std::fmt::Display) -> TelemetryError {
    TelemetryError::Config(toml::de::Error::custom(message))
}

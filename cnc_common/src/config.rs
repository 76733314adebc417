//! Configuration loading traits and types.
//!
//! This module provides TOML loading for the controller configuration and
//! the machine parameters the motion core needs (steps per unit, feed
//! limits, default acceleration, delay time base, initial fault policies).
//!
//! # Usage
//!
//! ```rust,no_run
//! use cnc_common::config::{ConfigError, ControllerConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = ControllerConfig::load_validated(Path::new("controller.toml"))?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::consts::{
    ACC_DEFAULT, AXES, FEED_BASE_DEFAULT, STEPS_PER_UNIT_MAX, STEPS_PER_UNIT_MIN,
    TICK_BASE_US_DEFAULT, TICK_BASE_US_MAX, TICK_BASE_US_MIN,
};

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Common configuration fields.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "cnc-mill-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Controller instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: "cnc".to_string(),
        }
    }
}

/// Machine parameters consumed by the motion core.
///
/// # TOML Example
///
/// ```toml
/// [machine]
/// steps_per_unit = [400.0, 400.0, 800.0]
/// feed_base = 100.0
/// acc_default = 50.0
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Steps per unit of distance for X, Y and Z.
    pub steps_per_unit: [f64; AXES],

    /// Minimum feed [units/min]. Lower requested feeds are clamped up.
    #[serde(default = "default_feed_base")]
    pub feed_base: f64,

    /// Maximum feed [units/min]. `None` leaves feeds unbounded.
    #[serde(default)]
    pub feed_max: Option<f64>,

    /// Acceleration [units/s²] used when a command does not specify one.
    #[serde(default = "default_acc")]
    pub acc_default: f64,

    /// Duration of one delay unit [µs].
    #[serde(default = "default_tick_base_us")]
    pub tick_base_us: u32,

    /// Initial "fail on endstops" policy.
    #[serde(default = "default_true")]
    pub fail_on_endstops: bool,

    /// Initial "break on probe" policy.
    #[serde(default)]
    pub break_on_probe: bool,
}

fn default_feed_base() -> f64 {
    FEED_BASE_DEFAULT
}
fn default_acc() -> f64 {
    ACC_DEFAULT
}
fn default_tick_base_us() -> u32 {
    TICK_BASE_US_DEFAULT
}
fn default_true() -> bool {
    true
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            steps_per_unit: [100.0; AXES],
            feed_base: FEED_BASE_DEFAULT,
            feed_max: None,
            acc_default: ACC_DEFAULT,
            tick_base_us: TICK_BASE_US_DEFAULT,
            fail_on_endstops: true,
            break_on_probe: false,
        }
    }
}

impl MachineConfig {
    /// Validate parameter bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, spu) in self.steps_per_unit.iter().enumerate() {
            if !spu.is_finite() || *spu < STEPS_PER_UNIT_MIN || *spu > STEPS_PER_UNIT_MAX {
                return Err(ConfigError::ValidationError(format!(
                    "steps_per_unit[{i}] {spu} out of range [{STEPS_PER_UNIT_MIN}, {STEPS_PER_UNIT_MAX}]"
                )));
            }
        }
        if !self.feed_base.is_finite() || self.feed_base <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "feed_base {} must be positive",
                self.feed_base
            )));
        }
        if let Some(max) = self.feed_max {
            if !max.is_finite() || max < self.feed_base {
                return Err(ConfigError::ValidationError(format!(
                    "feed_max {max} must be >= feed_base {}",
                    self.feed_base
                )));
            }
        }
        if !self.acc_default.is_finite() || self.acc_default < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "acc_default {} must be non-negative",
                self.acc_default
            )));
        }
        if self.tick_base_us < TICK_BASE_US_MIN || self.tick_base_us > TICK_BASE_US_MAX {
            return Err(ConfigError::ValidationError(format!(
                "tick_base_us {} out of range [{TICK_BASE_US_MIN}, {TICK_BASE_US_MAX}]",
                self.tick_base_us
            )));
        }
        Ok(())
    }
}

/// Top-level controller configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default)]
    pub shared: SharedConfig,
    pub machine: MachineConfig,
}

impl ControllerConfig {
    /// Load and validate in one step.
    pub fn load_validated(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.shared.validate()?;
        config.machine.validate()?;
        Ok(config)
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

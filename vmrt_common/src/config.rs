//! Configuration loading traits and types.
//!
//! This module provides a standardized way to load TOML configuration files
//! across all VMRT applications.
//!
//! # Usage
//!
//! ```rust,no_run
//! use vmrt_common::config::{ConfigLoader, ConfigError, RuntimeConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = RuntimeConfig::load(Path::new("vmrt.toml"))?;
//!     config.validate()?;
//!     println!("Drivers: {}", config.drivers);
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::consts::DEFAULT_DRIVERS;

/// Error type for configuration loading operations.
///
/// This enum represents all possible errors that can occur when loading
/// configuration files.
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
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

fn default_drivers() -> String {
    DEFAULT_DRIVERS.to_string()
}

/// Runtime configuration file.
///
/// # TOML Example
///
/// ```toml
/// log_level = "debug"
/// drivers = "nothere,local-task"
/// trace_dir = "/tmp/vmrt-trace"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Comma-separated driver priority list.
    #[serde(default = "default_drivers")]
    pub drivers: String,

    /// Directory receiving module snapshots and the call log.
    #[serde(default)]
    pub trace_dir: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            drivers: default_drivers(),
            trace_dir: None,
        }
    }
}

impl RuntimeConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `drivers` names no driver at all
    /// - `trace_dir` is present but empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.drivers.split(',').all(|d| d.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "drivers must name at least one driver".to_string(),
            ));
        }
        if self
            .trace_dir
            .as_deref()
            .is_some_and(|dir| dir.as_os_str().is_empty())
        {
            return Err(ConfigError::ValidationError(
                "trace_dir cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// This trait provides a default implementation that works with any type
/// implementing `serde::de::DeserializeOwned`.
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

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

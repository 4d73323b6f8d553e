//! Configuration management
//!
//! Loads the TOML configuration, validates it, and holds the active
//! thresholds behind an atomic swap so they can be replaced between
//! monitoring cycles without restarting the engine.

pub mod thresholds;
pub mod watcher;

pub use thresholds::{
    CrewThresholds, DelayThresholds, DelayWeights, HealthThresholds, LoadThresholds,
    RouteThresholds, ThresholdConfig,
};
pub use watcher::ConfigWatcher;

use crate::error::ConfigError;
use crate::models::route::AlternateTable;
use arc_swap::ArcSwap;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    pub thresholds: ThresholdConfig,
    /// Destination airport code to diversion alternates
    #[serde(default)]
    pub alternates: AlternateTable,
}

/// Monitoring loop settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Seconds between the start of one cycle and the next
    pub interval_seconds: u64,
    /// Maximum number of alert transitions kept in history
    pub history_limit: usize,
    /// Cycles an alert is kept after its subject was last reported
    pub alert_retention_cycles: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 30,
            history_limit: 10_000,
            alert_retention_cycles: 120,
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read,
    /// `ConfigError::TomlError` if it is not valid TOML or lacks a threshold,
    /// and `ConfigError::ValidationError` if any value is out of bounds.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit path, or fall back to defaults
    ///
    /// An explicit path that cannot be loaded is an error: thresholds are
    /// never silently defaulted once the operator has pointed at a file.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                info!("Loading configuration from: {}", path.display());
                Self::from_file(path)
            }
            None => {
                info!("Using default configuration");
                Ok(Self::default())
            }
        }
    }

    /// Validate thresholds and monitoring settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = self.thresholds.problems();
        if self.monitoring.interval_seconds == 0 {
            errors.push("monitoring.interval_seconds must be > 0".to_string());
        }
        if self.monitoring.history_limit == 0 {
            errors.push("monitoring.history_limit must be > 0".to_string());
        }
        if self.monitoring.alert_retention_cycles == 0 {
            errors.push("monitoring.alert_retention_cycles must be > 0".to_string());
        }
        errors.extend(self.alternates.problems());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationError(errors))
        }
    }
}

/// Shared, hot-swappable handle to the active thresholds
///
/// Readers take a full `Arc` of the current configuration; a cycle loads it
/// once at its start, so a swap only affects later cycles.
#[derive(Debug)]
pub struct ConfigHandle {
    current: ArcSwap<ThresholdConfig>,
}

impl ConfigHandle {
    /// Create a handle from validated thresholds
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if the thresholds are invalid.
    pub fn new(thresholds: ThresholdConfig) -> Result<Self, ConfigError> {
        check(&thresholds)?;
        Ok(Self {
            current: ArcSwap::from_pointee(thresholds),
        })
    }

    /// The thresholds in force right now
    pub fn load(&self) -> Arc<ThresholdConfig> {
        self.current.load_full()
    }

    /// Replace the thresholds, keeping the old ones if the new set is invalid
    pub fn replace(&self, thresholds: ThresholdConfig) -> Result<(), ConfigError> {
        if let Err(e) = check(&thresholds) {
            warn!("Rejected threshold update: {}", e);
            return Err(e);
        }
        self.current.store(Arc::new(thresholds));
        info!("Threshold configuration updated");
        Ok(())
    }
}

fn check(thresholds: &ThresholdConfig) -> Result<(), ConfigError> {
    let problems = thresholds.problems();
    if problems.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(problems))
    }
}

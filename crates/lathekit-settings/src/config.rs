//! Startup configuration for LatheKit
//!
//! Provides configuration file loading and validation. Supports JSON and
//! TOML files; the default file lives in the platform config directory.
//!
//! Configuration is organized into logical sections:
//! - Panel settings (tick interval)
//! - Machine constants (steps per mm)
//! - Spindle limits and defaults
//! - Jog feed
//! - Initial threading, turning and taper parameters

use crate::error::{ConfigError, SettingsError, SettingsResult};
use lathekit_core::ParameterError;
use lathekit_machining::{
    ControlLoopConfig, SpindleSettings, TaperParams, ThreadingParams, TurningParams,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Panel loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelSettings {
    /// Interval between control loop ticks in milliseconds
    pub tick_interval_ms: u64,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 20,
        }
    }
}

/// Machine constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineSettings {
    /// Steps per mm for X and Z, per revolution for the spindle axis Y
    pub steps_per_mm: [f64; 3],
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self {
            steps_per_mm: ControlLoopConfig::default().steps_per_mm,
        }
    }
}

/// Jog settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JogSettings {
    /// Jog feed rate in mm/min
    pub feed: u32,
}

impl Default for JogSettings {
    fn default() -> Self {
        Self {
            feed: ControlLoopConfig::default().jog_feed,
        }
    }
}

/// Complete startup configuration
///
/// Aggregates all settings sections. Missing sections and fields take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Panel loop settings
    pub panel: PanelSettings,
    /// Machine constants
    pub machine: MachineSettings,
    /// Spindle limits and defaults
    pub spindle: SpindleSettings,
    /// Jog settings
    pub jog: JogSettings,
    /// Initial threading parameters
    pub threading: ThreadingParams,
    /// Initial straight turning parameters
    pub turning: TurningParams,
    /// Initial taper parameters
    pub taper: TaperParams,
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("lathekit").join("config.toml"))
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SettingsError::LoadError(format!("{}: {}", path.display(), e))
        })?;

        let config: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            other => {
                return Err(ConfigError::UnsupportedFormat(
                    other.unwrap_or("none").to_string(),
                )
                .into())
            }
        };

        config.validate()?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load an explicit file, or the default file when it exists
    ///
    /// Without an explicit path, a missing default file gives the defaults.
    pub fn load_or_default(path: Option<&Path>) -> SettingsResult<Self> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from_file(&path),
            _ => {
                tracing::debug!("No configuration file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        if self.panel.tick_interval_ms == 0 {
            return Err(ConfigError::ValueOutOfRange {
                key: "panel.tick_interval_ms".to_string(),
                value: "0".to_string(),
            }
            .into());
        }

        if let Some(steps) = self
            .machine
            .steps_per_mm
            .iter()
            .find(|s| !(s.is_finite() && **s > 0.0))
        {
            return Err(ConfigError::ValueOutOfRange {
                key: "machine.steps_per_mm".to_string(),
                value: steps.to_string(),
            }
            .into());
        }

        if self.jog.feed == 0 {
            return Err(ConfigError::ValueOutOfRange {
                key: "jog.feed".to_string(),
                value: "0".to_string(),
            }
            .into());
        }

        self.spindle.validate().map_err(|e| invalid("spindle", e))?;
        self.threading
            .validate()
            .map_err(|e| invalid("threading", e))?;
        self.turning.validate().map_err(|e| invalid("turning", e))?;
        self.taper.validate().map_err(|e| invalid("taper", e))?;
        Ok(())
    }

    /// Machine constants for the control loop
    pub fn control_loop_config(&self) -> ControlLoopConfig {
        ControlLoopConfig {
            steps_per_mm: self.machine.steps_per_mm,
            spindle: self.spindle,
            jog_feed: self.jog.feed,
        }
    }
}

fn invalid(section: &str, err: ParameterError) -> SettingsError {
    SettingsError::InvalidSetting {
        key: section.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.control_loop_config(), ControlLoopConfig::default());
    }

    #[test]
    fn test_default_path_is_under_lathekit() {
        if let Some(path) = Config::default_path() {
            assert!(path.ends_with("lathekit/config.toml"));
        }
    }
}

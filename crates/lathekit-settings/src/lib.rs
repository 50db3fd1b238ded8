//! LatheKit Settings Crate
//!
//! Loads the panel's startup configuration: machine constants and the
//! initial operator parameters. The file is read once and never written.

pub mod config;
pub mod error;

pub use config::{Config, JogSettings, MachineSettings, PanelSettings};
pub use error::{ConfigError, SettingsError, SettingsResult};

//! Engine configuration.
//!
//! Settings can be built in code with [`EngineConfigBuilder`] or loaded from
//! YAML/JSON files.
//!
//! # Configuration File Structure
//!
//! ```yaml
//! max_iterations: 10
//! strategy: auto        # level | event | auto
//! time_step: 25         # omit to derive from the fastest clock
//! default_delay_capacity: 3
//! default_counter_bits: 4
//! history_limit: 10000  # omit to keep every timing event
//! log_level: info
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::executor::Strategy;
use crate::gate::{
    GateKind, GateType, DEFAULT_COUNTER_BITS, DEFAULT_DELAY_CAPACITY, MAX_COUNTER_BITS,
    MAX_DELAY_CAPACITY,
};
use crate::types::SimTime;

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown file format: {0}")]
    UnknownFormat(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

fn default_max_iterations() -> usize {
    10
}

fn default_delay_capacity() -> usize {
    DEFAULT_DELAY_CAPACITY
}

fn default_counter_bits() -> u8 {
    DEFAULT_COUNTER_BITS
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Evaluation engine settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Pass cap for the level strategy; budget factor for event-driven
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Evaluation strategy
    #[serde(default)]
    pub strategy: Strategy,

    /// Simulated milliseconds per evaluate call; derived from clocks if unset
    #[serde(default)]
    pub time_step: Option<SimTime>,

    /// Capacity for DELAY gates built by [`EngineConfig::gate_kind`]
    #[serde(default = "default_delay_capacity")]
    pub default_delay_capacity: usize,

    /// Width for BINARY_COUNTER gates built by [`EngineConfig::gate_kind`]
    #[serde(default = "default_counter_bits")]
    pub default_counter_bits: u8,

    /// Maximum timing events retained by a capture session
    #[serde(default)]
    pub history_limit: Option<usize>,

    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            strategy: Strategy::default(),
            time_step: None,
            default_delay_capacity: default_delay_capacity(),
            default_counter_bits: default_counter_bits(),
            history_limit: None,
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Loads configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let config: EngineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Loads configuration from a JSON string.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file, auto-detecting format.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match ext.to_lowercase().as_str() {
            "yaml" | "yml" => Self::from_yaml_file(path),
            "json" => Self::from_json_file(path),
            _ => Err(ConfigError::UnknownFormat(ext.to_string())),
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_iterations == 0 {
            return Err(ConfigError::Validation(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if self.time_step == Some(0) {
            return Err(ConfigError::Validation(
                "time_step must be positive when set".to_string(),
            ));
        }
        if !(1..=MAX_DELAY_CAPACITY).contains(&self.default_delay_capacity) {
            return Err(ConfigError::Validation(format!(
                "default_delay_capacity must be within 1..={}",
                MAX_DELAY_CAPACITY
            )));
        }
        if !(1..=MAX_COUNTER_BITS).contains(&self.default_counter_bits) {
            return Err(ConfigError::Validation(format!(
                "default_counter_bits must be within 1..={}",
                MAX_COUNTER_BITS
            )));
        }
        if self.history_limit == Some(0) {
            tracing::warn!("history_limit of 0 discards every timing event");
        }
        Ok(())
    }

    /// A fresh gate kind of type `ty` using the configured defaults.
    ///
    /// [`Circuit::add_gate`](crate::Circuit::add_gate) always uses the
    /// built-in defaults; pass this to
    /// [`Circuit::add_gate_with`](crate::Circuit::add_gate_with) to honor
    /// `default_delay_capacity` and `default_counter_bits`.
    pub fn gate_kind(&self, ty: GateType) -> GateKind {
        match ty {
            GateType::Delay => GateKind::delay(self.default_delay_capacity),
            GateType::BinaryCounter => GateKind::counter(self.default_counter_bits),
            other => GateKind::with_defaults(other),
        }
    }

    /// Saves configuration to a YAML file.
    pub fn to_yaml_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Saves configuration to a JSON file.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Converts to YAML string.
    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Converts to JSON string.
    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Builder for creating EngineConfig programmatically.
#[derive(Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the iteration cap.
    pub fn max_iterations(mut self, n: usize) -> Self {
        self.config.max_iterations = n;
        self
    }

    /// Sets the evaluation strategy.
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Fixes the time step instead of deriving it from clocks.
    pub fn time_step(mut self, step: SimTime) -> Self {
        self.config.time_step = Some(step);
        self
    }

    /// Sets the capacity for new DELAY gates.
    pub fn default_delay_capacity(mut self, capacity: usize) -> Self {
        self.config.default_delay_capacity = capacity;
        self
    }

    /// Sets the width for new counters.
    pub fn default_counter_bits(mut self, bits: u8) -> Self {
        self.config.default_counter_bits = bits;
        self
    }

    /// Bounds the timing-event history.
    pub fn history_limit(mut self, limit: usize) -> Self {
        self.config.history_limit = Some(limit);
        self
    }

    /// Sets the log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.log_level = level.into();
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> ConfigResult<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

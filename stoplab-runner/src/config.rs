//! Serializable run configuration.
//!
//! A run is one symbol, one bar source, one parameter set and one date
//! window. Everything has an explicit default except the symbol and the source.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use stoplab_core::StopParams;
use thiserror::Error;

use crate::window::DEFAULT_BUFFER_DAYS;

/// Unique identifier for a run configuration (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

fn default_buffer_days() -> u32 {
    DEFAULT_BUFFER_DAYS
}

/// Requested output window. Missing ends are resolved against "today".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// First date to report (inclusive). Defaults to `end - (period + buffer_days)`.
    #[serde(default)]
    pub start: Option<NaiveDate>,
    /// Last date to report (inclusive). Defaults to today.
    #[serde(default)]
    pub end: Option<NaiveDate>,
    /// Extra calendar days fetched before `start` on top of `period`.
    #[serde(default = "default_buffer_days")]
    pub buffer_days: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            buffer_days: DEFAULT_BUFFER_DAYS,
        }
    }
}

/// Where bars come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Replay daily bars from a CSV file.
    Csv { path: PathBuf },
}

/// Serializable configuration for a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub symbol: String,
    #[serde(default)]
    pub params: StopParams,
    #[serde(default)]
    pub window: WindowConfig,
    pub source: SourceConfig,
}

impl RunConfig {
    /// Build a config for a CSV file with default params and window.
    pub fn for_csv(symbol: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            symbol: symbol.into(),
            params: StopParams::default(),
            window: WindowConfig::default(),
            source: SourceConfig::Csv { path: path.into() },
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::Invalid("symbol must not be empty".into()));
        }
        self.params
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if let (Some(start), Some(end)) = (self.window.start, self.window.end) {
            if start > end {
                return Err(ConfigError::Invalid(format!(
                    "window start {start} is after end {end}"
                )));
            }
        }
        Ok(())
    }

    /// Deterministic hash ID for this configuration.
    ///
    /// Two runs with identical configs share a RunId.
    pub fn run_id(&self) -> RunId {
        let SourceConfig::Csv { path } = &self.source;
        let canonical = format!(
            "{}|{}|{:016x}|{:?}|{:?}|{}|csv:{}",
            self.symbol,
            self.params.period,
            self.params.multiplier.to_bits(),
            self.window.start,
            self.window.end,
            self.window.buffer_days,
            path.display(),
        );
        blake3::hash(canonical.as_bytes()).to_hex().to_string()
    }
}

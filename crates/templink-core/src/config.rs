//! Configuration module for Templink.
//!
//! Typed configuration structs mapping to the YAML configuration file,
//! with loading, defaults, and a platform-appropriate default path.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level configuration for Templink.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
}

/// Propagation engine limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum template chain depth a single propagation may traverse.
    /// Exceeding it is treated as a data-integrity bug (runaway fixpoint
    /// or a cycle the linkage traversal missed).
    pub max_chain_depth: u16,
    /// Maximum number of template entities accepted in one batch.
    pub max_batch: usize,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Path to the log file.
    pub file: PathBuf,
}

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/templink/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("templink")
            .join("config.yaml")
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_chain_depth: 16,
            max_batch: 1000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("templink");
        Self {
            level: "info".to_string(),
            file: data_dir.join("templink.log"),
        }
    }
}

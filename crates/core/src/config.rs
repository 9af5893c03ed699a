//! Configuration loading.
//!
//! Configuration lives in a versioned TOML file, by default at
//! `~/.config/codemap/config.toml`. A missing file is not an error;
//! defaults apply. Every field is optional on disk.

use std::path::{Path, PathBuf};
use std::fs;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadError(String, #[source] std::io::Error),

    #[error("failed to parse TOML in {0}: {1}")]
    ParseError(String, #[source] toml::de::Error),

    #[error("version {0} is unsupported (expected 1)")]
    BadVersion(u32),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project file name looked up by discovery.
    pub file_name: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self { file_name: "codemap.md".to_string() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Persist after every mutation.
    pub auto_save: bool,
    /// Sort notes by source line when writing.
    pub sort_notes: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { auto_save: true, sort_notes: false }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
    pub file_level: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), file: None, file_level: None }
    }
}

/// Resolved configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub version: ConfigVersion,
    pub project: ProjectConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(transparent)]
pub struct ConfigVersion(pub u32);

impl Default for ConfigVersion {
    fn default() -> Self {
        Self(1)
    }
}

impl Config {
    /// Load configuration from `path`, or from the default location when
    /// `path` is `None`. A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_config_path(),
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let s = fs::read_to_string(&path)
            .map_err(|e| ConfigError::ReadError(path.display().to_string(), e))?;

        let config: Config = toml::from_str(&s)
            .map_err(|e| ConfigError::ParseError(path.display().to_string(), e))?;

        if config.version.0 != 1 {
            return Err(ConfigError::BadVersion(config.version.0));
        }
        Ok(config)
    }
}

/// Default config path: `<config dir>/codemap/config.toml`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("codemap")
        .join("config.toml")
}

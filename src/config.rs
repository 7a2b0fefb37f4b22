//! Configuration module for nmapparse

use crate::error::{NmapParseError, Result};
use crate::filter::Filters;
use crate::model::AliveMerge;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// User configuration, normally read from `~/.nmapparse.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Descend into subdirectories when a directory is given
    pub recurse: bool,

    /// How `alive` is merged when a host shows up in several files
    pub alive_merge: AliveMerge,

    /// Default for the `only_alive` filter
    pub only_alive: bool,

    /// Default for the `must_have_ports` filter
    pub must_have_ports: bool,

    /// Log level used when neither `--log-level` nor `RUST_LOG` is set
    pub log_level: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            recurse: false,
            alive_merge: AliveMerge::KeepLast,
            only_alive: true,
            must_have_ports: true,
            log_level: "warn".to_string(),
        }
    }
}

impl ParserConfig {
    /// Load configuration from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| NmapParseError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: ParserConfig = toml::from_str(&content)
            .map_err(|e| NmapParseError::ConfigError(format!("Failed to parse TOML: {}", e)))?;

        Ok(config)
    }

    pub fn default_path() -> PathBuf {
        let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home_dir.join(".nmapparse.toml")
    }

    /// Load `~/.nmapparse.toml`, falling back to defaults when it is absent
    /// or unreadable
    pub fn load_default_config() -> Self {
        let path = Self::default_path();

        if path.exists() {
            match Self::from_toml_file(&path) {
                Ok(config) => {
                    log::debug!("Loaded config from {}", path.display());
                    return config;
                }
                Err(e) => log::warn!("Ignoring {}: {}", path.display(), e),
            }
        }

        Self::default()
    }

    /// Filter booleans as configured, with every dimension unset
    pub fn default_filters(&self) -> Filters {
        Filters::default()
            .with_only_alive(self.only_alive)
            .with_must_have_ports(self.must_have_ports)
    }

    pub fn log_level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Warn)
    }
}

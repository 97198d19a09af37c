//! Engine configuration loaded from a JSON file.
//!
//! # Invariants
//! - `default_page_size` is strictly positive.
//! - `log_level` is one the logger accepts.
//! - `log_dir`, when set, is an absolute path.

use crate::logging::{default_log_level, normalize_level};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config `{}`: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// SQLite file; the engine runs in memory when absent.
    pub database_path: Option<PathBuf>,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
    pub default_page_size: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            log_level: default_log_level().to_string(),
            log_dir: None,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl EngineConfig {
    /// Reads, parses and validates the config at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig =
            serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
                path: PathBuf::new(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_page_size == 0 {
            return Err(ConfigError::Invalid(
                "default_page_size must be greater than zero".to_string(),
            ));
        }
        normalize_level(&self.log_level).map_err(|err| ConfigError::Invalid(err.to_string()))?;
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "log_dir must be absolute, got `{}`",
                    dir.display()
                )));
            }
        }
        Ok(())
    }
}

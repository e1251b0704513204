//! Application Configuration
//!
//! `board_config.json` in the data directory holds the hosted backend's
//! URL and anon key. Without a backend the board runs on the local SQLite
//! store in the same directory. Environment variables override the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_FILE: &str = "board_config.json";
pub const DB_FILE: &str = "board.db";

pub const ENV_DATA_DIR: &str = "BOARD_DATA_DIR";
pub const ENV_BACKEND_URL: &str = "BOARD_BACKEND_URL";
pub const ENV_BACKEND_KEY: &str = "BOARD_BACKEND_KEY";

const DEFAULT_DATA_DIR: &str = "board-data";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid backend url: {0}")]
    InvalidBackendUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: Option<BackendConfig>,
    /// Relative paths resolve against the data directory
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Directory the config was loaded from
    #[serde(skip)]
    pub data_dir: PathBuf,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: None,
            log_dir: default_log_dir(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

impl AppConfig {
    /// Read the config in `data_dir`; a missing file gives the defaults
    pub fn load(data_dir: &Path) -> Result<Self, ConfigError> {
        let path = data_dir.join(CONFIG_FILE);
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?
        } else {
            tracing::debug!("no config at {}, using defaults", path.display());
            Self::default()
        };
        config.data_dir = data_dir.to_path_buf();
        Ok(config)
    }

    /// Load from `BOARD_DATA_DIR` (or the default directory) and apply env overrides
    pub fn from_env() -> Result<Self, ConfigError> {
        let data_dir = std::env::var(ENV_DATA_DIR).unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string());
        let mut config = Self::load(Path::new(&data_dir))?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Override the backend from `lookup`; a lone variable patches the file's value
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let url = lookup(ENV_BACKEND_URL).filter(|v| !v.trim().is_empty());
        let key = lookup(ENV_BACKEND_KEY).filter(|v| !v.trim().is_empty());
        if url.is_none() && key.is_none() {
            return;
        }

        let current = self.backend.take();
        let url = url.or_else(|| current.as_ref().map(|b| b.url.clone()));
        let key = key.or_else(|| current.as_ref().map(|b| b.anon_key.clone()));
        self.backend = match (url, key) {
            (Some(url), Some(anon_key)) => Some(BackendConfig { url, anon_key }),
            _ => {
                tracing::warn!(
                    "{} and {} must both be set; staying local",
                    ENV_BACKEND_URL,
                    ENV_BACKEND_KEY
                );
                None
            }
        };
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(backend) = &self.backend {
            if !(backend.url.starts_with("https://") || backend.url.starts_with("http://")) {
                return Err(ConfigError::InvalidBackendUrl(backend.url.clone()));
            }
        }
        Ok(())
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = self.data_dir.join(CONFIG_FILE);
        std::fs::create_dir_all(&self.data_dir).map_err(|source| ConfigError::Io {
            path: self.data_dir.clone(),
            source,
        })?;
        let text = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&path, text).map_err(|source| ConfigError::Io { path, source })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE)
    }

    pub fn log_path(&self) -> PathBuf {
        if self.log_dir.is_absolute() {
            self.log_dir.clone()
        } else {
            self.data_dir.join(&self.log_dir)
        }
    }
}

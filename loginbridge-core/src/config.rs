//! Bridge configuration.

use crate::bridge::PASSWORDS_KEY;
use crate::platform::{
    get_default_config_path, get_default_device_key_path, get_default_preferences_path,
    get_default_store_path,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Where the bridge keeps its files, and how it logs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub store_path: PathBuf,
    pub preferences_path: PathBuf,
    pub device_key_path: PathBuf,
    /// Preference name holding the store key
    pub passwords_key: String,
    pub log_level: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            store_path: get_default_store_path(),
            preferences_path: get_default_preferences_path(),
            device_key_path: get_default_device_key_path(),
            passwords_key: PASSWORDS_KEY.to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl BridgeConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the given file, or the default file if it exists, or defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = get_default_config_path();
                if default_path.exists() {
                    Self::load(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

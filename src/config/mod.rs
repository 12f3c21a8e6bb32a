//! Service settings
//!
//! Tunables for the storage bridge and the configuration service, loaded from a TOML
//! file. Every field has a default, so an absent file or an empty table is valid.

pub mod paths;
pub mod validation;

pub use paths::{
    config_dir, data_dir, service_settings_file, storage_database, user_settings_file,
    PlatformPaths,
};
pub use validation::validate_settings;

use crate::core::errors::{ParseError, SettingsError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Top-level service settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    pub storage: StorageSettings,
    pub configuration: ConfigurationSettings,
    pub logging: LoggingSettings,
}

/// Storage bridge settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Window during which raw item changes are coalesced
    pub change_debounce_ms: u64,
    /// Buffered change notifications per remote listener
    pub event_capacity: usize,
    /// Persistent store location; in-memory when absent
    pub database: Option<PathBuf>,
}

/// Configuration service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigurationSettings {
    /// Settings file of a workspace folder, relative to the folder
    pub folder_settings_path: String,
    pub user_settings: Option<PathBuf>,
    pub remote_user_settings: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

pub const DEFAULT_CHANGE_DEBOUNCE_MS: u64 = 100;
pub const DEFAULT_FOLDER_SETTINGS_PATH: &str = ".workbench/settings.json";

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            change_debounce_ms: DEFAULT_CHANGE_DEBOUNCE_MS,
            event_capacity: 64,
            database: None,
        }
    }
}

impl Default for ConfigurationSettings {
    fn default() -> Self {
        Self {
            folder_settings_path: DEFAULT_FOLDER_SETTINGS_PATH.to_string(),
            user_settings: None,
            remote_user_settings: None,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl StorageSettings {
    pub fn change_debounce(&self) -> Duration {
        Duration::from_millis(self.change_debounce_ms)
    }
}

impl ServiceSettings {
    /// Parse and validate settings from TOML text
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: ServiceSettings = toml::from_str(content)
            .map_err(|e| SettingsError::Parse(ParseError::toml_error("service settings", e)))?;
        validate_settings(&settings)?;
        Ok(settings)
    }

    /// Load settings from a file
    pub async fn load(path: &Path) -> Result<Self, SettingsError> {
        debug!("Loading service settings from {}", path.display());
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SettingsError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                SettingsError::ReadFailed {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
        let settings = Self::from_toml(&content)?;
        info!("Loaded service settings from {}", path.display());
        Ok(settings)
    }

    /// Load settings from a file, falling back to defaults when it does not exist
    pub async fn load_or_default(path: &Path) -> Result<Self, SettingsError> {
        match Self::load(path).await {
            Err(SettingsError::FileNotFound { .. }) => {
                debug!("No service settings at {}, using defaults", path.display());
                Ok(Self::default())
            }
            other => other,
        }
    }
}

//! Platform-aware locations for the workbench services

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// Get the configuration directory for the current platform
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(custom_dir) = env::var("WORKBENCH_CONFIG_DIR") {
        return Ok(PathBuf::from(custom_dir));
    }

    dirs::config_dir()
        .map(|p| p.join("workbench"))
        .context("Unable to determine config directory for the current platform")
}

/// Get the data directory for the current platform
pub fn data_dir() -> Result<PathBuf> {
    if let Ok(custom_dir) = env::var("WORKBENCH_DATA_DIR") {
        return Ok(PathBuf::from(custom_dir));
    }

    dirs::data_dir()
        .map(|p| p.join("workbench"))
        .context("Unable to determine data directory for the current platform")
}

/// Default location of the user settings JSON document
pub fn user_settings_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("settings.json"))
}

/// Default location of the service settings TOML file
pub fn service_settings_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("services.toml"))
}

/// Default location of the persistent item store
pub fn storage_database() -> Result<PathBuf> {
    Ok(data_dir()?.join("storage.db"))
}

/// Platform-specific path configuration
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl PlatformPaths {
    /// Create platform-specific paths with defaults
    pub fn new() -> Result<Self> {
        Ok(Self {
            config_dir: config_dir()?,
            data_dir: data_dir()?,
        })
    }

    /// Ensure all directories exist
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir)
            .with_context(|| format!("Failed to create config directory: {:?}", self.config_dir))?;
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        Ok(())
    }
}

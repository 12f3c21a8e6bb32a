//! Validation of service settings

use super::ServiceSettings;
use crate::core::errors::SettingsError;
use std::path::{Component, Path};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate settings, reporting the first offending field
pub fn validate_settings(settings: &ServiceSettings) -> Result<(), SettingsError> {
    if settings.storage.change_debounce_ms == 0 {
        return Err(invalid(
            "storage.change_debounce_ms",
            "debounce window must be greater than 0",
        ));
    }

    if settings.storage.event_capacity == 0 {
        return Err(invalid(
            "storage.event_capacity",
            "event capacity must be greater than 0",
        ));
    }

    validate_folder_settings_path(&settings.configuration.folder_settings_path)?;

    if !LOG_LEVELS.contains(&settings.logging.level.to_lowercase().as_str()) {
        return Err(invalid(
            "logging.level",
            &format!(
                "unknown level '{}', expected one of {}",
                settings.logging.level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }

    Ok(())
}

fn validate_folder_settings_path(path: &str) -> Result<(), SettingsError> {
    const FIELD: &str = "configuration.folder_settings_path";

    if path.trim().is_empty() {
        return Err(invalid(FIELD, "path must not be empty"));
    }

    let parsed = Path::new(path);
    if parsed.is_absolute() || path.starts_with('/') {
        return Err(invalid(FIELD, "path must be relative to the folder"));
    }

    if parsed
        .components()
        .any(|component| matches!(component, Component::ParentDir))
    {
        return Err(invalid(FIELD, "path must not leave the folder"));
    }

    Ok(())
}

fn invalid(field: &str, reason: &str) -> SettingsError {
    SettingsError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

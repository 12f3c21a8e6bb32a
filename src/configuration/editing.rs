//! Persisting configuration writes
//!
//! The service hands writes to a [`ConfigurationEditing`] collaborator and folder list
//! changes to a [`WorkspaceFoldersPersister`]. Both are bound after the service is
//! constructed, because the stock [`JsonConfigurationEditor`] in turn asks the service
//! where each layer's settings live.

use super::files::FileService;
use super::parser::is_override_key;
use super::sources::{WORKSPACE_FOLDERS_KEY, WORKSPACE_SETTINGS_KEY};
use super::target::{ConfigurationOverrides, ConfigurationTarget};
use super::workspace::StoredWorkspaceFolder;
use crate::core::errors::{ConfigurationError, ParseError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::{Arc, Weak};
use tracing::{debug, info};
use url::Url;

/// A key and the value to write; `None` removes the key
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationValue {
    pub key: String,
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    pub scopes: ConfigurationOverrides,
    pub suppress_error_notification: bool,
}

/// Writes one setting into the document backing a layer
#[async_trait]
pub trait ConfigurationEditing: Send + Sync {
    async fn write_configuration(
        &self,
        target: ConfigurationTarget,
        value: ConfigurationValue,
        options: WriteOptions,
    ) -> Result<(), ConfigurationError>;
}

/// Replaces the folder list of the workspace file
#[async_trait]
pub trait WorkspaceFoldersPersister: Send + Sync {
    async fn set_folders(&self, folders: Vec<StoredWorkspaceFolder>) -> Result<(), ConfigurationError>;
}

/// Where the settings of a layer are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsLocation {
    pub resource: Url,
    /// Top-level member holding the settings, `settings` in a workspace file
    pub section: Option<String>,
}

/// Answers where each layer's settings are stored
pub trait SettingsLocator: Send + Sync {
    fn settings_location(
        &self,
        target: ConfigurationTarget,
        overrides: &ConfigurationOverrides,
    ) -> Result<SettingsLocation, ConfigurationError>;

    fn workspace_file(&self) -> Option<Url>;
}

/// Editor that rewrites settings JSON documents through a [`FileService`]
pub struct JsonConfigurationEditor {
    files: Arc<dyn FileService>,
    locator: Weak<dyn SettingsLocator>,
}

impl JsonConfigurationEditor {
    pub fn new(files: Arc<dyn FileService>, locator: Weak<dyn SettingsLocator>) -> Self {
        Self { files, locator }
    }

    fn locator(&self) -> Result<Arc<dyn SettingsLocator>, ConfigurationError> {
        self.locator.upgrade().ok_or(ConfigurationError::NotInitialized)
    }

    async fn read_document(&self, resource: &Url) -> Result<Map<String, Value>, DocumentError> {
        let content = match self.files.read_file(resource).await {
            Ok(content) => content,
            Err(e) if e.is_not_found() => return Ok(Map::new()),
            Err(e) => return Err(DocumentError::File(e)),
        };
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(document)) => Ok(document),
            Ok(_) => Err(DocumentError::Parse(ParseError::InvalidFormat {
                context: resource.to_string(),
                expected: "object".to_string(),
                found: "another JSON value".to_string(),
            })),
            Err(e) => Err(DocumentError::Parse(ParseError::json_error(resource.to_string(), e))),
        }
    }

    async fn write_document(&self, resource: &Url, document: Map<String, Value>) -> Result<(), DocumentError> {
        let mut content = serde_json::to_string_pretty(&Value::Object(document))
            .map_err(|e| DocumentError::Parse(ParseError::json_error(resource.to_string(), e)))?;
        content.push('\n');
        self.files
            .write_file(resource, &content)
            .await
            .map_err(DocumentError::File)
    }
}

/// Failure while rewriting a document
#[derive(Debug, thiserror::Error)]
enum DocumentError {
    #[error(transparent)]
    File(crate::core::errors::FileError),
    #[error(transparent)]
    Parse(ParseError),
}

/// Set or remove `key` in a settings object, inside `[identifier]` when given
fn edit_settings(settings: &mut Map<String, Value>, key: &str, value: Option<Value>, identifier: Option<&str>) {
    let target = match identifier {
        Some(identifier) => {
            let section_key = format!("[{}]", identifier);
            let section = settings
                .entry(section_key)
                .or_insert_with(|| Value::Object(Map::new()));
            if !section.is_object() {
                *section = Value::Object(Map::new());
            }
            match section {
                Value::Object(section) => section,
                _ => return,
            }
        }
        None => &mut *settings,
    };

    match value {
        Some(value) => {
            target.insert(key.to_string(), value);
        }
        None => {
            target.remove(key);
        }
    }

    settings.retain(|key, value| !is_override_key(key) || value.as_object().map_or(true, |section| !section.is_empty()));
}

#[async_trait]
impl ConfigurationEditing for JsonConfigurationEditor {
    async fn write_configuration(
        &self,
        target: ConfigurationTarget,
        value: ConfigurationValue,
        options: WriteOptions,
    ) -> Result<(), ConfigurationError> {
        if !target.is_persisted() {
            return Err(ConfigurationError::InvalidTarget { target });
        }
        let location = self.locator()?.settings_location(target, &options.scopes)?;
        let key = value.key.clone();
        let editing_error = |e: DocumentError| ConfigurationError::editing(key.clone(), target, e);

        let mut document = self.read_document(&location.resource).await.map_err(editing_error)?;
        match &location.section {
            Some(section) => {
                let entry = document
                    .entry(section.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !entry.is_object() {
                    *entry = Value::Object(Map::new());
                }
                if let Value::Object(settings) = entry {
                    edit_settings(
                        settings,
                        &value.key,
                        value.value,
                        options.scopes.override_identifier.as_deref(),
                    );
                }
            }
            None => edit_settings(
                &mut document,
                &value.key,
                value.value,
                options.scopes.override_identifier.as_deref(),
            ),
        }

        self.write_document(&location.resource, document)
            .await
            .map_err(editing_error)?;
        debug!("Wrote {} to {} settings at {}", value.key, target, location.resource);
        Ok(())
    }
}

#[async_trait]
impl WorkspaceFoldersPersister for JsonConfigurationEditor {
    async fn set_folders(&self, folders: Vec<StoredWorkspaceFolder>) -> Result<(), ConfigurationError> {
        let resource = self
            .locator()?
            .workspace_file()
            .ok_or(ConfigurationError::NoWorkspace {
                target: ConfigurationTarget::Workspace,
            })?;

        let mut document = self
            .read_document(&resource)
            .await
            .map_err(ConfigurationError::workspace_folders)?;
        let count = folders.len();
        let folders = serde_json::to_value(folders)
            .map_err(|e| ConfigurationError::workspace_folders(ParseError::json_error(resource.to_string(), e)))?;
        document.insert(WORKSPACE_FOLDERS_KEY.to_string(), folders);
        if !document.contains_key(WORKSPACE_SETTINGS_KEY) {
            document.insert(WORKSPACE_SETTINGS_KEY.to_string(), Value::Object(Map::new()));
        }

        self.write_document(&resource, document)
            .await
            .map_err(ConfigurationError::workspace_folders)?;
        info!("Saved {} workspace folders to {}", count, resource);
        Ok(())
    }
}

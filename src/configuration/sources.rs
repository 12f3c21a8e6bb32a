//! Settings files backing the configuration layers
//!
//! Each persisted layer is backed by one document: the local and remote user settings
//! files, the workspace file of a multi-folder workspace (its `settings` section), and
//! one settings file per workspace folder. Reading is async; parsing is synchronous so
//! it can run while the service holds its state lock.

use super::files::FileService;
use super::model::ConfigurationModel;
use super::parser::ConfigurationModelParser;
use super::registry::ConfigurationRegistry;
use super::target::ConfigurationScope;
use super::workspace::StoredWorkspaceFolder;
use crate::core::errors::ParseError;
use crate::core::resources;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

pub const WORKSPACE_FOLDERS_KEY: &str = "folders";
pub const WORKSPACE_SETTINGS_KEY: &str = "settings";

/// Read a settings document. Missing or unreadable files read as absent.
pub async fn read_settings(files: &dyn FileService, resource: &Url) -> Option<String> {
    match files.read_file(resource).await {
        Ok(content) => Some(content),
        Err(e) if e.is_not_found() => {
            debug!("Settings file {} does not exist", resource);
            None
        }
        Err(e) => {
            warn!("Failed to read settings file {}: {}", resource, e);
            None
        }
    }
}

/// A settings file parsed for one layer
#[derive(Debug, Clone)]
pub struct SettingsFile {
    resource: Url,
    parser: ConfigurationModelParser,
}

impl SettingsFile {
    pub fn new(name: impl Into<String>, resource: Url, scopes: Option<&[ConfigurationScope]>) -> Self {
        Self {
            resource,
            parser: ConfigurationModelParser::new(name, scopes),
        }
    }

    pub fn resource(&self) -> &Url {
        &self.resource
    }

    pub fn model(&self) -> &ConfigurationModel {
        self.parser.model()
    }

    pub fn errors(&self) -> &[String] {
        self.parser.errors()
    }

    /// Parse freshly read content; `None` means the file does not exist
    pub fn apply(&mut self, content: Option<&str>, registry: &ConfigurationRegistry) {
        self.parser.parse(content.unwrap_or_default(), registry);
    }

    pub fn reparse(&mut self, registry: &ConfigurationRegistry) {
        self.parser.reparse(registry);
    }
}

/// Contents of a workspace file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkspaceDocument {
    pub folders: Vec<StoredWorkspaceFolder>,
    pub settings: Map<String, Value>,
    pub errors: Vec<String>,
}

impl WorkspaceDocument {
    /// Parse a workspace file. Malformed folder entries are skipped.
    pub fn parse(name: &str, content: Option<&str>) -> Self {
        let Some(content) = content.filter(|content| !content.trim().is_empty()) else {
            return Self::default();
        };

        let document = match serde_json::from_str::<Value>(content) {
            Ok(Value::Object(document)) => document,
            Ok(_) => {
                let err = ParseError::InvalidFormat {
                    context: name.to_string(),
                    expected: "object".to_string(),
                    found: "another JSON value".to_string(),
                };
                warn!("{}", err);
                return Self {
                    errors: vec![err.to_string()],
                    ..Self::default()
                };
            }
            Err(e) => {
                let err = ParseError::json_error(name, e);
                warn!("{}", err);
                return Self {
                    errors: vec![err.to_string()],
                    ..Self::default()
                };
            }
        };

        let folders = match document.get(WORKSPACE_FOLDERS_KEY) {
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(|entry| match serde_json::from_value(entry.clone()) {
                    Ok(folder) => Some(folder),
                    Err(e) => {
                        warn!("{}: skipping folder entry {}: {}", name, entry, e);
                        None
                    }
                })
                .collect(),
            _ => Vec::new(),
        };
        let settings = match document.get(WORKSPACE_SETTINGS_KEY) {
            Some(Value::Object(settings)) => settings.clone(),
            _ => Map::new(),
        };

        Self {
            folders,
            settings,
            errors: Vec::new(),
        }
    }
}

/// Workspace file of a multi-folder workspace
#[derive(Debug, Clone)]
pub struct WorkspaceFile {
    resource: Url,
    folders: Vec<StoredWorkspaceFolder>,
    parser: ConfigurationModelParser,
}

impl WorkspaceFile {
    pub fn new(resource: Url, scopes: &[ConfigurationScope]) -> Self {
        Self {
            resource,
            folders: Vec::new(),
            parser: ConfigurationModelParser::new("workspace", Some(scopes)),
        }
    }

    pub fn resource(&self) -> &Url {
        &self.resource
    }

    /// Folder entries as stored in the file
    pub fn folders(&self) -> &[StoredWorkspaceFolder] {
        &self.folders
    }

    /// Model of the `settings` section
    pub fn model(&self) -> &ConfigurationModel {
        self.parser.model()
    }

    pub fn apply(&mut self, document: WorkspaceDocument, registry: &ConfigurationRegistry) {
        self.folders = document.folders;
        self.parser.parse_raw(document.settings, registry);
    }

    pub fn reparse(&mut self, registry: &ConfigurationRegistry) {
        self.parser.reparse(registry);
    }
}

/// Settings file of a workspace folder
pub fn folder_settings_resource(folder: &Url, folder_settings_path: &str) -> Url {
    resources::join_path(folder, folder_settings_path)
}

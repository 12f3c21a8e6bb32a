/// Domain-specific error types for the workbench services using thiserror
///
/// Every subsystem reports failures through one of the enums below so callers can
/// match on the kind of failure (rejected target, unknown IPC call, unreadable file)
/// instead of inspecting strings.
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

use crate::configuration::target::ConfigurationTarget;

/// Main error type for workbench service operations
#[derive(Error, Debug)]
pub enum WorkbenchError {
    #[error("File operation failed")]
    File(#[from] FileError),

    #[error("Parsing failed")]
    Parse(#[from] ParseError),

    #[error("Configuration error")]
    Configuration(#[from] ConfigurationError),

    #[error("Storage operation failed")]
    Storage(#[from] StorageError),

    #[error("IPC call failed")]
    Ipc(#[from] IpcError),

    #[error("Service settings error")]
    Settings(#[from] SettingsError),
}

/// File access errors reported by a file service
#[derive(Error, Debug)]
pub enum FileError {
    #[error("File not found: {resource}")]
    NotFound { resource: Url },

    #[error("Failed to read {resource}: {reason}")]
    ReadFailed {
        resource: Url,
        reason: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {resource}: {reason}")]
    WriteFailed {
        resource: Url,
        reason: String,
        #[source]
        source: io::Error,
    },

    #[error("Resource {resource} is not a file")]
    NotAFile { resource: Url },

    #[error("Unsupported resource scheme '{scheme}' for {resource}")]
    UnsupportedScheme { scheme: String, resource: Url },

    #[error("Invalid file path: {path}")]
    InvalidPath { path: String },
}

/// Parsing errors for settings documents and service settings
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("JSON parsing failed in {context}: {message}")]
    Json {
        context: String,
        message: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("TOML parsing failed in {context}: {message}")]
    Toml {
        context: String,
        message: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid format in {context}: expected {expected}, found {found}")]
    InvalidFormat {
        context: String,
        expected: String,
        found: String,
    },
}

/// Errors raised by the configuration service
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Unable to write to {target} settings: the target is read-only")]
    InvalidTarget { target: ConfigurationTarget },

    #[error("Unable to write to remote user settings: no remote configuration is available")]
    NoRemoteConfiguration,

    #[error("Unable to write to {target} settings: no workspace is opened")]
    NoWorkspace { target: ConfigurationTarget },

    #[error("Unable to write to folder settings: {resource} is not inside a workspace folder")]
    NoWorkspaceFolder { resource: String },

    #[error("Unable to write to folder settings: no resource was provided")]
    MissingResource,

    #[error("Configuration service is not initialized")]
    NotInitialized,

    #[error("Failed to write {key} to {target} settings: {reason}")]
    Editing {
        key: String,
        target: ConfigurationTarget,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Failed to update workspace folders: {reason}")]
    WorkspaceFolders {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Failed to load {source_name} settings")]
    Load {
        source_name: String,
        #[source]
        source: FileError,
    },
}

/// Errors raised by the main-process item store
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage database error during {operation}: {message}")]
    Database {
        operation: String,
        message: String,
        #[source]
        source: sled::Error,
    },

    #[error("Stored value for {key} is not valid UTF-8")]
    InvalidValue { key: String },

    #[error("Storage is closed")]
    Closed,
}

/// Errors crossing the IPC boundary
#[derive(Error, Debug)]
pub enum IpcError {
    #[error("Unknown call: {command}")]
    UnknownCommand { command: String },

    #[error("Unknown event: {event}")]
    UnknownEvent { event: String },

    #[error("Malformed argument for {command}: {reason}")]
    InvalidArgument { command: String, reason: String },

    #[error("Malformed payload for event {event}: {reason}")]
    InvalidEvent { event: String, reason: String },

    #[error("Remote call {command} failed")]
    Remote {
        command: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Channel is closed")]
    Closed,
}

/// Service settings errors
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Invalid service setting {field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("Service settings file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to read service settings {path}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse service settings")]
    Parse(#[from] ParseError),
}

// From trait implementations for error conversions

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Database {
            operation: "storage_operation".to_string(),
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for IpcError {
    fn from(err: serde_json::Error) -> Self {
        IpcError::InvalidArgument {
            command: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<StorageError> for IpcError {
    fn from(err: StorageError) -> Self {
        IpcError::Remote {
            command: "storage".to_string(),
            source: Box::new(err),
        }
    }
}

/// Helper functions for common error patterns
impl FileError {
    pub fn read_error(resource: Url, source: io::Error) -> Self {
        FileError::ReadFailed {
            resource,
            reason: source.to_string(),
            source,
        }
    }

    pub fn write_error(resource: Url, source: io::Error) -> Self {
        FileError::WriteFailed {
            resource,
            reason: source.to_string(),
            source,
        }
    }

    /// Whether the failure only means the resource is absent
    pub fn is_not_found(&self) -> bool {
        match self {
            FileError::NotFound { .. } => true,
            FileError::ReadFailed { source, .. } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

impl ParseError {
    pub fn json_error(context: impl Into<String>, source: serde_json::Error) -> Self {
        ParseError::Json {
            context: context.into(),
            message: source.to_string(),
            source,
        }
    }

    pub fn toml_error(context: impl Into<String>, source: toml::de::Error) -> Self {
        ParseError::Toml {
            context: context.into(),
            message: source.to_string(),
            source,
        }
    }
}

impl ConfigurationError {
    pub fn editing(
        key: impl Into<String>,
        target: ConfigurationTarget,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConfigurationError::Editing {
            key: key.into(),
            target,
            reason: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    pub fn workspace_folders(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        ConfigurationError::WorkspaceFolders {
            reason: source.to_string(),
            source: Some(Box::new(source)),
        }
    }
}

//! Layered workspace configuration
//!
//! Settings are merged from seven layers, lowest precedence first: defaults, local
//! user, remote user, workspace, workspace folder, and an in-memory layer. Each layer
//! is a [`ConfigurationModel`]; the [`WorkspaceService`] keeps them in sync with their
//! settings files and owns the folder list of the open workspace.

pub mod change_event;
#[allow(clippy::module_inception)]
pub mod configuration;
pub mod editing;
pub mod files;
pub mod folders;
pub mod model;
pub mod parser;
pub mod registry;
pub mod schema;
pub mod service;
pub mod sources;
pub mod target;
pub mod workspace;

pub use change_event::ConfigurationChangeEvent;
pub use configuration::{Configuration, ConfigurationKeys, InspectValue};
pub use editing::{
    ConfigurationEditing, ConfigurationValue, JsonConfigurationEditor, SettingsLocation, SettingsLocator,
    WorkspaceFoldersPersister, WriteOptions,
};
pub use files::{DiskFileService, FileService, FileStat, InMemoryFileService};
pub use model::{ConfigurationChange, ConfigurationModel};
pub use parser::ConfigurationModelParser;
pub use registry::{ConfigurationPropertySchema, ConfigurationRegistry};
pub use schema::{InMemorySchemaRegistry, JsonSchemaRegistry};
pub use service::{ConfigurationLocations, WorkspaceService};
pub use target::{ConfigurationOverrides, ConfigurationScope, ConfigurationTarget, UpdateOptions};
pub use workspace::{
    StoredWorkspaceFolder, WorkbenchState, Workspace, WorkspaceFolder, WorkspaceFolderCreationData,
    WorkspaceFoldersChangeEvent, WorkspaceInitializationPayload,
};

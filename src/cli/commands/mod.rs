use anyhow::Result;
use async_trait::async_trait;

pub mod config;
pub mod folders;
pub mod storage;

/// Trait for CLI command implementations
#[async_trait]
pub trait Command {
    /// Execute the command with the given arguments
    async fn execute(&self) -> Result<()>;
}

/// Common utilities for command implementations
pub mod utils {
    use crate::cli::args::WorkspaceArgs;
    use crate::config::ServiceSettings;
    use crate::configuration::{
        ConfigurationLocations, ConfigurationOverrides, ConfigurationRegistry, DiskFileService,
        WorkspaceInitializationPayload, WorkspaceService,
    };
    use anyhow::{anyhow, Context, Result};
    use serde_json::Value;
    use std::path::Path;
    use std::sync::Arc;
    use url::Url;

    /// Absolute `file:` URL for a path given on the command line
    pub fn path_to_url(path: &Path) -> Result<Url> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };
        let absolute = absolute.canonicalize().unwrap_or(absolute);
        Url::from_file_path(&absolute).map_err(|_| anyhow!("{} is not a valid path", absolute.display()))
    }

    /// Parse a command-line value as JSON, falling back to a plain string
    pub fn parse_value(raw: &str) -> Value {
        serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
    }

    pub fn overrides(resource: Option<&Path>, language: Option<&str>) -> Result<ConfigurationOverrides> {
        Ok(ConfigurationOverrides {
            resource: resource.map(path_to_url).transpose()?,
            override_identifier: language.map(str::to_string),
        })
    }

    /// Open the workspace selected on the command line, with the JSON editor bound
    pub async fn open_workspace(settings: &ServiceSettings, args: &WorkspaceArgs) -> Result<WorkspaceService> {
        let locations = ConfigurationLocations::from_settings(&settings.configuration)?;
        let service = WorkspaceService::new(
            &settings.configuration,
            Arc::new(DiskFileService::new()),
            Arc::new(ConfigurationRegistry::new()),
            locations,
            None,
        );
        service.bind_json_editor();

        let payload = match (&args.workspace, &args.folder) {
            (Some(file), _) => WorkspaceInitializationPayload::Workspace {
                id: file.display().to_string(),
                configuration: path_to_url(file)?,
            },
            (None, Some(folder)) => WorkspaceInitializationPayload::Folder {
                id: folder.display().to_string(),
                uri: path_to_url(folder)?,
            },
            (None, None) => WorkspaceInitializationPayload::Empty {
                id: "empty".to_string(),
            },
        };
        service
            .initialize(payload)
            .await
            .context("Failed to open workspace")?;
        Ok(service)
    }

}

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::cli::args::{ConfigAction, WorkspaceArgs};
use crate::cli::commands::utils::{open_workspace, overrides, parse_value};
use crate::cli::commands::Command;
use crate::config::ServiceSettings;
use crate::configuration::{ConfigurationTarget, UpdateOptions};

pub struct ConfigCommand {
    action: ConfigAction,
    settings: ServiceSettings,
    workspace: WorkspaceArgs,
}

impl ConfigCommand {
    pub fn new(action: ConfigAction, settings: ServiceSettings, workspace: WorkspaceArgs) -> Self {
        Self {
            action,
            settings,
            workspace,
        }
    }
}

fn parse_target(target: Option<&str>) -> Result<Option<ConfigurationTarget>> {
    target
        .map(|target| {
            target
                .parse::<ConfigurationTarget>()
                .map_err(|e| anyhow!(e))
        })
        .transpose()
}

#[async_trait]
impl Command for ConfigCommand {
    async fn execute(&self) -> Result<()> {
        let service = open_workspace(&self.settings, &self.workspace).await?;

        match &self.action {
            ConfigAction::Get {
                key,
                resource,
                language,
            } => {
                let overrides = overrides(resource.as_deref(), language.as_deref())?;
                match service.get_value(key.as_deref(), &overrides) {
                    Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                    None => eprintln!("{} is not set", key.as_deref().unwrap_or("configuration")),
                }
            }

            ConfigAction::Inspect {
                key,
                resource,
                language,
            } => {
                let overrides = overrides(resource.as_deref(), language.as_deref())?;
                let inspect = service.inspect(key, &overrides);
                println!("{}", serde_json::to_string_pretty(&inspect)?);
            }

            ConfigAction::Set {
                key,
                value,
                target,
                resource,
                language,
            } => {
                let overrides = overrides(resource.as_deref(), language.as_deref())?;
                let options = UpdateOptions {
                    overrides,
                    target: parse_target(target.as_deref())?,
                    suppress_error_notification: false,
                };
                service.update_value(key, Some(parse_value(value)), options).await?;
                eprintln!("Updated {}", key);
            }

            ConfigAction::Unset { key, target, resource } => {
                let options = UpdateOptions {
                    overrides: overrides(resource.as_deref(), None)?,
                    target: parse_target(target.as_deref())?,
                    suppress_error_notification: false,
                };
                service.update_value(key, None, options).await?;
                eprintln!("Removed {}", key);
            }

            ConfigAction::Keys => {
                println!("{}", serde_json::to_string_pretty(&service.keys())?);
            }
        }

        Ok(())
    }
}

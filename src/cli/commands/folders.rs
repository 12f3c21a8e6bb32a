use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::cli::args::{FoldersAction, WorkspaceArgs};
use crate::cli::commands::utils::{open_workspace, path_to_url};
use crate::cli::commands::Command;
use crate::config::ServiceSettings;
use crate::configuration::{WorkbenchState, WorkspaceFolderCreationData};

pub struct FoldersCommand {
    action: FoldersAction,
    settings: ServiceSettings,
    workspace: WorkspaceArgs,
}

impl FoldersCommand {
    pub fn new(action: FoldersAction, settings: ServiceSettings, workspace: WorkspaceArgs) -> Self {
        Self {
            action,
            settings,
            workspace,
        }
    }
}

#[async_trait]
impl Command for FoldersCommand {
    async fn execute(&self) -> Result<()> {
        let service = open_workspace(&self.settings, &self.workspace).await?;

        match &self.action {
            FoldersAction::List => {
                let folders = service
                    .get_workspace()
                    .map(|workspace| workspace.folders().to_vec())
                    .unwrap_or_default();
                for folder in folders {
                    println!("{}\t{}\t{}", folder.index, folder.name, folder.uri);
                }
            }

            FoldersAction::Add { paths, index, name } => {
                if service.get_workbench_state() != WorkbenchState::Workspace {
                    bail!("Folders can only be added to a multi-folder workspace (use --workspace)");
                }
                if name.is_some() && paths.len() > 1 {
                    bail!("--name can only be used when adding a single folder");
                }

                let mut folders = Vec::with_capacity(paths.len());
                for path in paths {
                    let uri = path_to_url(path)?;
                    folders.push(match name {
                        Some(name) => WorkspaceFolderCreationData::named(uri, name.clone()),
                        None => WorkspaceFolderCreationData::new(uri),
                    });
                }
                service.add_folders(folders, *index).await?;
                eprintln!(
                    "Workspace has {} folder(s)",
                    service.get_workspace().map_or(0, |workspace| workspace.folders().len())
                );
            }

            FoldersAction::Remove { paths } => {
                if service.get_workbench_state() != WorkbenchState::Workspace {
                    bail!("Folders can only be removed from a multi-folder workspace (use --workspace)");
                }
                let uris = paths.iter().map(|path| path_to_url(path)).collect::<Result<Vec<_>>>()?;
                service.remove_folders(uris).await?;
                eprintln!(
                    "Workspace has {} folder(s)",
                    service.get_workspace().map_or(0, |workspace| workspace.folders().len())
                );
            }
        }

        Ok(())
    }
}

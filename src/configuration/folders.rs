//! Folder list updates for multi-folder workspaces

use super::files::FileService;
use super::workspace::{StoredWorkspaceFolder, WorkspaceFolderCreationData};
use crate::core::resources;
use tracing::debug;
use url::Url;

/// Stored folder list after an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderUpdate {
    pub folders: Vec<StoredWorkspaceFolder>,
    pub added: usize,
    pub removed: usize,
}

/// Apply removals, then additions, to the folder entries of a workspace file.
///
/// Folders already present are not added again. A folder is only added when `files`
/// resolves it to a directory; a failed probe counts as absent. New entries are
/// spliced in at `index` when it is within the list, appended otherwise. Returns
/// `None` when nothing was removed or added, so the file need not be written.
pub async fn update_stored_folders(
    current: &[StoredWorkspaceFolder],
    workspace_dir: &Url,
    to_add: &[WorkspaceFolderCreationData],
    to_remove: &[Url],
    index: Option<usize>,
    files: &dyn FileService,
) -> Option<FolderUpdate> {
    let mut kept: Vec<(StoredWorkspaceFolder, Option<Url>)> = current
        .iter()
        .map(|stored| (stored.clone(), stored.resolve(workspace_dir)))
        .collect();

    let before = kept.len();
    if !to_remove.is_empty() {
        kept.retain(|(_, uri)| {
            !uri.as_ref()
                .map_or(false, |uri| to_remove.iter().any(|removed| resources::is_equal(uri, removed)))
        });
    }
    let removed = before - kept.len();

    let mut additions: Vec<(StoredWorkspaceFolder, Option<Url>)> = Vec::new();
    for folder in to_add {
        let present = kept
            .iter()
            .chain(additions.iter())
            .any(|(_, uri)| uri.as_ref().map_or(false, |uri| resources::is_equal(uri, &folder.uri)));
        if present {
            debug!("Folder {} is already part of the workspace", folder.uri);
            continue;
        }

        match files.resolve(&folder.uri).await {
            Ok(stat) if stat.is_directory => {
                let stored = StoredWorkspaceFolder::for_folder(&folder.uri, folder.name.clone(), workspace_dir);
                additions.push((stored, Some(resources::normalize(&folder.uri))));
            }
            Ok(_) => debug!("Not adding {}: not a directory", folder.uri),
            Err(e) => debug!("Not adding {}: {}", folder.uri, e),
        }
    }
    let added = additions.len();

    if removed == 0 && added == 0 {
        return None;
    }

    match index {
        Some(index) if index < kept.len() => {
            kept.splice(index..index, additions);
        }
        _ => kept.extend(additions),
    }

    Some(FolderUpdate {
        folders: kept.into_iter().map(|(stored, _)| stored).collect(),
        added,
        removed,
    })
}

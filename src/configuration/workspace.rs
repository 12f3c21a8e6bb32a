//! Workspace identity and folders

use crate::core::resources;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// How many folders are open and whether they come from a workspace file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkbenchState {
    Empty,
    Folder,
    Workspace,
}

impl fmt::Display for WorkbenchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkbenchState::Empty => "empty",
            WorkbenchState::Folder => "folder",
            WorkbenchState::Workspace => "workspace",
        };
        f.write_str(name)
    }
}

/// Folder entry as written in a workspace file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredWorkspaceFolder {
    /// Absolute path, or a path relative to the workspace file
    Path {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Uri {
        uri: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl StoredWorkspaceFolder {
    pub fn name(&self) -> Option<&str> {
        match self {
            StoredWorkspaceFolder::Path { name, .. } | StoredWorkspaceFolder::Uri { name, .. } => {
                name.as_deref()
            }
        }
    }

    /// Location of the folder, given the directory containing the workspace file
    pub fn resolve(&self, workspace_dir: &Url) -> Option<Url> {
        match self {
            StoredWorkspaceFolder::Uri { uri, .. } => Url::parse(uri).ok(),
            StoredWorkspaceFolder::Path { path, .. } => {
                let path = path.replace('\\', "/");
                if is_absolute_path(&path) {
                    if workspace_dir.scheme() == "file" {
                        if let Ok(resolved) = Url::from_file_path(&path) {
                            return Some(resolved);
                        }
                    }
                    // Drive paths off Windows keep the drive as the first path segment
                    let mut resolved = workspace_dir.clone();
                    if path.starts_with('/') {
                        resolved.set_path(&path);
                    } else {
                        resolved.set_path(&format!("/{}", path));
                    }
                    Some(resolved)
                } else {
                    let mut base = resources::normalize(workspace_dir);
                    let directory = format!("{}/", base.path().trim_end_matches('/'));
                    base.set_path(&directory);
                    base.join(&path).ok().map(|url| resources::normalize(&url))
                }
            }
        }
    }

    /// Entry for `folder`, relative to the workspace file when inside its directory
    pub fn for_folder(folder: &Url, name: Option<String>, workspace_dir: &Url) -> Self {
        if let Some(relative) = resources::relative_path(workspace_dir, folder) {
            let path = if relative.is_empty() {
                ".".to_string()
            } else {
                relative
            };
            return StoredWorkspaceFolder::Path { path, name };
        }
        if folder.scheme() == "file" {
            if let Ok(path) = folder.to_file_path() {
                return StoredWorkspaceFolder::Path {
                    path: path.to_string_lossy().into_owned(),
                    name,
                };
            }
        }
        StoredWorkspaceFolder::Uri {
            uri: resources::normalize(folder).to_string(),
            name,
        }
    }
}

/// `/abs` or a drive path such as `C:/abs`; backslashes are already converted
fn is_absolute_path(path: &str) -> bool {
    let bytes = path.as_bytes();
    path.starts_with('/')
        || (bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/')
}

/// One root folder of the workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceFolder {
    pub uri: Url,
    pub name: String,
    pub index: usize,
    /// Entry this folder was read from, when it came from a workspace file
    pub raw: Option<StoredWorkspaceFolder>,
}

impl WorkspaceFolder {
    pub fn new(uri: Url, name: Option<String>, index: usize) -> Self {
        let uri = resources::normalize(&uri);
        let name = name.unwrap_or_else(|| resources::basename(&uri));
        Self {
            uri,
            name,
            index,
            raw: None,
        }
    }

    /// Resource at a folder-relative path
    pub fn to_resource(&self, relative: &str) -> Url {
        resources::join_path(&self.uri, relative)
    }
}

/// Folder to add, with an optional display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceFolderCreationData {
    pub uri: Url,
    pub name: Option<String>,
}

impl WorkspaceFolderCreationData {
    pub fn new(uri: Url) -> Self {
        Self { uri, name: None }
    }

    pub fn named(uri: Url, name: impl Into<String>) -> Self {
        Self {
            uri,
            name: Some(name.into()),
        }
    }
}

/// Resolve workspace-file entries into folders. Entries that do not resolve, or that
/// repeat an earlier folder, are dropped.
pub fn resolve_stored_folders(stored: &[StoredWorkspaceFolder], configuration: &Url) -> Vec<WorkspaceFolder> {
    let workspace_dir = resources::dirname(configuration);
    let mut folders: Vec<WorkspaceFolder> = Vec::new();

    for entry in stored {
        let Some(uri) = entry.resolve(&workspace_dir) else {
            tracing::warn!("Skipping unresolvable workspace folder entry {:?}", entry);
            continue;
        };
        if folders.iter().any(|folder| resources::is_equal(&folder.uri, &uri)) {
            continue;
        }
        let mut folder = WorkspaceFolder::new(uri, entry.name().map(str::to_string), folders.len());
        folder.raw = Some(entry.clone());
        folders.push(folder);
    }
    folders
}

/// The opened workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    id: String,
    folders: Vec<WorkspaceFolder>,
    configuration: Option<Url>,
}

impl Workspace {
    pub fn new(id: impl Into<String>, folders: Vec<WorkspaceFolder>, configuration: Option<Url>) -> Self {
        let mut workspace = Self {
            id: id.into(),
            folders: Vec::new(),
            configuration,
        };
        workspace.set_folders(folders);
        workspace
    }

    pub fn empty(id: impl Into<String>) -> Self {
        Self::new(id, Vec::new(), None)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn folders(&self) -> &[WorkspaceFolder] {
        &self.folders
    }

    /// Workspace file of a multi-folder workspace
    pub fn configuration(&self) -> Option<&Url> {
        self.configuration.as_ref()
    }

    /// Replace the folders, renumbering them and dropping duplicates
    pub fn set_folders(&mut self, folders: Vec<WorkspaceFolder>) {
        let mut unique: Vec<WorkspaceFolder> = Vec::with_capacity(folders.len());
        for mut folder in folders {
            if unique.iter().any(|existing| resources::is_equal(&existing.uri, &folder.uri)) {
                continue;
            }
            folder.index = unique.len();
            unique.push(folder);
        }
        self.folders = unique;
    }

    pub fn state(&self) -> WorkbenchState {
        if self.configuration.is_some() {
            WorkbenchState::Workspace
        } else if self.folders.len() == 1 {
            WorkbenchState::Folder
        } else {
            WorkbenchState::Empty
        }
    }

    /// Display name: the workspace file stem, the folder name, or empty
    pub fn name(&self) -> String {
        match (&self.configuration, self.folders.as_slice()) {
            (Some(configuration), _) => {
                let file = resources::basename(configuration);
                match file.rsplit_once('.') {
                    Some((stem, _)) if !stem.is_empty() => stem.to_string(),
                    _ => file,
                }
            }
            (None, [folder]) => folder.name.clone(),
            _ => String::new(),
        }
    }

    /// Innermost folder containing `resource`
    pub fn get_folder(&self, resource: &Url) -> Option<&WorkspaceFolder> {
        self.folders
            .iter()
            .filter(|folder| resources::is_equal_or_parent(resource, &folder.uri))
            .max_by_key(|folder| folder.uri.path().len())
    }

    pub fn contains(&self, resource: &Url) -> bool {
        self.get_folder(resource).is_some()
    }
}

/// How to open the workspace at start-up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceInitializationPayload {
    Empty { id: String },
    Folder { id: String, uri: Url },
    Workspace { id: String, configuration: Url },
}

impl WorkspaceInitializationPayload {
    pub fn id(&self) -> &str {
        match self {
            WorkspaceInitializationPayload::Empty { id }
            | WorkspaceInitializationPayload::Folder { id, .. }
            | WorkspaceInitializationPayload::Workspace { id, .. } => id,
        }
    }
}

/// Difference between two folder lists
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceFoldersChangeEvent {
    pub added: Vec<WorkspaceFolder>,
    pub removed: Vec<WorkspaceFolder>,
    /// Folders present in both lists whose position or name changed
    pub changed: Vec<WorkspaceFolder>,
}

impl WorkspaceFoldersChangeEvent {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Compare folder lists by URI
pub fn compare_folders(current: &[WorkspaceFolder], new: &[WorkspaceFolder]) -> WorkspaceFoldersChangeEvent {
    let find = |folders: &[WorkspaceFolder], uri: &Url| -> Option<usize> {
        folders
            .iter()
            .position(|folder| resources::is_equal(&folder.uri, uri))
    };

    let added = new
        .iter()
        .filter(|folder| find(current, &folder.uri).is_none())
        .cloned()
        .collect();
    let removed = current
        .iter()
        .filter(|folder| find(new, &folder.uri).is_none())
        .cloned()
        .collect();
    let changed = new
        .iter()
        .enumerate()
        .filter(|(index, folder)| {
            find(current, &folder.uri).map_or(false, |old_index| {
                old_index != *index || current[old_index].name != folder.name
            })
        })
        .map(|(_, folder)| folder.clone())
        .collect();

    WorkspaceFoldersChangeEvent {
        added,
        removed,
        changed,
    }
}

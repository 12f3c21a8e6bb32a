//! The merged configuration
//!
//! [`Configuration`] owns one model per layer and resolves reads through them in
//! precedence order: default, local user, remote user, workspace, folder, memory. The
//! service never mutates a published `Configuration`; it updates a private copy and
//! swaps it in whole.

use super::model::{ConfigurationChange, ConfigurationModel};
use super::target::ConfigurationOverrides;
use super::workspace::Workspace;
use crate::core::resources;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use url::Url;

/// Value of one key in every layer, plus the effective value
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectValue {
    pub key: String,
    pub default_value: Option<Value>,
    /// Local and remote user values merged
    pub user_value: Option<Value>,
    pub user_local_value: Option<Value>,
    pub user_remote_value: Option<Value>,
    pub workspace_value: Option<Value>,
    pub workspace_folder_value: Option<Value>,
    pub memory_value: Option<Value>,
    pub value: Option<Value>,
    /// Identifiers of override sections that define the key in some layer
    pub override_identifiers: Vec<String>,
}

/// Keys defined in each layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationKeys {
    pub default: Vec<String>,
    pub user: Vec<String>,
    pub workspace: Vec<String>,
    pub workspace_folder: Vec<String>,
}

/// Layered configuration snapshot
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    default: ConfigurationModel,
    local_user: ConfigurationModel,
    remote_user: ConfigurationModel,
    workspace: ConfigurationModel,
    folders: BTreeMap<Url, ConfigurationModel>,
    memory: ConfigurationModel,
    memory_by_resource: BTreeMap<Url, ConfigurationModel>,
    /// default + user + workspace, recomputed whenever one of them changes
    consolidated: ConfigurationModel,
}

impl Configuration {
    pub fn new(
        default: ConfigurationModel,
        local_user: ConfigurationModel,
        remote_user: ConfigurationModel,
        workspace: ConfigurationModel,
        folders: BTreeMap<Url, ConfigurationModel>,
    ) -> Self {
        let mut configuration = Self {
            default,
            local_user,
            remote_user,
            workspace,
            folders: folders
                .into_iter()
                .map(|(uri, model)| (resources::normalize(&uri), model))
                .collect(),
            ..Self::default()
        };
        configuration.consolidate();
        configuration
    }

    pub fn default_model(&self) -> &ConfigurationModel {
        &self.default
    }

    pub fn local_user(&self) -> &ConfigurationModel {
        &self.local_user
    }

    pub fn remote_user(&self) -> &ConfigurationModel {
        &self.remote_user
    }

    pub fn workspace(&self) -> &ConfigurationModel {
        &self.workspace
    }

    pub fn folder(&self, folder: &Url) -> Option<&ConfigurationModel> {
        self.folders.get(&resources::normalize(folder))
    }

    pub fn memory(&self) -> &ConfigurationModel {
        &self.memory
    }

    /// Effective value of `section` (or the whole tree) for the given overrides
    pub fn get_value(
        &self,
        section: Option<&str>,
        overrides: &ConfigurationOverrides,
        workspace: Option<&Workspace>,
    ) -> Option<Value> {
        self.effective_model(overrides, workspace).get_value(section)
    }

    pub fn inspect(
        &self,
        key: &str,
        overrides: &ConfigurationOverrides,
        workspace: Option<&Workspace>,
    ) -> InspectValue {
        let identifier = overrides.override_identifier.as_deref();
        let value_in = |model: &ConfigurationModel| -> Option<Value> {
            match identifier {
                Some(identifier) => model.override_config(identifier).get_value(Some(key)),
                None => model.get_value(Some(key)),
            }
        };

        let folder_model = self.folder_model(overrides.resource.as_ref(), workspace);
        let memory_model = self.memory_model(overrides.resource.as_ref());
        let user = self.local_user.merge(&[&self.remote_user]);

        let mut override_identifiers = BTreeSet::new();
        let mut layers: Vec<&ConfigurationModel> =
            vec![&self.default, &self.local_user, &self.remote_user, &self.workspace, &memory_model];
        if let Some(folder) = folder_model {
            layers.push(folder);
        }
        for layer in layers {
            for identifier in layer.override_identifiers() {
                if layer.keys_for_override(&identifier).iter().any(|k| k == key) {
                    override_identifiers.insert(identifier);
                }
            }
        }

        InspectValue {
            key: key.to_string(),
            default_value: value_in(&self.default),
            user_value: value_in(&user),
            user_local_value: value_in(&self.local_user),
            user_remote_value: value_in(&self.remote_user),
            workspace_value: value_in(&self.workspace),
            workspace_folder_value: folder_model.and_then(|folder| value_in(folder)),
            memory_value: value_in(&memory_model),
            value: self.get_value(Some(key), overrides, workspace),
            override_identifiers: override_identifiers.into_iter().collect(),
        }
    }

    pub fn keys(&self) -> ConfigurationKeys {
        let folder_keys: BTreeSet<String> = self
            .folders
            .values()
            .flat_map(|model| model.keys().iter().cloned())
            .collect();
        ConfigurationKeys {
            default: self.default.keys().to_vec(),
            user: self.local_user.merge(&[&self.remote_user]).keys().to_vec(),
            workspace: self.workspace.keys().to_vec(),
            workspace_folder: folder_keys.into_iter().collect(),
        }
    }

    /// Sorted union of the keys of every layer
    pub fn all_keys(&self) -> Vec<String> {
        let mut keys: BTreeSet<String> = BTreeSet::new();
        for model in [
            &self.default,
            &self.local_user,
            &self.remote_user,
            &self.workspace,
            &self.memory,
        ] {
            keys.extend(model.keys().iter().cloned());
        }
        for model in self.folders.values().chain(self.memory_by_resource.values()) {
            keys.extend(model.keys().iter().cloned());
        }
        keys.into_iter().collect()
    }

    pub fn update_default(&mut self, model: ConfigurationModel) -> ConfigurationChange {
        let change = self.default.compare(&model);
        self.default = model;
        self.consolidate();
        change
    }

    pub fn update_local_user(&mut self, model: ConfigurationModel) -> ConfigurationChange {
        let change = self.local_user.compare(&model);
        self.local_user = model;
        self.consolidate();
        change
    }

    pub fn update_remote_user(&mut self, model: ConfigurationModel) -> ConfigurationChange {
        let change = self.remote_user.compare(&model);
        self.remote_user = model;
        self.consolidate();
        change
    }

    pub fn update_workspace(&mut self, model: ConfigurationModel) -> ConfigurationChange {
        let change = self.workspace.compare(&model);
        self.workspace = model;
        self.consolidate();
        change
    }

    pub fn update_folder(&mut self, folder: &Url, model: ConfigurationModel) -> ConfigurationChange {
        let folder = resources::normalize(folder);
        let change = self
            .folders
            .get(&folder)
            .map_or_else(|| ConfigurationModel::empty().compare(&model), |old| old.compare(&model));
        self.folders.insert(folder, model);
        change
    }

    pub fn delete_folder(&mut self, folder: &Url) -> ConfigurationChange {
        match self.folders.remove(&resources::normalize(folder)) {
            Some(old) => old.compare(&ConfigurationModel::empty()),
            None => ConfigurationChange::default(),
        }
    }

    /// Set (or with `None` remove) a value in the in-memory layer
    pub fn update_memory(
        &mut self,
        key: &str,
        value: Option<Value>,
        overrides: &ConfigurationOverrides,
    ) -> ConfigurationChange {
        let model = match &overrides.resource {
            Some(resource) => self
                .memory_by_resource
                .entry(resources::normalize(resource))
                .or_default(),
            None => &mut self.memory,
        };

        let before = model.clone();
        match (value, overrides.override_identifier.as_deref()) {
            (Some(value), Some(identifier)) => model.set_override_value(identifier, key, value),
            (Some(value), None) => model.set_value(key, value),
            (None, Some(identifier)) => model.remove_override_value(identifier, key),
            (None, None) => model.remove_value(key),
        }
        before.compare(model)
    }

    /// Recompute override application for every layer after defaults changed
    pub fn reapply_models(
        &mut self,
        local_user: ConfigurationModel,
        remote_user: ConfigurationModel,
        workspace: ConfigurationModel,
        folders: BTreeMap<Url, ConfigurationModel>,
    ) -> ConfigurationChange {
        let mut changes = vec![
            self.update_local_user(local_user),
            self.update_remote_user(remote_user),
            self.update_workspace(workspace),
        ];
        for (folder, model) in folders {
            changes.push(self.update_folder(&folder, model));
        }
        ConfigurationChange::merge(changes)
    }

    /// Keys that differ between two snapshots, across all layers
    pub fn compare(&self, other: &Configuration) -> ConfigurationChange {
        let mut changes = vec![
            self.default.compare(&other.default),
            self.local_user.compare(&other.local_user),
            self.remote_user.compare(&other.remote_user),
            self.workspace.compare(&other.workspace),
            self.memory.compare(&other.memory),
        ];
        changes.extend(compare_scoped(&self.folders, &other.folders));
        changes.extend(compare_scoped(&self.memory_by_resource, &other.memory_by_resource));
        ConfigurationChange::merge(changes)
    }

    fn consolidate(&mut self) {
        self.consolidated = self
            .default
            .merge(&[&self.local_user, &self.remote_user, &self.workspace]);
    }

    fn folder_model(&self, resource: Option<&Url>, workspace: Option<&Workspace>) -> Option<&ConfigurationModel> {
        let folder = workspace?.get_folder(resource?)?;
        self.folders.get(&resources::normalize(&folder.uri))
    }

    fn memory_model(&self, resource: Option<&Url>) -> ConfigurationModel {
        match resource.and_then(|resource| self.memory_by_resource.get(&resources::normalize(resource))) {
            Some(scoped) => self.memory.merge(&[scoped]),
            None => self.memory.clone(),
        }
    }

    fn effective_model(&self, overrides: &ConfigurationOverrides, workspace: Option<&Workspace>) -> ConfigurationModel {
        let memory = self.memory_model(overrides.resource.as_ref());
        let merged = match self.folder_model(overrides.resource.as_ref(), workspace) {
            Some(folder) => self.consolidated.merge(&[folder, &memory]),
            None => self.consolidated.merge(&[&memory]),
        };
        match overrides.override_identifier.as_deref() {
            Some(identifier) => merged.override_config(identifier),
            None => merged,
        }
    }
}

fn compare_scoped(
    from: &BTreeMap<Url, ConfigurationModel>,
    to: &BTreeMap<Url, ConfigurationModel>,
) -> Vec<ConfigurationChange> {
    let empty = ConfigurationModel::empty();
    let resources: BTreeSet<&Url> = from.keys().chain(to.keys()).collect();
    resources
        .into_iter()
        .map(|resource| {
            let before = from.get(resource).unwrap_or(&empty);
            let after = to.get(resource).unwrap_or(&empty);
            before.compare(after)
        })
        .collect()
}

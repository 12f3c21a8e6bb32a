//! Workspace configuration service
//!
//! Owns the settings sources of every layer, the merged [`Configuration`] snapshot and
//! the workspace folder list. Readers load the current snapshot without waiting; writers
//! wait for initialization, go through the bound editing collaborators, and reload the
//! source they touched. Source state is guarded by a lock that is never held across an
//! await or while listeners run.

use super::change_event::ConfigurationChangeEvent;
use super::configuration::{Configuration, ConfigurationKeys, InspectValue};
use super::editing::{
    ConfigurationEditing, ConfigurationValue, JsonConfigurationEditor, SettingsLocation, SettingsLocator,
    WorkspaceFoldersPersister, WriteOptions,
};
use super::files::FileService;
use super::folders::update_stored_folders;
use super::model::{ConfigurationChange, ConfigurationModel};
use super::registry::ConfigurationRegistry;
use super::schema::{self, JsonSchemaRegistry};
use super::sources::{
    folder_settings_resource, read_settings, SettingsFile, WorkspaceDocument, WorkspaceFile,
    WORKSPACE_SETTINGS_KEY,
};
use super::target::{
    ConfigurationOverrides, ConfigurationTarget, UpdateOptions, FOLDER_SCOPES, REMOTE_USER_SCOPES,
    WORKSPACE_SCOPES,
};
use super::workspace::{
    compare_folders, resolve_stored_folders, WorkbenchState, Workspace, WorkspaceFolder,
    WorkspaceFolderCreationData, WorkspaceFoldersChangeEvent, WorkspaceInitializationPayload,
};
use crate::config::{paths, ConfigurationSettings};
use crate::core::errors::{ConfigurationError, SettingsError};
use crate::core::{resources, Barrier, Emitter, Subscription};
use arc_swap::ArcSwap;
use futures::future::join_all;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};
use url::Url;

/// Where the user-level settings files live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationLocations {
    pub user_settings: Url,
    pub remote_user_settings: Option<Url>,
}

impl ConfigurationLocations {
    pub fn new(user_settings: Url) -> Self {
        Self {
            user_settings,
            remote_user_settings: None,
        }
    }

    pub fn with_remote(mut self, remote_user_settings: Url) -> Self {
        self.remote_user_settings = Some(remote_user_settings);
        self
    }

    /// Locations from service settings, falling back to the platform user settings file
    pub fn from_settings(settings: &ConfigurationSettings) -> Result<Self, SettingsError> {
        let user_settings = match &settings.user_settings {
            Some(path) => path.clone(),
            None => paths::user_settings_file().map_err(|e| SettingsError::Invalid {
                field: "configuration.user_settings".to_string(),
                reason: e.to_string(),
            })?,
        };

        let to_url = |field: &str, path: &std::path::Path| {
            Url::from_file_path(path).map_err(|_| SettingsError::Invalid {
                field: field.to_string(),
                reason: format!("{} is not an absolute path", path.display()),
            })
        };

        Ok(Self {
            user_settings: to_url("configuration.user_settings", &user_settings)?,
            remote_user_settings: settings
                .remote_user_settings
                .as_deref()
                .map(|path| to_url("configuration.remote_user_settings", path))
                .transpose()?,
        })
    }
}

#[derive(Clone)]
struct EditingServices {
    editor: Arc<dyn ConfigurationEditing>,
    persister: Arc<dyn WorkspaceFoldersPersister>,
}

#[derive(Debug, Default)]
struct Snapshot {
    configuration: Arc<Configuration>,
    workspace: Option<Arc<Workspace>>,
}

struct SourceState {
    local_user: SettingsFile,
    remote_user: Option<SettingsFile>,
    workspace_file: Option<WorkspaceFile>,
    folders: BTreeMap<Url, SettingsFile>,
}

impl SourceState {
    fn remote_model(&self) -> ConfigurationModel {
        self.remote_user
            .as_ref()
            .map(|file| file.model().clone())
            .unwrap_or_default()
    }

    /// A single-folder workspace reads its workspace layer from the folder settings
    fn workspace_model(&self, state: WorkbenchState) -> ConfigurationModel {
        match state {
            WorkbenchState::Workspace => self
                .workspace_file
                .as_ref()
                .map(|file| file.model().clone())
                .unwrap_or_default(),
            WorkbenchState::Folder => self
                .folders
                .values()
                .next()
                .map(|file| file.model().clone())
                .unwrap_or_default(),
            WorkbenchState::Empty => ConfigurationModel::empty(),
        }
    }

    fn folder_models(&self) -> BTreeMap<Url, ConfigurationModel> {
        self.folders
            .iter()
            .map(|(uri, file)| (uri.clone(), file.model().clone()))
            .collect()
    }

    fn reparse(&mut self, registry: &ConfigurationRegistry) {
        self.local_user.reparse(registry);
        if let Some(remote) = self.remote_user.as_mut() {
            remote.reparse(registry);
        }
        if let Some(workspace) = self.workspace_file.as_mut() {
            workspace.reparse(registry);
        }
        for file in self.folders.values_mut() {
            file.reparse(registry);
        }
    }
}

#[derive(Default)]
struct ServiceEvents {
    configuration: Emitter<ConfigurationChangeEvent>,
    folders: Emitter<WorkspaceFoldersChangeEvent>,
    state: Emitter<WorkbenchState>,
    name: Emitter<String>,
}

struct ServiceInner {
    folder_settings_path: String,
    files: Arc<dyn FileService>,
    registry: Arc<ConfigurationRegistry>,
    schema_registry: Option<Arc<dyn JsonSchemaRegistry>>,
    locations: ConfigurationLocations,
    sources: Mutex<SourceState>,
    snapshot: ArcSwap<Snapshot>,
    initialized: Barrier,
    editing_ready: Barrier,
    editing: OnceCell<EditingServices>,
    folder_queue: tokio::sync::Mutex<()>,
    events: ServiceEvents,
}

/// Layered settings for a workspace
pub struct WorkspaceService {
    inner: Arc<ServiceInner>,
    _registry_subscription: Subscription,
}

impl WorkspaceService {
    pub fn new(
        settings: &ConfigurationSettings,
        files: Arc<dyn FileService>,
        registry: Arc<ConfigurationRegistry>,
        locations: ConfigurationLocations,
        schema_registry: Option<Arc<dyn JsonSchemaRegistry>>,
    ) -> Self {
        let configuration = Configuration::new(
            registry.default_model(),
            ConfigurationModel::empty(),
            ConfigurationModel::empty(),
            ConfigurationModel::empty(),
            BTreeMap::new(),
        );
        let sources = SourceState {
            local_user: SettingsFile::new("user", locations.user_settings.clone(), None),
            remote_user: None,
            workspace_file: None,
            folders: BTreeMap::new(),
        };

        let inner = Arc::new(ServiceInner {
            folder_settings_path: settings.folder_settings_path.clone(),
            files,
            registry,
            schema_registry,
            locations,
            sources: Mutex::new(sources),
            snapshot: ArcSwap::from_pointee(Snapshot {
                configuration: Arc::new(configuration),
                workspace: None,
            }),
            initialized: Barrier::new(),
            editing_ready: Barrier::new(),
            editing: OnceCell::new(),
            folder_queue: tokio::sync::Mutex::new(()),
            events: ServiceEvents::default(),
        });

        let weak = Arc::downgrade(&inner);
        let subscription = inner
            .registry
            .on_did_update_configuration()
            .subscribe(move |keys: &Vec<String>| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_defaults_changed(keys);
                }
            });

        Self {
            inner,
            _registry_subscription: subscription,
        }
    }

    /// Bind the collaborators that persist settings and folder lists. Writes issued
    /// before this call wait for it.
    pub fn accept_editing(
        &self,
        editor: Arc<dyn ConfigurationEditing>,
        persister: Arc<dyn WorkspaceFoldersPersister>,
    ) {
        if self
            .inner
            .editing
            .set(EditingServices { editor, persister })
            .is_err()
        {
            warn!("Configuration editing services are already bound");
            return;
        }
        self.inner.editing_ready.open();
        debug!("Configuration editing services bound");
    }

    /// Bind a [`JsonConfigurationEditor`] over this service's file service
    pub fn bind_json_editor(&self) {
        let editor = Arc::new(JsonConfigurationEditor::new(
            Arc::clone(&self.inner.files),
            self.settings_locator(),
        ));
        self.accept_editing(editor.clone(), editor);
    }

    /// Resolves settings files from the current workspace without keeping the service alive
    pub fn settings_locator(&self) -> Weak<dyn SettingsLocator> {
        let inner: Arc<dyn SettingsLocator> = self.inner.clone();
        Arc::downgrade(&inner)
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.is_open()
    }

    /// Open a workspace and load every layer.
    ///
    /// The first load fires a change event covering every key. Later calls replace the
    /// workspace and fire the state, name, folder and configuration events that apply.
    pub async fn initialize(&self, payload: WorkspaceInitializationPayload) -> Result<(), ConfigurationError> {
        let inner = &self.inner;
        let files = inner.files.as_ref();

        let (workspace, document) = match payload {
            WorkspaceInitializationPayload::Empty { id } => (Workspace::empty(id), None),
            WorkspaceInitializationPayload::Folder { id, uri } => {
                (Workspace::new(id, vec![WorkspaceFolder::new(uri, None, 0)], None), None)
            }
            WorkspaceInitializationPayload::Workspace { id, configuration } => {
                let content = read_settings(files, &configuration).await;
                let document = WorkspaceDocument::parse(configuration.as_str(), content.as_deref());
                let folders = resolve_stored_folders(&document.folders, &configuration);
                (Workspace::new(id, folders, Some(configuration)), Some(document))
            }
        };
        let state = workspace.state();
        let folder_scopes = match state {
            WorkbenchState::Folder => WORKSPACE_SCOPES,
            _ => FOLDER_SCOPES,
        };

        let user_content = read_settings(files, &inner.locations.user_settings).await;
        let remote_content = match &inner.locations.remote_user_settings {
            Some(resource) => read_settings(files, resource).await,
            None => None,
        };
        let folder_contents = join_all(workspace.folders().iter().map(|folder| async move {
            let resource = folder_settings_resource(&folder.uri, &inner.folder_settings_path);
            let content = read_settings(files, &resource).await;
            (folder.uri.clone(), resource, content)
        }))
        .await;

        let first_load = !inner.initialized.is_open();
        let (event, previous_workspace, workspace) = {
            let registry = inner.registry.as_ref();
            let mut sources = inner.sources.lock();

            sources.local_user.apply(user_content.as_deref(), registry);
            sources.remote_user = inner.locations.remote_user_settings.clone().map(|resource| {
                let mut file = SettingsFile::new("remote user", resource, Some(REMOTE_USER_SCOPES));
                file.apply(remote_content.as_deref(), registry);
                file
            });
            sources.workspace_file = match (document, workspace.configuration()) {
                (Some(document), Some(resource)) => {
                    let mut file = WorkspaceFile::new(resource.clone(), WORKSPACE_SCOPES);
                    file.apply(document, registry);
                    Some(file)
                }
                _ => None,
            };
            sources.folders = folder_contents
                .into_iter()
                .map(|(uri, resource, content)| {
                    let mut file = SettingsFile::new(format!("folder {}", uri), resource, Some(folder_scopes));
                    file.apply(content.as_deref(), registry);
                    (uri, file)
                })
                .collect();

            let configuration = Arc::new(Configuration::new(
                registry.default_model(),
                sources.local_user.model().clone(),
                sources.remote_model(),
                sources.workspace_model(state),
                sources.folder_models(),
            ));
            let previous = inner.snapshot.load_full();
            let change = if first_load {
                Configuration::default().compare(&configuration)
            } else {
                previous.configuration.compare(&configuration)
            };

            let workspace = Arc::new(workspace);
            inner.snapshot.store(Arc::new(Snapshot {
                configuration: Arc::clone(&configuration),
                workspace: Some(Arc::clone(&workspace)),
            }));
            drop(sources);

            let event = (first_load || !change.is_empty()).then(|| {
                ConfigurationChangeEvent::new(
                    change,
                    Arc::clone(&previous.configuration),
                    configuration,
                    Some(workspace.as_ref().clone()),
                    ConfigurationTarget::Workspace,
                )
            });
            (event, previous.workspace.clone(), workspace)
        };

        inner.register_schemas();
        inner.initialized.open();
        info!(
            "Initialized {} workspace {} with {} folder(s)",
            state,
            workspace.id(),
            workspace.folders().len()
        );

        if !first_load {
            let previous_state = previous_workspace
                .as_deref()
                .map_or(WorkbenchState::Empty, Workspace::state);
            if previous_state != state {
                inner.events.state.fire(&state);
            }
            let previous_name = previous_workspace.as_deref().map(Workspace::name).unwrap_or_default();
            let name = workspace.name();
            if previous_name != name {
                inner.events.name.fire(&name);
            }
            let previous_folders = previous_workspace
                .as_deref()
                .map(|workspace| workspace.folders().to_vec())
                .unwrap_or_default();
            let folder_change = compare_folders(&previous_folders, workspace.folders());
            if !folder_change.is_empty() {
                inner.events.folders.fire(&folder_change);
            }
        }
        inner.fire_configuration_change(event);
        Ok(())
    }

    pub fn get_workbench_state(&self) -> WorkbenchState {
        self.inner
            .snapshot
            .load()
            .workspace
            .as_deref()
            .map_or(WorkbenchState::Empty, Workspace::state)
    }

    pub fn get_workspace(&self) -> Option<Workspace> {
        self.inner.snapshot.load().workspace.as_deref().cloned()
    }

    /// Innermost folder containing `resource`
    pub fn get_workspace_folder(&self, resource: &Url) -> Option<WorkspaceFolder> {
        self.inner
            .snapshot
            .load()
            .workspace
            .as_deref()
            .and_then(|workspace| workspace.get_folder(resource).cloned())
    }

    /// Current merged configuration
    pub fn configuration(&self) -> Arc<Configuration> {
        Arc::clone(&self.inner.snapshot.load().configuration)
    }

    /// Effective value of `section`, or the whole tree when `None`
    pub fn get_value(&self, section: Option<&str>, overrides: &ConfigurationOverrides) -> Option<Value> {
        let snapshot = self.inner.snapshot.load();
        snapshot
            .configuration
            .get_value(section, overrides, snapshot.workspace.as_deref())
    }

    /// Effective value of `section` deserialized into `T`
    pub fn get_typed<T: DeserializeOwned>(&self, section: &str, overrides: &ConfigurationOverrides) -> Option<T> {
        let value = self.get_value(Some(section), overrides)?;
        match serde_json::from_value(value) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Setting {} has an unexpected shape: {}", section, e);
                None
            }
        }
    }

    pub fn inspect(&self, key: &str, overrides: &ConfigurationOverrides) -> InspectValue {
        let snapshot = self.inner.snapshot.load();
        snapshot
            .configuration
            .inspect(key, overrides, snapshot.workspace.as_deref())
    }

    pub fn keys(&self) -> ConfigurationKeys {
        self.inner.snapshot.load().configuration.keys()
    }

    /// Write a setting.
    ///
    /// Without an explicit target the value goes to the most specific layer that
    /// already defines the key, user settings otherwise; writing the current effective
    /// value is a no-op and `None` removes the key from every layer defining it.
    pub async fn update_value(
        &self,
        key: &str,
        value: Option<Value>,
        options: UpdateOptions,
    ) -> Result<(), ConfigurationError> {
        self.inner.initialized.wait().await;

        let target = match options.target {
            Some(target) => target,
            None => {
                let inspect = self.inspect(key, &options.overrides);
                match &value {
                    None => return self.remove_from_defining_layers(key, &inspect, &options).await,
                    Some(value) if inspect.value.as_ref() == Some(value) => {
                        debug!("{} already has the requested value", key);
                        return Ok(());
                    }
                    Some(_) => derive_target(&inspect),
                }
            }
        };
        self.write_value(target, key, value, &options).await
    }

    async fn remove_from_defining_layers(
        &self,
        key: &str,
        inspect: &InspectValue,
        options: &UpdateOptions,
    ) -> Result<(), ConfigurationError> {
        let defined = [
            (ConfigurationTarget::UserLocal, inspect.user_local_value.is_some()),
            (ConfigurationTarget::UserRemote, inspect.user_remote_value.is_some()),
            (ConfigurationTarget::Workspace, inspect.workspace_value.is_some()),
            (ConfigurationTarget::WorkspaceFolder, inspect.workspace_folder_value.is_some()),
        ];

        let mut written: Vec<Url> = Vec::new();
        for (target, _) in defined.into_iter().filter(|(_, defined)| *defined) {
            // A single-folder workspace backs two layers with one file
            let location = self.inner.settings_location(target, &options.overrides)?;
            if written.iter().any(|resource| resources::is_equal(resource, &location.resource)) {
                continue;
            }
            self.write_value(target, key, None, options).await?;
            written.push(location.resource);
        }
        Ok(())
    }

    async fn write_value(
        &self,
        target: ConfigurationTarget,
        key: &str,
        value: Option<Value>,
        options: &UpdateOptions,
    ) -> Result<(), ConfigurationError> {
        match target {
            ConfigurationTarget::Default => return Err(ConfigurationError::InvalidTarget { target }),
            ConfigurationTarget::Memory => {
                let event = self
                    .inner
                    .commit(ConfigurationTarget::Memory, |_, configuration, _| {
                        configuration.update_memory(key, value, &options.overrides)
                    });
                self.inner.fire_configuration_change(event);
                return Ok(());
            }
            _ => {}
        }

        let location = self.inner.settings_location(target, &options.overrides)?;
        let editing = self.inner.editing().await?;
        let result = editing
            .editor
            .write_configuration(
                target,
                ConfigurationValue {
                    key: key.to_string(),
                    value,
                },
                WriteOptions {
                    scopes: options.overrides.clone(),
                    suppress_error_notification: options.suppress_error_notification,
                },
            )
            .await;

        match result {
            Ok(()) => {}
            Err(e) if options.suppress_error_notification => {
                warn!("Failed to write {} to {} settings: {}", key, target, e);
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        self.inner.reload_resource(&location.resource).await;
        Ok(())
    }

    /// Add folders to a multi-folder workspace
    pub async fn add_folders(
        &self,
        folders: Vec<WorkspaceFolderCreationData>,
        index: Option<usize>,
    ) -> Result<(), ConfigurationError> {
        self.update_folders(folders, Vec::new(), index).await
    }

    pub async fn remove_folders(&self, folders: Vec<Url>) -> Result<(), ConfigurationError> {
        self.update_folders(Vec::new(), folders, None).await
    }

    /// Remove, then add, folders of a multi-folder workspace in one write.
    ///
    /// Updates run one at a time. Nothing happens when the workspace is not a
    /// multi-folder workspace or when the folder list would not change.
    pub async fn update_folders(
        &self,
        to_add: Vec<WorkspaceFolderCreationData>,
        to_remove: Vec<Url>,
        index: Option<usize>,
    ) -> Result<(), ConfigurationError> {
        self.inner.initialized.wait().await;
        let _queue = self.inner.folder_queue.lock().await;

        let Some(workspace_file) = self.inner.workspace_file() else {
            debug!("Ignoring folder update: no multi-folder workspace is opened");
            return Ok(());
        };
        let stored = self
            .inner
            .sources
            .lock()
            .workspace_file
            .as_ref()
            .map(|file| file.folders().to_vec())
            .unwrap_or_default();

        let workspace_dir = resources::dirname(&workspace_file);
        let Some(update) = update_stored_folders(
            &stored,
            &workspace_dir,
            &to_add,
            &to_remove,
            index,
            self.inner.files.as_ref(),
        )
        .await
        else {
            debug!("Workspace folders unchanged");
            return Ok(());
        };

        let editing = self.inner.editing().await?;
        editing.persister.set_folders(update.folders).await?;
        info!(
            "Updated workspace folders: {} added, {} removed",
            update.added, update.removed
        );
        self.inner.reload_workspace_file().await;
        Ok(())
    }

    /// Re-read settings from disk, for one layer or all of them
    pub async fn reload_configuration(&self, target: Option<ConfigurationTarget>) {
        self.inner.initialized.wait().await;
        let inner = &self.inner;
        match target {
            None => {
                inner.reload_local_user().await;
                inner.reload_remote_user().await;
                inner.reload_workspace().await;
                inner.reload_folders().await;
            }
            Some(ConfigurationTarget::Default) => inner.on_defaults_changed(&[]),
            Some(ConfigurationTarget::User | ConfigurationTarget::UserLocal) => inner.reload_local_user().await,
            Some(ConfigurationTarget::UserRemote) => inner.reload_remote_user().await,
            Some(ConfigurationTarget::Workspace) => inner.reload_workspace().await,
            Some(ConfigurationTarget::WorkspaceFolder) => inner.reload_folders().await,
            Some(ConfigurationTarget::Memory) => {}
        }
    }

    /// Reload the sources backed by changed files
    pub async fn handle_file_changes(&self, changed: &[Url]) {
        if !self.inner.initialized.is_open() {
            return;
        }
        let mut seen: Vec<&Url> = Vec::new();
        for resource in changed {
            if seen.iter().any(|other| resources::is_equal(other, resource)) {
                continue;
            }
            seen.push(resource);
            self.inner.reload_resource(resource).await;
        }
    }

    pub fn on_did_change_configuration(&self) -> &Emitter<ConfigurationChangeEvent> {
        &self.inner.events.configuration
    }

    pub fn on_did_change_workspace_folders(&self) -> &Emitter<WorkspaceFoldersChangeEvent> {
        &self.inner.events.folders
    }

    pub fn on_did_change_workbench_state(&self) -> &Emitter<WorkbenchState> {
        &self.inner.events.state
    }

    pub fn on_did_change_workspace_name(&self) -> &Emitter<String> {
        &self.inner.events.name
    }
}

fn derive_target(inspect: &InspectValue) -> ConfigurationTarget {
    if inspect.workspace_folder_value.is_some() {
        ConfigurationTarget::WorkspaceFolder
    } else if inspect.workspace_value.is_some() {
        ConfigurationTarget::Workspace
    } else if inspect.user_remote_value.is_some() {
        ConfigurationTarget::UserRemote
    } else {
        ConfigurationTarget::User
    }
}

impl ServiceInner {
    async fn editing(&self) -> Result<EditingServices, ConfigurationError> {
        self.editing_ready.wait().await;
        self.editing.get().cloned().ok_or(ConfigurationError::NotInitialized)
    }

    fn workspace(&self) -> Option<Arc<Workspace>> {
        self.snapshot.load().workspace.clone()
    }

    fn register_schemas(&self) {
        if let Some(sink) = &self.schema_registry {
            schema::register_schemas(&self.registry, sink.as_ref());
        }
    }

    /// Apply `update` to a copy of the configuration under the source lock and
    /// publish the result. Returns the event to fire once the lock is released.
    fn commit<F>(&self, source: ConfigurationTarget, update: F) -> Option<ConfigurationChangeEvent>
    where
        F: FnOnce(&mut SourceState, &mut Configuration, Option<&Workspace>) -> ConfigurationChange,
    {
        let mut sources = self.sources.lock();
        let previous = self.snapshot.load_full();
        let mut configuration = previous.configuration.as_ref().clone();
        let change = update(&mut sources, &mut configuration, previous.workspace.as_deref());

        let current = Arc::new(configuration);
        self.snapshot.store(Arc::new(Snapshot {
            configuration: Arc::clone(&current),
            workspace: previous.workspace.clone(),
        }));
        drop(sources);

        if change.is_empty() || !self.initialized.is_open() {
            return None;
        }
        Some(ConfigurationChangeEvent::new(
            change,
            Arc::clone(&previous.configuration),
            current,
            previous.workspace.as_deref().cloned(),
            source,
        ))
    }

    fn fire_configuration_change(&self, event: Option<ConfigurationChangeEvent>) {
        if let Some(event) = event {
            debug!(
                "Configuration changed in {} layer: {} key(s)",
                event.source(),
                event.keys().len()
            );
            self.events.configuration.fire(&event);
        }
    }

    fn on_defaults_changed(&self, keys: &[String]) {
        debug!("Configuration defaults changed: {} key(s)", keys.len());
        let registry = self.registry.as_ref();
        let event = self.commit(ConfigurationTarget::Default, |sources, configuration, workspace| {
            sources.reparse(registry);
            let state = workspace.map_or(WorkbenchState::Empty, Workspace::state);
            let default_change = configuration.update_default(registry.default_model());
            let layers_change = configuration.reapply_models(
                sources.local_user.model().clone(),
                sources.remote_model(),
                sources.workspace_model(state),
                sources.folder_models(),
            );
            ConfigurationChange::merge([default_change, layers_change])
        });
        if self.initialized.is_open() {
            self.register_schemas();
        }
        self.fire_configuration_change(event);
    }

    async fn reload_resource(&self, resource: &Url) {
        if resources::is_equal(resource, &self.locations.user_settings) {
            self.reload_local_user().await;
        }
        if let Some(remote) = &self.locations.remote_user_settings {
            if resources::is_equal(resource, remote) {
                self.reload_remote_user().await;
            }
        }
        let Some(workspace) = self.workspace() else {
            return;
        };
        if let Some(configuration) = workspace.configuration() {
            if resources::is_equal(resource, configuration) {
                self.reload_workspace_file().await;
            }
        }
        for folder in workspace.folders() {
            if resources::is_equal(resource, &folder_settings_resource(&folder.uri, &self.folder_settings_path)) {
                self.reload_folder(&folder.uri).await;
            }
        }
    }

    async fn reload_local_user(&self) {
        let content = read_settings(self.files.as_ref(), &self.locations.user_settings).await;
        let registry = self.registry.as_ref();
        let event = self.commit(ConfigurationTarget::UserLocal, |sources, configuration, _| {
            sources.local_user.apply(content.as_deref(), registry);
            configuration.update_local_user(sources.local_user.model().clone())
        });
        self.fire_configuration_change(event);
    }

    async fn reload_remote_user(&self) {
        let Some(resource) = &self.locations.remote_user_settings else {
            return;
        };
        let content = read_settings(self.files.as_ref(), resource).await;
        let registry = self.registry.as_ref();
        let event = self.commit(ConfigurationTarget::UserRemote, |sources, configuration, _| {
            let file = sources.remote_user.get_or_insert_with(|| {
                SettingsFile::new("remote user", resource.clone(), Some(REMOTE_USER_SCOPES))
            });
            file.apply(content.as_deref(), registry);
            configuration.update_remote_user(file.model().clone())
        });
        self.fire_configuration_change(event);
    }

    /// Reload whatever backs the workspace layer
    async fn reload_workspace(&self) {
        let Some(workspace) = self.workspace() else {
            return;
        };
        match workspace.state() {
            WorkbenchState::Workspace => self.reload_workspace_file().await,
            WorkbenchState::Folder => {
                if let Some(folder) = workspace.folders().first() {
                    self.reload_folder(&folder.uri).await;
                }
            }
            WorkbenchState::Empty => {}
        }
    }

    async fn reload_folders(&self) {
        let Some(workspace) = self.workspace() else {
            return;
        };
        for folder in workspace.folders() {
            self.reload_folder(&folder.uri).await;
        }
    }

    async fn reload_folder(&self, folder: &Url) {
        let folder = resources::normalize(folder);
        let resource = folder_settings_resource(&folder, &self.folder_settings_path);
        let content = read_settings(self.files.as_ref(), &resource).await;
        let registry = self.registry.as_ref();

        let event = self.commit(ConfigurationTarget::WorkspaceFolder, |sources, configuration, workspace| {
            let Some(file) = sources.folders.get_mut(&folder) else {
                debug!("Folder {} left the workspace before its settings were read", folder);
                return ConfigurationChange::default();
            };
            file.apply(content.as_deref(), registry);
            let model = file.model().clone();

            let mut changes = vec![configuration.update_folder(&folder, model.clone())];
            if workspace.map(Workspace::state) == Some(WorkbenchState::Folder) {
                changes.push(configuration.update_workspace(model));
            }
            ConfigurationChange::merge(changes)
        });
        self.fire_configuration_change(event);
    }

    /// Re-read the workspace file: its settings section and its folder list
    async fn reload_workspace_file(&self) {
        let Some(resource) = self.workspace_file() else {
            return;
        };
        let files = self.files.as_ref();
        let content = read_settings(files, &resource).await;
        let document = WorkspaceDocument::parse(resource.as_str(), content.as_deref());
        let new_folders = resolve_stored_folders(&document.folders, &resource);

        let known: Vec<Url> = self.sources.lock().folders.keys().cloned().collect();
        let folder_contents = join_all(
            new_folders
                .iter()
                .filter(|folder| !known.contains(&folder.uri))
                .map(|folder| async move {
                    let settings = folder_settings_resource(&folder.uri, &self.folder_settings_path);
                    let content = read_settings(files, &settings).await;
                    (folder.uri.clone(), settings, content)
                }),
        )
        .await;

        let registry = self.registry.as_ref();
        let (event, folder_change) = {
            let mut sources = self.sources.lock();
            let previous = self.snapshot.load_full();
            let Some(previous_workspace) = previous.workspace.as_deref() else {
                return;
            };

            let mut workspace = previous_workspace.clone();
            let folder_change = compare_folders(workspace.folders(), &new_folders);
            workspace.set_folders(new_folders);

            let mut configuration = previous.configuration.as_ref().clone();
            let workspace_file = sources
                .workspace_file
                .get_or_insert_with(|| WorkspaceFile::new(resource.clone(), WORKSPACE_SCOPES));
            workspace_file.apply(document, registry);
            let mut changes = vec![configuration.update_workspace(workspace_file.model().clone())];

            for removed in &folder_change.removed {
                sources.folders.remove(&removed.uri);
                changes.push(configuration.delete_folder(&removed.uri));
            }
            for (uri, settings, content) in folder_contents {
                let mut file = SettingsFile::new(format!("folder {}", uri), settings, Some(FOLDER_SCOPES));
                file.apply(content.as_deref(), registry);
                changes.push(configuration.update_folder(&uri, file.model().clone()));
                sources.folders.insert(uri, file);
            }

            let current = Arc::new(configuration);
            let workspace = Arc::new(workspace);
            self.snapshot.store(Arc::new(Snapshot {
                configuration: Arc::clone(&current),
                workspace: Some(Arc::clone(&workspace)),
            }));
            drop(sources);

            let change = ConfigurationChange::merge(changes);
            let event = (!change.is_empty()).then(|| {
                ConfigurationChangeEvent::new(
                    change,
                    Arc::clone(&previous.configuration),
                    current,
                    Some(workspace.as_ref().clone()),
                    ConfigurationTarget::Workspace,
                )
            });
            (event, folder_change)
        };

        if !folder_change.is_empty() {
            debug!(
                "Workspace folders changed: {} added, {} removed, {} changed",
                folder_change.added.len(),
                folder_change.removed.len(),
                folder_change.changed.len()
            );
            self.events.folders.fire(&folder_change);
        }
        self.fire_configuration_change(event);
    }
}

impl SettingsLocator for ServiceInner {
    fn settings_location(
        &self,
        target: ConfigurationTarget,
        overrides: &ConfigurationOverrides,
    ) -> Result<SettingsLocation, ConfigurationError> {
        let workspace = self.workspace();
        let state = workspace
            .as_deref()
            .map_or(WorkbenchState::Empty, Workspace::state);
        let folder_settings = |folder: &WorkspaceFolder| SettingsLocation {
            resource: folder_settings_resource(&folder.uri, &self.folder_settings_path),
            section: None,
        };

        match target {
            ConfigurationTarget::Default | ConfigurationTarget::Memory => {
                Err(ConfigurationError::InvalidTarget { target })
            }
            ConfigurationTarget::User | ConfigurationTarget::UserLocal => Ok(SettingsLocation {
                resource: self.locations.user_settings.clone(),
                section: None,
            }),
            ConfigurationTarget::UserRemote => self
                .locations
                .remote_user_settings
                .clone()
                .map(|resource| SettingsLocation {
                    resource,
                    section: None,
                })
                .ok_or(ConfigurationError::NoRemoteConfiguration),
            ConfigurationTarget::Workspace => match (state, workspace.as_deref()) {
                (WorkbenchState::Workspace, Some(workspace)) => workspace
                    .configuration()
                    .map(|resource| SettingsLocation {
                        resource: resource.clone(),
                        section: Some(WORKSPACE_SETTINGS_KEY.to_string()),
                    })
                    .ok_or(ConfigurationError::NoWorkspace { target }),
                (WorkbenchState::Folder, Some(workspace)) => workspace
                    .folders()
                    .first()
                    .map(folder_settings)
                    .ok_or(ConfigurationError::NoWorkspace { target }),
                _ => Err(ConfigurationError::NoWorkspace { target }),
            },
            ConfigurationTarget::WorkspaceFolder => {
                let workspace = match workspace.as_deref() {
                    Some(workspace) if state != WorkbenchState::Empty => workspace,
                    _ => return Err(ConfigurationError::NoWorkspace { target }),
                };
                match &overrides.resource {
                    Some(resource) => workspace
                        .get_folder(resource)
                        .map(folder_settings)
                        .ok_or_else(|| ConfigurationError::NoWorkspaceFolder {
                            resource: resource.to_string(),
                        }),
                    None if state == WorkbenchState::Folder => workspace
                        .folders()
                        .first()
                        .map(folder_settings)
                        .ok_or(ConfigurationError::MissingResource),
                    None => Err(ConfigurationError::MissingResource),
                }
            }
        }
    }

    fn workspace_file(&self) -> Option<Url> {
        self.workspace()
            .and_then(|workspace| workspace.configuration().cloned())
    }
}

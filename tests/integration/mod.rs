// Integration test modules
pub mod configuration_service_tests;
pub mod service_settings_tests;
pub mod storage_bridge_tests;
pub mod workspace_folders_tests;

// Test utilities
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;
use workbench_services::config::ConfigurationSettings;
use workbench_services::configuration::{
    ConfigurationLocations, ConfigurationRegistry, FileService, InMemoryFileService,
    JsonConfigurationEditor, StoredWorkspaceFolder, WorkspaceFoldersPersister, WorkspaceService,
};
use workbench_services::ConfigurationError;

pub const USER_SETTINGS: &str = "memory:///user/settings.json";
pub const REMOTE_SETTINGS: &str = "memory:///remote/settings.json";
pub const WORKSPACE_FILE: &str = "memory:///ws/project.code-workspace";

pub fn url(value: &str) -> Url {
    Url::parse(value).unwrap()
}

/// Settings file of a folder under the default folder settings path
pub fn folder_settings(folder: &str) -> Url {
    url(&format!("{}/.workbench/settings.json", folder.trim_end_matches('/')))
}

pub async fn write_json(files: &InMemoryFileService, resource: &str, value: Value) {
    files
        .write_file(&url(resource), &serde_json::to_string_pretty(&value).unwrap())
        .await
        .unwrap();
}

pub fn read_json(files: &InMemoryFileService, resource: &Url) -> Value {
    serde_json::from_str(&files.contents(resource).unwrap_or_else(|| "{}".to_string())).unwrap()
}

/// Folder persister that counts writes before delegating to the JSON editor
pub struct CountingPersister {
    inner: Arc<JsonConfigurationEditor>,
    calls: AtomicUsize,
}

impl CountingPersister {
    pub fn new(inner: Arc<JsonConfigurationEditor>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl WorkspaceFoldersPersister for CountingPersister {
    async fn set_folders(&self, folders: Vec<StoredWorkspaceFolder>) -> Result<(), ConfigurationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.set_folders(folders).await
    }
}

pub struct TestWorkbench {
    pub files: Arc<InMemoryFileService>,
    pub registry: Arc<ConfigurationRegistry>,
    pub service: WorkspaceService,
}

impl TestWorkbench {
    /// Service over an in-memory file system, without editing services bound
    pub fn unbound(remote: bool) -> Self {
        let files = Arc::new(InMemoryFileService::new());
        let registry = Arc::new(ConfigurationRegistry::new());
        let mut locations = ConfigurationLocations::new(url(USER_SETTINGS));
        if remote {
            locations = locations.with_remote(url(REMOTE_SETTINGS));
        }
        let service = WorkspaceService::new(
            &ConfigurationSettings::default(),
            files.clone(),
            registry.clone(),
            locations,
            None,
        );
        Self {
            files,
            registry,
            service,
        }
    }

    pub fn new() -> Self {
        let workbench = Self::unbound(false);
        workbench.service.bind_json_editor();
        workbench
    }

    /// Bind the JSON editor with a counting folder persister
    pub fn with_counting_persister() -> (Self, Arc<CountingPersister>) {
        let workbench = Self::unbound(false);
        let editor = Arc::new(JsonConfigurationEditor::new(
            workbench.files.clone(),
            workbench.service.settings_locator(),
        ));
        let persister = Arc::new(CountingPersister::new(editor.clone()));
        workbench.service.accept_editing(editor, persister.clone());
        (workbench, persister)
    }
}

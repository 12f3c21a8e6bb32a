use super::*;
use anyhow::Result;
use async_trait::async_trait;
use mockall::mock;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Mutex;
use workbench_services::configuration::{
    ConfigurationChangeEvent, ConfigurationOverrides, FileStat, WorkbenchState, WorkspaceFolderCreationData,
    WorkspaceFoldersChangeEvent, WorkspaceInitializationPayload,
};
use workbench_services::core::{FileError, Subscription};

mock! {
    pub Files {}

    #[async_trait]
    impl FileService for Files {
        async fn resolve(&self, resource: &Url) -> Result<FileStat, FileError>;
        async fn read_file(&self, resource: &Url) -> Result<String, FileError>;
        async fn write_file(&self, resource: &Url, content: &str) -> Result<(), FileError>;
    }
}

async fn open_multi_folder(workbench: &TestWorkbench, folders: &[&str]) -> Result<()> {
    for folder in folders {
        workbench.files.create_directory(&url(&format!("memory:///ws/{}", folder)));
    }
    let entries: Vec<Value> = folders.iter().map(|folder| json!({ "path": folder })).collect();
    write_json(&workbench.files, WORKSPACE_FILE, json!({ "folders": entries, "settings": {} })).await;
    workbench
        .service
        .initialize(WorkspaceInitializationPayload::Workspace {
            id: "project".to_string(),
            configuration: url(WORKSPACE_FILE),
        })
        .await?;
    Ok(())
}

fn record_folder_events(workbench: &TestWorkbench) -> (Arc<Mutex<Vec<WorkspaceFoldersChangeEvent>>>, Subscription) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let subscription = workbench
        .service
        .on_did_change_workspace_folders()
        .subscribe(move |event: &WorkspaceFoldersChangeEvent| sink.lock().unwrap().push(event.clone()));
    (events, subscription)
}

fn folder_uris(workbench: &TestWorkbench) -> Vec<String> {
    workbench
        .service
        .get_workspace()
        .map(|workspace| {
            workspace
                .folders()
                .iter()
                .map(|folder| folder.uri.to_string())
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn test_adding_present_folder_is_idempotent() -> Result<()> {
    let (workbench, persister) = TestWorkbench::with_counting_persister();
    open_multi_folder(&workbench, &["a", "b"]).await?;
    let (events, _subscription) = record_folder_events(&workbench);

    workbench
        .service
        .add_folders(vec![WorkspaceFolderCreationData::new(url("memory:///ws/a/"))], None)
        .await?;

    assert_eq!(persister.calls(), 0);
    assert!(events.lock().unwrap().is_empty());
    assert_eq!(folder_uris(&workbench), vec!["memory:///ws/a", "memory:///ws/b"]);
    Ok(())
}

#[tokio::test]
async fn test_removing_unknown_folder_writes_nothing() -> Result<()> {
    let (workbench, persister) = TestWorkbench::with_counting_persister();
    open_multi_folder(&workbench, &["a"]).await?;
    let before = workbench.files.contents(&url(WORKSPACE_FILE));

    workbench
        .service
        .remove_folders(vec![url("memory:///elsewhere")])
        .await?;

    assert_eq!(persister.calls(), 0);
    assert_eq!(workbench.files.contents(&url(WORKSPACE_FILE)), before);
    Ok(())
}

#[tokio::test]
async fn test_reorder_is_reported_as_changed_with_one_write() -> Result<()> {
    let (workbench, persister) = TestWorkbench::with_counting_persister();
    open_multi_folder(&workbench, &["a", "b"]).await?;
    let (events, _subscription) = record_folder_events(&workbench);

    workbench
        .service
        .update_folders(
            vec![WorkspaceFolderCreationData::new(url("memory:///ws/b"))],
            vec![url("memory:///ws/b")],
            Some(0),
        )
        .await?;

    assert_eq!(persister.calls(), 1);
    assert_eq!(folder_uris(&workbench), vec!["memory:///ws/b", "memory:///ws/a"]);

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0].added.is_empty());
    assert!(events[0].removed.is_empty());
    assert_eq!(events[0].changed.len(), 2);
    assert_eq!(
        read_json(&workbench.files, &url(WORKSPACE_FILE))["folders"],
        json!([{ "path": "b" }, { "path": "a" }])
    );
    Ok(())
}

#[tokio::test]
async fn test_empty_workspace_end_to_end() -> Result<()> {
    let (workbench, persister) = TestWorkbench::with_counting_persister();
    workbench
        .service
        .initialize(WorkspaceInitializationPayload::Empty { id: "empty".to_string() })
        .await?;
    assert_eq!(workbench.service.get_workbench_state(), WorkbenchState::Empty);

    // Folder operations only apply to multi-folder workspaces
    workbench
        .service
        .add_folders(vec![WorkspaceFolderCreationData::new(url("memory:///ws/x"))], None)
        .await?;
    assert_eq!(persister.calls(), 0);

    open_multi_folder(&workbench, &[]).await?;
    workbench.files.create_directory(&url("memory:///ws/x"));
    let (events, _subscription) = record_folder_events(&workbench);

    workbench
        .service
        .add_folders(vec![WorkspaceFolderCreationData::new(url("memory:///ws/x"))], None)
        .await?;

    assert_eq!(folder_uris(&workbench), vec!["memory:///ws/x"]);
    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].added.len(), 1);
    assert_eq!(events[0].added[0].uri, url("memory:///ws/x"));
    assert!(events[0].removed.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_added_folder_contributes_its_settings() -> Result<()> {
    let workbench = TestWorkbench::new();
    open_multi_folder(&workbench, &["a"]).await?;
    workbench.files.create_directory(&url("memory:///ws/c"));
    write_json(&workbench.files, folder_settings("memory:///ws/c").as_str(), json!({ "x": "c" })).await;

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let _subscription = workbench
        .service
        .on_did_change_configuration()
        .subscribe(move |event: &ConfigurationChangeEvent| sink.lock().unwrap().push(event.keys().to_vec()));

    workbench
        .service
        .add_folders(vec![WorkspaceFolderCreationData::named(url("memory:///ws/c"), "Client")], Some(0))
        .await?;

    let in_c = ConfigurationOverrides::for_resource(url("memory:///ws/c/index.ts"));
    assert_eq!(workbench.service.get_value(Some("x"), &in_c), Some(json!("c")));
    assert_eq!(*events.lock().unwrap(), vec![vec!["x".to_string()]]);

    let folder = workbench
        .service
        .get_workspace_folder(&url("memory:///ws/c/index.ts"))
        .unwrap();
    assert_eq!((folder.name.as_str(), folder.index), ("Client", 0));
    Ok(())
}

#[tokio::test]
async fn test_removed_folder_drops_its_layer() -> Result<()> {
    let workbench = TestWorkbench::new();
    write_json(&workbench.files, folder_settings("memory:///ws/a").as_str(), json!({ "x": 1 })).await;
    open_multi_folder(&workbench, &["a", "b"]).await?;

    let in_a = ConfigurationOverrides::for_resource(url("memory:///ws/a/main.rs"));
    assert_eq!(workbench.service.get_value(Some("x"), &in_a), Some(json!(1)));

    workbench.service.remove_folders(vec![url("memory:///ws/a")]).await?;

    assert_eq!(folder_uris(&workbench), vec!["memory:///ws/b"]);
    assert_eq!(workbench.service.get_value(Some("x"), &in_a), None);
    assert!(workbench.service.get_workspace_folder(&url("memory:///ws/a/main.rs")).is_none());
    Ok(())
}

#[tokio::test]
async fn test_concurrent_updates_are_serialized() -> Result<()> {
    let (workbench, persister) = TestWorkbench::with_counting_persister();
    open_multi_folder(&workbench, &["a"]).await?;
    workbench.files.create_directory(&url("memory:///ws/b"));
    workbench.files.create_directory(&url("memory:///ws/c"));

    let (first, second) = tokio::join!(
        workbench
            .service
            .add_folders(vec![WorkspaceFolderCreationData::new(url("memory:///ws/b"))], None),
        workbench
            .service
            .add_folders(vec![WorkspaceFolderCreationData::new(url("memory:///ws/c"))], None),
    );
    first?;
    second?;

    assert_eq!(persister.calls(), 2);
    let mut uris = folder_uris(&workbench);
    uris.sort();
    assert_eq!(uris, vec!["memory:///ws/a", "memory:///ws/b", "memory:///ws/c"]);
    Ok(())
}

#[tokio::test]
async fn test_failed_probe_counts_as_absent() -> Result<()> {
    let mut files = MockFiles::new();
    files.expect_read_file().returning(|resource| {
        if resource.as_str() == WORKSPACE_FILE {
            Ok(r#"{ "folders": [ { "path": "a" } ], "settings": {} }"#.to_string())
        } else {
            Err(FileError::NotFound {
                resource: resource.clone(),
            })
        }
    });
    files.expect_resolve().returning(|resource| {
        Err(FileError::read_error(
            resource.clone(),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        ))
    });
    files.expect_write_file().never();

    let files: Arc<dyn FileService> = Arc::new(files);
    let service = WorkspaceService::new(
        &workbench_services::config::ConfigurationSettings::default(),
        files.clone(),
        Arc::new(ConfigurationRegistry::new()),
        ConfigurationLocations::new(url(USER_SETTINGS)),
        None,
    );
    service.bind_json_editor();
    service
        .initialize(WorkspaceInitializationPayload::Workspace {
            id: "project".to_string(),
            configuration: url(WORKSPACE_FILE),
        })
        .await?;

    service
        .add_folders(vec![WorkspaceFolderCreationData::new(url("memory:///ws/locked"))], None)
        .await?;

    let folders = service.get_workspace().map(|workspace| workspace.folders().len());
    assert_eq!(folders, Some(1));
    Ok(())
}

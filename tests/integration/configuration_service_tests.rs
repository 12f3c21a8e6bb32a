use super::*;
use anyhow::Result;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Mutex;
use std::time::Duration;
use test_case::test_case;
use workbench_services::configuration::{
    ConfigurationChangeEvent, ConfigurationEditing, ConfigurationOverrides, ConfigurationPropertySchema,
    ConfigurationScope, ConfigurationTarget, ConfigurationValue, UpdateOptions, WorkbenchState,
    WorkspaceInitializationPayload, WriteOptions,
};
use workbench_services::ConfigurationError;

const FOLDER_A: &str = "memory:///ws/a";

/// default={a:1}, user={a:2,b:1}, workspace={a:3}, folder a={a:4}
async fn layered_workbench() -> Result<TestWorkbench> {
    let workbench = TestWorkbench::new();
    workbench.registry.register_configuration([(
        "a".to_string(),
        ConfigurationPropertySchema::new(json!(1), ConfigurationScope::Resource),
    )]);
    write_json(&workbench.files, USER_SETTINGS, json!({ "a": 2, "b": 1 })).await;
    write_json(
        &workbench.files,
        WORKSPACE_FILE,
        json!({ "folders": [{ "path": "a" }], "settings": { "a": 3 } }),
    )
    .await;
    write_json(&workbench.files, folder_settings(FOLDER_A).as_str(), json!({ "a": 4 })).await;

    workbench
        .service
        .initialize(WorkspaceInitializationPayload::Workspace {
            id: "project".to_string(),
            configuration: url(WORKSPACE_FILE),
        })
        .await?;
    Ok(workbench)
}

fn record_events(workbench: &TestWorkbench) -> (Arc<Mutex<Vec<ConfigurationChangeEvent>>>, workbench_services::core::Subscription) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let subscription = workbench
        .service
        .on_did_change_configuration()
        .subscribe(move |event: &ConfigurationChangeEvent| sink.lock().unwrap().push(event.clone()));
    (events, subscription)
}

#[tokio::test]
async fn test_layer_precedence() -> Result<()> {
    let workbench = layered_workbench().await?;
    let service = &workbench.service;
    assert_eq!(service.get_workbench_state(), WorkbenchState::Workspace);

    let in_folder = ConfigurationOverrides::for_resource(url("memory:///ws/a/src/main.rs"));
    assert_eq!(service.get_value(Some("a"), &in_folder), Some(json!(4)));
    assert_eq!(service.get_value(Some("a"), &ConfigurationOverrides::default()), Some(json!(3)));
    assert_eq!(service.get_value(Some("b"), &in_folder), Some(json!(1)));

    service
        .update_value("a", None, UpdateOptions::target(ConfigurationTarget::Workspace))
        .await?;
    assert_eq!(service.get_value(Some("a"), &ConfigurationOverrides::default()), Some(json!(2)));
    assert_eq!(
        read_json(&workbench.files, &url(WORKSPACE_FILE)),
        json!({ "folders": [{ "path": "a" }], "settings": {} })
    );
    Ok(())
}

#[tokio::test]
async fn test_inspect_reports_every_layer() -> Result<()> {
    let workbench = layered_workbench().await?;
    let inspect = workbench
        .service
        .inspect("a", &ConfigurationOverrides::for_resource(url("memory:///ws/a/lib.rs")));

    assert_eq!(inspect.default_value, Some(json!(1)));
    assert_eq!(inspect.user_value, Some(json!(2)));
    assert_eq!(inspect.user_local_value, Some(json!(2)));
    assert_eq!(inspect.user_remote_value, None);
    assert_eq!(inspect.workspace_value, Some(json!(3)));
    assert_eq!(inspect.workspace_folder_value, Some(json!(4)));
    assert_eq!(inspect.value, Some(json!(4)));
    Ok(())
}

#[test_case("a", Some("memory:///ws/a/x.rs"), "folder" ; "folder value targets the folder")]
#[test_case("a", None, "workspace" ; "workspace value targets the workspace")]
#[test_case("fresh", None, "user" ; "undefined key targets user settings")]
#[tokio::test]
async fn test_derived_write_target(key: &str, resource: Option<&str>, written_to: &str) -> Result<()> {
    let workbench = layered_workbench().await?;
    let mut overrides = ConfigurationOverrides::default();
    overrides.resource = resource.map(url);

    workbench
        .service
        .update_value(key, Some(json!(9)), UpdateOptions::default().with_overrides(overrides.clone()))
        .await?;

    let (resource, value) = match written_to {
        "folder" => {
            let resource = folder_settings(FOLDER_A);
            let value = read_json(&workbench.files, &resource)[key].clone();
            (resource, value)
        }
        "workspace" => {
            let resource = url(WORKSPACE_FILE);
            let value = read_json(&workbench.files, &resource)["settings"][key].clone();
            (resource, value)
        }
        _ => {
            let resource = url(USER_SETTINGS);
            let value = read_json(&workbench.files, &resource)[key].clone();
            (resource, value)
        }
    };
    assert_eq!(value, json!(9), "expected {} to hold the new value", resource);
    assert_eq!(workbench.service.get_value(Some(key), &overrides), Some(json!(9)));
    Ok(())
}

#[tokio::test]
async fn test_unchanged_value_is_not_written() -> Result<()> {
    let workbench = layered_workbench().await?;
    let before = workbench.files.contents(&url(USER_SETTINGS));
    let (events, _subscription) = record_events(&workbench);

    workbench
        .service
        .update_value("b", Some(json!(1)), UpdateOptions::default())
        .await?;

    assert_eq!(workbench.files.contents(&url(USER_SETTINGS)), before);
    assert!(events.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_remove_without_target_clears_every_defining_layer() -> Result<()> {
    let workbench = layered_workbench().await?;
    let in_folder = ConfigurationOverrides::for_resource(url("memory:///ws/a/x.rs"));

    workbench
        .service
        .update_value("a", None, UpdateOptions::default().with_overrides(in_folder.clone()))
        .await?;

    let inspect = workbench.service.inspect("a", &in_folder);
    assert_eq!(inspect.user_local_value, None);
    assert_eq!(inspect.workspace_value, None);
    assert_eq!(inspect.workspace_folder_value, None);
    assert_eq!(inspect.value, Some(json!(1)));
    Ok(())
}

#[tokio::test]
async fn test_memory_target_fires_synchronously() -> Result<()> {
    let workbench = layered_workbench().await?;
    let (events, _subscription) = record_events(&workbench);
    let user_before = workbench.files.contents(&url(USER_SETTINGS));

    workbench
        .service
        .update_value("a", Some(json!(7)), UpdateOptions::target(ConfigurationTarget::Memory))
        .await?;

    {
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source(), ConfigurationTarget::Memory);
        assert!(events[0].affects_configuration("a", None));
    }
    assert_eq!(
        workbench.service.get_value(Some("a"), &ConfigurationOverrides::for_resource(url("memory:///ws/a/x.rs"))),
        Some(json!(7))
    );
    assert_eq!(workbench.files.contents(&url(USER_SETTINGS)), user_before);
    Ok(())
}

#[tokio::test]
async fn test_rejected_targets_fail_fast() -> Result<()> {
    let workbench = layered_workbench().await?;

    let err = workbench
        .service
        .update_value("a", Some(json!(5)), UpdateOptions::target(ConfigurationTarget::Default))
        .await
        .unwrap_err();
    assert!(matches!(err, ConfigurationError::InvalidTarget { target: ConfigurationTarget::Default }));

    let err = workbench
        .service
        .update_value(
            "a",
            Some(json!(5)),
            UpdateOptions::target(ConfigurationTarget::UserRemote).suppress_errors(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ConfigurationError::NoRemoteConfiguration));

    let err = workbench
        .service
        .update_value("a", Some(json!(5)), UpdateOptions::target(ConfigurationTarget::WorkspaceFolder))
        .await
        .unwrap_err();
    assert!(matches!(err, ConfigurationError::MissingResource));
    Ok(())
}

#[tokio::test]
async fn test_remote_user_settings_sit_between_user_and_workspace() -> Result<()> {
    let workbench = TestWorkbench::unbound(true);
    workbench.service.bind_json_editor();
    write_json(&workbench.files, USER_SETTINGS, json!({ "a": 1, "b": 1 })).await;
    write_json(&workbench.files, REMOTE_SETTINGS, json!({ "a": 2 })).await;
    workbench
        .service
        .initialize(WorkspaceInitializationPayload::Empty { id: "empty".to_string() })
        .await?;

    let service = &workbench.service;
    assert_eq!(service.get_value(Some("a"), &ConfigurationOverrides::default()), Some(json!(2)));

    // Defined remotely, so the derived target is the remote file
    service.update_value("a", Some(json!(3)), UpdateOptions::default()).await?;
    assert_eq!(read_json(&workbench.files, &url(REMOTE_SETTINGS)), json!({ "a": 3 }));
    assert_eq!(read_json(&workbench.files, &url(USER_SETTINGS))["a"], json!(1));
    Ok(())
}

#[tokio::test]
async fn test_writes_wait_for_editing_services() -> Result<()> {
    let workbench = TestWorkbench::unbound(false);
    workbench
        .service
        .initialize(WorkspaceInitializationPayload::Empty { id: "empty".to_string() })
        .await?;

    let write = workbench
        .service
        .update_value("late", Some(json!(true)), UpdateOptions::default());
    let bind = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(workbench.files.contents(&url(USER_SETTINGS)), None);
        workbench.service.bind_json_editor();
    };
    let (result, ()) = tokio::join!(write, bind);
    result?;

    assert_eq!(read_json(&workbench.files, &url(USER_SETTINGS)), json!({ "late": true }));
    Ok(())
}

#[tokio::test]
async fn test_file_changes_reload_the_affected_layer() -> Result<()> {
    let workbench = layered_workbench().await?;
    let (events, _subscription) = record_events(&workbench);

    write_json(&workbench.files, USER_SETTINGS, json!({ "a": 2, "b": 5 })).await;
    workbench
        .service
        .handle_file_changes(&[url(USER_SETTINGS), url("memory:///unrelated.json")])
        .await;

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].source(), ConfigurationTarget::UserLocal);
    assert_eq!(events[0].keys(), &["b".to_string()]);
    assert_eq!(
        workbench.service.get_value(Some("b"), &ConfigurationOverrides::default()),
        Some(json!(5))
    );
    Ok(())
}

#[tokio::test]
async fn test_language_overrides() -> Result<()> {
    let workbench = TestWorkbench::new();
    workbench.registry.register_configuration([(
        "editor.tabSize".to_string(),
        ConfigurationPropertySchema::new(json!(4), ConfigurationScope::LanguageOverridable),
    )]);
    write_json(
        &workbench.files,
        USER_SETTINGS,
        json!({ "editor.tabSize": 8, "[rust]": { "editor.tabSize": 2 } }),
    )
    .await;
    workbench
        .service
        .initialize(WorkspaceInitializationPayload::Empty { id: "empty".to_string() })
        .await?;

    let service = &workbench.service;
    assert_eq!(
        service.get_value(Some("editor.tabSize"), &ConfigurationOverrides::for_identifier("rust")),
        Some(json!(2))
    );
    assert_eq!(
        service.get_value(Some("editor.tabSize"), &ConfigurationOverrides::default()),
        Some(json!(8))
    );

    service
        .update_value(
            "editor.tabSize",
            Some(json!(3)),
            UpdateOptions::target(ConfigurationTarget::User)
                .with_overrides(ConfigurationOverrides::for_identifier("go")),
        )
        .await?;
    assert_eq!(read_json(&workbench.files, &url(USER_SETTINGS))["[go]"], json!({ "editor.tabSize": 3 }));
    assert_eq!(
        service.get_typed::<u32>("editor.tabSize", &ConfigurationOverrides::for_identifier("go")),
        Some(3)
    );
    Ok(())
}

#[tokio::test]
async fn test_reinitialize_reports_state_and_name() -> Result<()> {
    let workbench = TestWorkbench::new();
    workbench
        .service
        .initialize(WorkspaceInitializationPayload::Empty { id: "empty".to_string() })
        .await?;

    let states = Arc::new(Mutex::new(Vec::new()));
    let names = Arc::new(Mutex::new(Vec::new()));
    let state_sink = states.clone();
    let name_sink = names.clone();
    let _states = workbench
        .service
        .on_did_change_workbench_state()
        .subscribe(move |state: &WorkbenchState| state_sink.lock().unwrap().push(*state));
    let _names = workbench
        .service
        .on_did_change_workspace_name()
        .subscribe(move |name: &String| name_sink.lock().unwrap().push(name.clone()));

    workbench
        .service
        .initialize(WorkspaceInitializationPayload::Folder {
            id: "app".to_string(),
            uri: url("memory:///projects/app"),
        })
        .await?;

    assert_eq!(*states.lock().unwrap(), vec![WorkbenchState::Folder]);
    assert_eq!(*names.lock().unwrap(), vec!["app".to_string()]);
    assert_eq!(workbench.service.get_workbench_state(), WorkbenchState::Folder);
    Ok(())
}

#[tokio::test]
async fn test_single_folder_settings_back_the_workspace_layer() -> Result<()> {
    let workbench = TestWorkbench::new();
    write_json(
        &workbench.files,
        folder_settings("memory:///projects/app").as_str(),
        json!({ "files.autoSave": "afterDelay" }),
    )
    .await;
    workbench
        .service
        .initialize(WorkspaceInitializationPayload::Folder {
            id: "app".to_string(),
            uri: url("memory:///projects/app"),
        })
        .await?;

    let inspect = workbench
        .service
        .inspect("files.autoSave", &ConfigurationOverrides::default());
    assert_eq!(inspect.workspace_value, Some(json!("afterDelay")));

    workbench
        .service
        .update_value(
            "files.autoSave",
            Some(json!("off")),
            UpdateOptions::target(ConfigurationTarget::Workspace),
        )
        .await?;
    assert_eq!(
        read_json(&workbench.files, &folder_settings("memory:///projects/app")),
        json!({ "files.autoSave": "off" })
    );
    assert_eq!(
        workbench
            .service
            .get_value(Some("files.autoSave"), &ConfigurationOverrides::default()),
        Some(json!("off"))
    );
    Ok(())
}

/// Editor whose every write fails as a full disk would
struct FailingEditor;

#[async_trait::async_trait]
impl ConfigurationEditing for FailingEditor {
    async fn write_configuration(
        &self,
        target: ConfigurationTarget,
        value: ConfigurationValue,
        _options: WriteOptions,
    ) -> Result<(), ConfigurationError> {
        Err(ConfigurationError::editing(
            value.key,
            target,
            std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        ))
    }
}

#[tokio::test]
async fn test_editor_failures_surface_unless_suppressed() -> Result<()> {
    let workbench = TestWorkbench::unbound(false);
    let persister = Arc::new(JsonConfigurationEditor::new(
        workbench.files.clone(),
        workbench.service.settings_locator(),
    ));
    workbench.service.accept_editing(Arc::new(FailingEditor), persister);
    workbench
        .service
        .initialize(WorkspaceInitializationPayload::Empty { id: "empty".to_string() })
        .await?;

    let events = Arc::new(Mutex::new(0usize));
    let sink = events.clone();
    let _subscription = workbench
        .service
        .on_did_change_configuration()
        .subscribe(move |_: &ConfigurationChangeEvent| *sink.lock().unwrap() += 1);

    let err = workbench
        .service
        .update_value("a", Some(json!(1)), UpdateOptions::target(ConfigurationTarget::User))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigurationError::Editing { ref key, target: ConfigurationTarget::User, ref reason, .. }
            if key == "a" && reason == "disk full"
    ));

    workbench
        .service
        .update_value(
            "a",
            Some(json!(1)),
            UpdateOptions::target(ConfigurationTarget::User).suppress_errors(),
        )
        .await?;

    assert_eq!(*events.lock().unwrap(), 0);
    assert_eq!(workbench.service.get_value(Some("a"), &ConfigurationOverrides::default()), None);
    assert!(workbench.files.contents(&url(USER_SETTINGS)).is_none());
    Ok(())
}

use anyhow::Result;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use url::Url;
use workbench_services::config::{ConfigurationSettings, ServiceSettings};
use workbench_services::configuration::{
    ConfigurationLocations, ConfigurationOverrides, ConfigurationRegistry, ConfigurationTarget,
    DiskFileService, InMemorySchemaRegistry, UpdateOptions, WorkspaceInitializationPayload, WorkspaceService,
};
use workbench_services::configuration::schema::{FOLDER_SETTINGS_SCHEMA_ID, USER_SETTINGS_SCHEMA_ID};
use workbench_services::core::SettingsError;

#[tokio::test]
async fn test_service_settings_from_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("workbench.toml");
    fs::write(
        &path,
        r#"
[storage]
change_debounce_ms = 250

[configuration]
folder_settings_path = ".editor/settings.json"

[logging]
level = "debug"
"#,
    )?;

    let settings = ServiceSettings::load(&path).await?;
    assert_eq!(settings.storage.change_debounce_ms, 250);
    assert_eq!(settings.storage.event_capacity, 64);
    assert_eq!(settings.configuration.folder_settings_path, ".editor/settings.json");
    assert_eq!(settings.logging.level, "debug");
    Ok(())
}

#[tokio::test]
async fn test_invalid_service_settings_are_rejected() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("workbench.toml");
    fs::write(&path, "[storage]\nchange_debounce_ms = 0\n")?;

    let err = ServiceSettings::load(&path).await.unwrap_err();
    assert!(matches!(err, SettingsError::Invalid { ref field, .. } if field == "storage.change_debounce_ms"));

    let missing = ServiceSettings::load_or_default(&temp_dir.path().join("absent.toml")).await?;
    assert_eq!(missing, ServiceSettings::default());
    Ok(())
}

#[test]
fn test_locations_require_absolute_paths() {
    let settings = ConfigurationSettings {
        user_settings: Some("relative/settings.json".into()),
        ..ConfigurationSettings::default()
    };
    let err = ConfigurationLocations::from_settings(&settings).unwrap_err();
    assert!(matches!(err, SettingsError::Invalid { ref field, .. } if field == "configuration.user_settings"));
}

#[tokio::test]
async fn test_folder_settings_on_disk() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let folder = temp_dir.path().join("app");
    fs::create_dir_all(folder.join(".workbench"))?;
    fs::write(
        folder.join(".workbench/settings.json"),
        r#"{ "editor.formatOnSave": true }"#,
    )?;

    let settings = ConfigurationSettings {
        user_settings: Some(temp_dir.path().join("user/settings.json")),
        ..ConfigurationSettings::default()
    };
    let schemas = Arc::new(InMemorySchemaRegistry::new());
    let service = WorkspaceService::new(
        &settings,
        Arc::new(DiskFileService::new()),
        Arc::new(ConfigurationRegistry::new()),
        ConfigurationLocations::from_settings(&settings)?,
        Some(schemas.clone()),
    );
    service.bind_json_editor();

    let folder_url = Url::from_directory_path(&folder).map_err(|_| anyhow::anyhow!("invalid folder"))?;
    service
        .initialize(WorkspaceInitializationPayload::Folder {
            id: "app".to_string(),
            uri: folder_url.clone(),
        })
        .await?;

    assert_eq!(
        service.get_value(Some("editor.formatOnSave"), &ConfigurationOverrides::default()),
        Some(json!(true))
    );
    assert!(schemas.get(USER_SETTINGS_SCHEMA_ID).is_some());
    assert!(schemas.get(FOLDER_SETTINGS_SCHEMA_ID).is_some());

    service
        .update_value(
            "editor.formatOnSave",
            Some(json!(false)),
            UpdateOptions::target(ConfigurationTarget::WorkspaceFolder),
        )
        .await?;
    service
        .update_value("window.zoomLevel", Some(json!(1)), UpdateOptions::default())
        .await?;

    let folder_settings: Value =
        serde_json::from_str(&fs::read_to_string(folder.join(".workbench/settings.json"))?)?;
    assert_eq!(folder_settings, json!({ "editor.formatOnSave": false }));
    let user_settings: Value =
        serde_json::from_str(&fs::read_to_string(temp_dir.path().join("user/settings.json"))?)?;
    assert_eq!(user_settings, json!({ "window.zoomLevel": 1 }));
    Ok(())
}

//! Registry of known settings
//!
//! Components register the settings they read, with defaults, scopes and descriptions.
//! The default configuration layer and the settings schemas are both derived from it.

use super::model::ConfigurationModel;
use super::parser::{is_override_key, override_identifiers_from_key};
use super::target::ConfigurationScope;
use crate::core::Emitter;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Declaration of one setting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationPropertySchema {
    #[serde(default)]
    pub default: Value,
    #[serde(default)]
    pub scope: ConfigurationScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
}

impl ConfigurationPropertySchema {
    pub fn new(default: Value, scope: ConfigurationScope) -> Self {
        Self {
            default,
            scope,
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_type(mut self, value_type: impl Into<String>) -> Self {
        self.value_type = Some(value_type.into());
        self
    }
}

#[derive(Default)]
struct RegistryState {
    properties: BTreeMap<String, ConfigurationPropertySchema>,
    /// `[id]` section key to default values inside it
    default_overrides: BTreeMap<String, Map<String, Value>>,
}

/// Thread-safe registry of setting declarations
#[derive(Default)]
pub struct ConfigurationRegistry {
    state: RwLock<RegistryState>,
    on_did_update_configuration: Emitter<Vec<String>>,
}

impl ConfigurationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace settings; fires with the registered keys
    pub fn register_configuration<I>(&self, properties: I)
    where
        I: IntoIterator<Item = (String, ConfigurationPropertySchema)>,
    {
        let mut keys = Vec::new();
        {
            let mut state = self.state.write();
            for (key, schema) in properties {
                if is_override_key(&key) {
                    warn!("Cannot register {}: override sections are not settings", key);
                    continue;
                }
                state.properties.insert(key.clone(), schema);
                keys.push(key);
            }
        }
        self.notify(keys);
    }

    pub fn deregister_configuration(&self, keys: &[String]) {
        let removed: Vec<String> = {
            let mut state = self.state.write();
            keys.iter()
                .filter(|key| state.properties.remove(key.as_str()).is_some())
                .cloned()
                .collect()
        };
        self.notify(removed);
    }

    /// Register default values for an override section such as `[rust]`
    pub fn register_default_overrides(&self, section: &str, defaults: Map<String, Value>) {
        if !is_override_key(section) {
            warn!("Ignoring default overrides for {}: not an override section", section);
            return;
        }
        self.state
            .write()
            .default_overrides
            .insert(section.to_string(), defaults);
        self.notify(vec![section.to_string()]);
    }

    pub fn properties(&self) -> BTreeMap<String, ConfigurationPropertySchema> {
        self.state.read().properties.clone()
    }

    pub fn property(&self, key: &str) -> Option<ConfigurationPropertySchema> {
        self.state.read().properties.get(key).cloned()
    }

    /// Scope of a registered setting; `None` for unregistered keys
    pub fn scope_of(&self, key: &str) -> Option<ConfigurationScope> {
        self.state.read().properties.get(key).map(|schema| schema.scope)
    }

    /// Model of the default layer: every registered default plus default overrides
    pub fn default_model(&self) -> ConfigurationModel {
        let state = self.state.read();
        let mut model = ConfigurationModel::from_entries(
            state
                .properties
                .iter()
                .map(|(key, schema)| (key.clone(), schema.default.clone())),
        );

        for (section, defaults) in &state.default_overrides {
            for identifier in override_identifiers_from_key(section) {
                for (key, value) in defaults {
                    model.set_override_value(&identifier, key, value.clone());
                }
            }
        }
        model
    }

    /// Fires with the keys affected by each registration change
    pub fn on_did_update_configuration(&self) -> &Emitter<Vec<String>> {
        &self.on_did_update_configuration
    }

    fn notify(&self, keys: Vec<String>) {
        if keys.is_empty() {
            return;
        }
        debug!("Configuration registry updated: {} keys", keys.len());
        self.on_did_update_configuration.fire(&keys);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn registered_defaults_form_the_default_model() {
        let registry = ConfigurationRegistry::new();
        registry.register_configuration([
            (
                "editor.tabSize".to_string(),
                ConfigurationPropertySchema::new(json!(4), ConfigurationScope::LanguageOverridable),
            ),
            (
                "update.mode".to_string(),
                ConfigurationPropertySchema::new(json!("default"), ConfigurationScope::Application),
            ),
        ]);
        let mut rust_defaults = Map::new();
        rust_defaults.insert("editor.tabSize".to_string(), json!(8));
        registry.register_default_overrides("[rust]", rust_defaults);

        let model = registry.default_model();
        assert_eq!(model.get_value(Some("editor.tabSize")), Some(json!(4)));
        assert_eq!(
            model.override_config("rust").get_value(Some("editor.tabSize")),
            Some(json!(8))
        );
        assert_eq!(
            registry.scope_of("update.mode"),
            Some(ConfigurationScope::Application)
        );
        assert_eq!(registry.scope_of("unknown"), None);
    }

    #[test]
    fn updates_fire_with_affected_keys() {
        let registry = ConfigurationRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _subscription = {
            let seen = Arc::clone(&seen);
            registry
                .on_did_update_configuration()
                .subscribe(move |keys: &Vec<String>| seen.lock().push(keys.clone()))
        };

        registry.register_configuration([(
            "files.autoSave".to_string(),
            ConfigurationPropertySchema::default(),
        )]);
        registry.deregister_configuration(&["files.autoSave".to_string(), "never".to_string()]);
        registry.deregister_configuration(&["never".to_string()]);

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1], vec!["files.autoSave".to_string()]);
    }
}

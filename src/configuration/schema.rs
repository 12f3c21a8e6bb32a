//! JSON schemas for settings documents

use super::registry::{ConfigurationPropertySchema, ConfigurationRegistry};
use super::target::{ConfigurationScope, FOLDER_SCOPES, REMOTE_USER_SCOPES, WORKSPACE_SCOPES};
use dashmap::DashMap;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

pub const DEFAULT_SETTINGS_SCHEMA_ID: &str = "settings://schemas/default";
pub const USER_SETTINGS_SCHEMA_ID: &str = "settings://schemas/user";
pub const MACHINE_SETTINGS_SCHEMA_ID: &str = "settings://schemas/machine";
pub const WORKSPACE_SETTINGS_SCHEMA_ID: &str = "settings://schemas/workspace";
pub const FOLDER_SETTINGS_SCHEMA_ID: &str = "settings://schemas/folder";

const OVERRIDE_PATTERN: &str = r"^(\[[^\[\]]+\])+$";

/// Sink for generated schemas, such as a JSON language service
pub trait JsonSchemaRegistry: Send + Sync {
    fn register_schema(&self, id: &str, schema: Value);
}

/// Schema registry that keeps the last schema per identifier
#[derive(Debug, Default)]
pub struct InMemorySchemaRegistry {
    schemas: DashMap<String, Value>,
}

impl InMemorySchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<Value> {
        self.schemas.get(id).map(|schema| schema.value().clone())
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl JsonSchemaRegistry for InMemorySchemaRegistry {
    fn register_schema(&self, id: &str, schema: Value) {
        self.schemas.insert(id.to_string(), schema);
    }
}

/// The five settings schemas, keyed by identifier
pub fn build_schemas(registry: &ConfigurationRegistry) -> Vec<(&'static str, Value)> {
    let properties = registry.properties();
    vec![
        (DEFAULT_SETTINGS_SCHEMA_ID, default_schema(&properties)),
        (USER_SETTINGS_SCHEMA_ID, settings_schema(&properties, None)),
        (
            MACHINE_SETTINGS_SCHEMA_ID,
            settings_schema(&properties, Some(REMOTE_USER_SCOPES)),
        ),
        (
            WORKSPACE_SETTINGS_SCHEMA_ID,
            settings_schema(&properties, Some(WORKSPACE_SCOPES)),
        ),
        (
            FOLDER_SETTINGS_SCHEMA_ID,
            settings_schema(&properties, Some(FOLDER_SCOPES)),
        ),
    ]
}

/// Push every schema to `sink`
pub fn register_schemas(registry: &ConfigurationRegistry, sink: &dyn JsonSchemaRegistry) {
    for (id, schema) in build_schemas(registry) {
        sink.register_schema(id, schema);
    }
}

fn default_schema(properties: &BTreeMap<String, ConfigurationPropertySchema>) -> Value {
    let mut defaults = Map::new();
    for (key, property) in properties {
        defaults.insert(key.clone(), property.default.clone());
    }
    json!({
        "type": "object",
        "description": "Default settings",
        "properties": Value::Object(describe(properties, |_| true)),
        "default": Value::Object(defaults),
    })
}

fn settings_schema(
    properties: &BTreeMap<String, ConfigurationPropertySchema>,
    scopes: Option<&[ConfigurationScope]>,
) -> Value {
    let accepted = |scope: ConfigurationScope| scopes.map_or(true, |scopes| scopes.contains(&scope));
    let overridable = describe(properties, |property| {
        property.scope == ConfigurationScope::LanguageOverridable && accepted(property.scope)
    });

    json!({
        "type": "object",
        "properties": Value::Object(describe(properties, |property| accepted(property.scope))),
        "patternProperties": {
            OVERRIDE_PATTERN: {
                "type": "object",
                "properties": Value::Object(overridable),
            }
        },
        "additionalProperties": true,
    })
}

fn describe<F>(properties: &BTreeMap<String, ConfigurationPropertySchema>, include: F) -> Map<String, Value>
where
    F: Fn(&ConfigurationPropertySchema) -> bool,
{
    properties
        .iter()
        .filter(|(_, property)| include(property))
        .filter_map(|(key, property)| {
            serde_json::to_value(property)
                .ok()
                .map(|schema| (key.clone(), schema))
        })
        .collect()
}

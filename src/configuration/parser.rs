//! Parsing of settings documents into configuration models
//!
//! A settings document is a JSON object of dotted keys. Keys of the form `[id]` or
//! `[id1][id2]` hold override sections. Each layer only accepts settings of certain
//! scopes; the raw document is kept so that filtering can be redone when the set of
//! registered settings changes.

use super::model::{add_to_tree, ConfigurationModel, OverrideSection};
use super::registry::ConfigurationRegistry;
use super::target::ConfigurationScope;
use crate::core::errors::ParseError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

static OVERRIDE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\[[^\[\]]+\])+$").expect("override key pattern is valid"));
static OVERRIDE_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\[\]]+)\]").expect("override identifier pattern is valid"));

/// Whether `key` names an override section
pub fn is_override_key(key: &str) -> bool {
    OVERRIDE_KEY.is_match(key)
}

/// Identifiers of an override section key: `[a][b]` gives `a`, `b`
pub fn override_identifiers_from_key(key: &str) -> Vec<String> {
    OVERRIDE_IDENTIFIER
        .captures_iter(key)
        .filter_map(|captures| captures.get(1))
        .map(|identifier| identifier.as_str().trim().to_string())
        .filter(|identifier| !identifier.is_empty())
        .collect()
}

/// Parses one settings document for one layer
#[derive(Debug, Clone)]
pub struct ConfigurationModelParser {
    name: String,
    scopes: Option<Vec<ConfigurationScope>>,
    raw: Option<Map<String, Value>>,
    model: ConfigurationModel,
    restricted_keys: Vec<String>,
    errors: Vec<String>,
}

impl ConfigurationModelParser {
    /// `scopes` restricts the registered settings the layer accepts; `None` accepts all
    pub fn new(name: impl Into<String>, scopes: Option<&[ConfigurationScope]>) -> Self {
        Self {
            name: name.into(),
            scopes: scopes.map(<[ConfigurationScope]>::to_vec),
            raw: None,
            model: ConfigurationModel::empty(),
            restricted_keys: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &ConfigurationModel {
        &self.model
    }

    pub fn raw(&self) -> Option<&Map<String, Value>> {
        self.raw.as_ref()
    }

    /// Keys dropped because their scope is not accepted by this layer
    pub fn restricted_keys(&self) -> &[String] {
        &self.restricted_keys
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Parse a document. Malformed content yields an empty model and a recorded error.
    pub fn parse(&mut self, content: &str, registry: &ConfigurationRegistry) {
        self.errors.clear();
        let raw = if content.trim().is_empty() {
            Map::new()
        } else {
            match serde_json::from_str::<Value>(content) {
                Ok(Value::Object(raw)) => raw,
                Ok(other) => {
                    let err = ParseError::InvalidFormat {
                        context: self.name.clone(),
                        expected: "object".to_string(),
                        found: json_type_name(&other).to_string(),
                    };
                    warn!("{}", err);
                    self.errors.push(err.to_string());
                    Map::new()
                }
                Err(e) => {
                    let err = ParseError::json_error(self.name.clone(), e);
                    warn!("{}", err);
                    self.errors.push(err.to_string());
                    Map::new()
                }
            }
        };
        self.parse_raw(raw, registry);
    }

    pub fn parse_raw(&mut self, raw: Map<String, Value>, registry: &ConfigurationRegistry) {
        self.raw = Some(raw);
        self.reparse(registry);
    }

    /// Redo scope filtering of the last parsed document
    pub fn reparse(&mut self, registry: &ConfigurationRegistry) {
        let Some(raw) = self.raw.as_ref() else {
            return;
        };

        let mut contents = Map::new();
        let mut keys = Vec::new();
        let mut overrides = Vec::new();
        let mut restricted = Vec::new();

        for (key, value) in raw {
            if is_override_key(key) {
                let Value::Object(section) = value else {
                    warn!("{}: override section {} is not an object", self.name, key);
                    continue;
                };
                let mut override_section = OverrideSection {
                    identifiers: override_identifiers_from_key(key),
                    ..OverrideSection::default()
                };
                for (override_key, override_value) in section {
                    if self.accepts_override(override_key, registry) {
                        add_to_tree(&mut override_section.contents, override_key, override_value.clone());
                        override_section.keys.push(override_key.clone());
                    } else {
                        restricted.push(format!("{}.{}", key, override_key));
                    }
                }
                if !override_section.identifiers.is_empty() {
                    overrides.push(override_section);
                }
            } else if self.accepts(key, registry) {
                add_to_tree(&mut contents, key, value.clone());
                keys.push(key.clone());
            } else {
                restricted.push(key.clone());
            }
        }

        if !restricted.is_empty() {
            debug!("{}: ignoring {} settings outside the layer scope", self.name, restricted.len());
        }
        self.restricted_keys = restricted;
        self.model = ConfigurationModel::new(contents, keys, overrides);
    }

    fn accepts(&self, key: &str, registry: &ConfigurationRegistry) -> bool {
        match (&self.scopes, registry.scope_of(key)) {
            (Some(scopes), Some(scope)) => scopes.contains(&scope),
            _ => true,
        }
    }

    fn accepts_override(&self, key: &str, registry: &ConfigurationRegistry) -> bool {
        match registry.scope_of(key) {
            None => true,
            Some(ConfigurationScope::LanguageOverridable) => self.accepts(key, registry),
            Some(_) => false,
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

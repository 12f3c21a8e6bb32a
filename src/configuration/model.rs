//! Configuration models
//!
//! A [`ConfigurationModel`] is the parsed content of one configuration source: a value
//! tree addressed by dotted keys, the keys the source defines, and override sections
//! scoped to context identifiers such as `[rust]`. Models are values; merging or
//! overriding produces a new model.

use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::warn;

/// Settings that apply only when one of `identifiers` is requested
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideSection {
    pub identifiers: Vec<String>,
    pub contents: Map<String, Value>,
    pub keys: Vec<String>,
}

/// Keys that differ between two models
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationChange {
    /// Changed top-level keys, sorted
    pub keys: Vec<String>,
    /// Changed keys per override identifier, sorted by identifier
    pub overrides: Vec<(String, Vec<String>)>,
}

impl ConfigurationChange {
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.overrides.is_empty()
    }

    /// Every key changed in the model
    pub fn all_keys(model: &ConfigurationModel) -> Self {
        ConfigurationModel::empty().compare(model)
    }

    /// Union of several changes
    pub fn merge(changes: impl IntoIterator<Item = ConfigurationChange>) -> Self {
        let mut keys = BTreeSet::new();
        let mut overrides: std::collections::BTreeMap<String, BTreeSet<String>> =
            std::collections::BTreeMap::new();
        for change in changes {
            keys.extend(change.keys);
            for (identifier, override_keys) in change.overrides {
                overrides.entry(identifier).or_default().extend(override_keys);
            }
        }
        Self {
            keys: keys.into_iter().collect(),
            overrides: overrides
                .into_iter()
                .map(|(identifier, keys)| (identifier, keys.into_iter().collect()))
                .collect(),
        }
    }
}

/// Parsed settings of one configuration layer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigurationModel {
    contents: Map<String, Value>,
    keys: Vec<String>,
    overrides: Vec<OverrideSection>,
}

impl ConfigurationModel {
    pub fn new(contents: Map<String, Value>, keys: Vec<String>, overrides: Vec<OverrideSection>) -> Self {
        Self {
            contents,
            keys,
            overrides,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a model from `(dotted key, value)` pairs
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut model = Self::empty();
        for (key, value) in entries {
            model.set_value(&key, value);
        }
        model
    }

    pub fn contents(&self) -> &Map<String, Value> {
        &self.contents
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn overrides(&self) -> &[OverrideSection] {
        &self.overrides
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.contents.is_empty() && self.overrides.is_empty()
    }

    /// Value of a dotted section, or the whole tree when `section` is `None`
    pub fn get_value(&self, section: Option<&str>) -> Option<Value> {
        match section {
            None => Some(Value::Object(self.contents.clone())),
            Some(section) => lookup(&self.contents, section).cloned(),
        }
    }

    /// Sorted, de-duplicated identifiers of all override sections
    pub fn override_identifiers(&self) -> Vec<String> {
        self.overrides
            .iter()
            .flat_map(|section| section.identifiers.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn keys_for_override(&self, identifier: &str) -> Vec<String> {
        self.overrides
            .iter()
            .filter(|section| section.identifiers.iter().any(|id| id == identifier))
            .flat_map(|section| section.keys.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// This model with the override sections for `identifier` applied on top
    pub fn override_config(&self, identifier: &str) -> ConfigurationModel {
        let override_contents = self.override_contents(identifier);
        if override_contents.is_empty() {
            return self.clone();
        }

        let mut contents = self.contents.clone();
        merge_trees(&mut contents, &override_contents);
        ConfigurationModel {
            contents,
            keys: self.keys.clone(),
            overrides: self.overrides.clone(),
        }
    }

    /// Merge `others` on top of this model; later models win on conflict
    pub fn merge(&self, others: &[&ConfigurationModel]) -> ConfigurationModel {
        let mut merged = self.clone();
        for other in others {
            merge_trees(&mut merged.contents, &other.contents);
            add_keys(&mut merged.keys, &other.keys);

            for section in &other.overrides {
                match merged
                    .overrides
                    .iter_mut()
                    .find(|existing| existing.identifiers == section.identifiers)
                {
                    Some(existing) => {
                        merge_trees(&mut existing.contents, &section.contents);
                        add_keys(&mut existing.keys, &section.keys);
                    }
                    None => merged.overrides.push(section.clone()),
                }
            }
        }
        merged
    }

    pub fn set_value(&mut self, key: &str, value: Value) {
        add_to_tree(&mut self.contents, key, value);
        add_keys(&mut self.keys, std::slice::from_ref(&key.to_string()));
    }

    pub fn remove_value(&mut self, key: &str) {
        let segments: Vec<&str> = key.split('.').collect();
        remove_from_tree(&mut self.contents, &segments);
        self.keys.retain(|existing| existing != key);
    }

    pub fn set_override_value(&mut self, identifier: &str, key: &str, value: Value) {
        let index = match self
            .overrides
            .iter()
            .position(|section| section.identifiers.len() == 1 && section.identifiers[0] == identifier)
        {
            Some(index) => index,
            None => {
                self.overrides.push(OverrideSection {
                    identifiers: vec![identifier.to_string()],
                    ..OverrideSection::default()
                });
                self.overrides.len() - 1
            }
        };

        let section = &mut self.overrides[index];
        add_to_tree(&mut section.contents, key, value);
        add_keys(&mut section.keys, std::slice::from_ref(&key.to_string()));
    }

    pub fn remove_override_value(&mut self, identifier: &str, key: &str) {
        let segments: Vec<&str> = key.split('.').collect();
        for section in self
            .overrides
            .iter_mut()
            .filter(|section| section.identifiers.iter().any(|id| id == identifier))
        {
            remove_from_tree(&mut section.contents, &segments);
            section.keys.retain(|existing| existing != key);
        }
        self.overrides.retain(|section| !section.keys.is_empty());
    }

    /// Keys whose presence or value differs from `self` to `other`
    pub fn compare(&self, other: &ConfigurationModel) -> ConfigurationChange {
        let keys = changed_keys(&self.keys, &self.contents, &other.keys, &other.contents);

        let identifiers: BTreeSet<String> = self
            .override_identifiers()
            .into_iter()
            .chain(other.override_identifiers())
            .collect();
        let overrides = identifiers
            .into_iter()
            .filter_map(|identifier| {
                let changed = changed_keys(
                    &self.keys_for_override(&identifier),
                    &self.override_contents(&identifier),
                    &other.keys_for_override(&identifier),
                    &other.override_contents(&identifier),
                );
                (!changed.is_empty()).then_some((identifier, changed))
            })
            .collect();

        ConfigurationChange { keys, overrides }
    }

    fn override_contents(&self, identifier: &str) -> Map<String, Value> {
        let mut contents = Map::new();
        // Single-identifier sections first so `[a][b]` sections win over `[a]`.
        let mut sections: Vec<&OverrideSection> = self
            .overrides
            .iter()
            .filter(|section| section.identifiers.iter().any(|id| id == identifier))
            .collect();
        sections.sort_by_key(|section| section.identifiers.len());
        for section in sections {
            merge_trees(&mut contents, &section.contents);
        }
        contents
    }
}

/// Navigate a value tree by a dotted key
pub fn lookup<'a>(tree: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    if let Some(value) = tree.get(key) {
        return Some(value);
    }
    let mut segments = key.split('.');
    let mut current = tree.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Insert `value` at a dotted key, creating intermediate objects
pub fn add_to_tree(tree: &mut Map<String, Value>, key: &str, value: Value) {
    let segments: Vec<&str> = key.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut current = tree;
    for segment in parents {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            warn!("Ignoring {}: {} is not an object", key, segment);
            return;
        }
        current = match entry {
            Value::Object(map) => map,
            _ => return,
        };
    }
    current.insert(last.to_string(), value);
}

fn remove_from_tree(tree: &mut Map<String, Value>, segments: &[&str]) -> bool {
    match segments {
        [] => false,
        [last] => tree.remove(*last).is_some(),
        [first, rest @ ..] => {
            let (removed, now_empty) = match tree.get_mut(*first) {
                Some(Value::Object(child)) => {
                    let removed = remove_from_tree(child, rest);
                    (removed, child.is_empty())
                }
                _ => (false, false),
            };
            if removed && now_empty {
                tree.remove(*first);
            }
            removed
        }
    }
}

/// Deep merge: objects merge key by key, anything else is replaced
pub fn merge_trees(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        if let (Some(Value::Object(existing)), Value::Object(incoming)) = (target.get_mut(key), value) {
            merge_trees(existing, incoming);
            continue;
        }
        target.insert(key.clone(), value.clone());
    }
}

fn add_keys(keys: &mut Vec<String>, new_keys: &[String]) {
    for key in new_keys {
        if !keys.contains(key) {
            keys.push(key.clone());
        }
    }
}

fn changed_keys(
    from_keys: &[String],
    from: &Map<String, Value>,
    to_keys: &[String],
    to: &Map<String, Value>,
) -> Vec<String> {
    let from_set: BTreeSet<&String> = from_keys.iter().collect();
    let to_set: BTreeSet<&String> = to_keys.iter().collect();

    from_set
        .union(&to_set)
        .filter(|key| {
            !from_set.contains(*key)
                || !to_set.contains(*key)
                || lookup(from, key) != lookup(to, key)
        })
        .map(|key| (*key).clone())
        .collect()
}

//! Configuration change notifications

use super::configuration::Configuration;
use super::model::ConfigurationChange;
use super::target::{ConfigurationOverrides, ConfigurationTarget};
use super::workspace::Workspace;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Fired after the merged configuration changed
#[derive(Debug, Clone)]
pub struct ConfigurationChangeEvent {
    change: ConfigurationChange,
    affected_keys: BTreeSet<String>,
    previous: Arc<Configuration>,
    current: Arc<Configuration>,
    workspace: Option<Workspace>,
    source: ConfigurationTarget,
}

impl ConfigurationChangeEvent {
    pub fn new(
        change: ConfigurationChange,
        previous: Arc<Configuration>,
        current: Arc<Configuration>,
        workspace: Option<Workspace>,
        source: ConfigurationTarget,
    ) -> Self {
        let mut affected_keys = BTreeSet::new();
        let changed = change
            .keys
            .iter()
            .chain(change.overrides.iter().flat_map(|(_, keys)| keys.iter()));
        for key in changed {
            let mut prefix = String::new();
            for segment in key.split('.') {
                if !prefix.is_empty() {
                    prefix.push('.');
                }
                prefix.push_str(segment);
                affected_keys.insert(prefix.clone());
            }
        }

        Self {
            change,
            affected_keys,
            previous,
            current,
            workspace,
            source,
        }
    }

    /// Changed keys, sorted
    pub fn keys(&self) -> &[String] {
        &self.change.keys
    }

    fn changed_keys(&self) -> impl Iterator<Item = &String> {
        self.change
            .keys
            .iter()
            .chain(self.change.overrides.iter().flat_map(|(_, keys)| keys.iter()))
    }

    /// Changed keys per override identifier
    pub fn overrides(&self) -> &[(String, Vec<String>)] {
        &self.change.overrides
    }

    pub fn override_identifiers(&self) -> Vec<&str> {
        self.change
            .overrides
            .iter()
            .map(|(identifier, _)| identifier.as_str())
            .collect()
    }

    /// Changed keys and every section containing one
    pub fn affected_keys(&self) -> &BTreeSet<String> {
        &self.affected_keys
    }

    pub fn previous(&self) -> &Arc<Configuration> {
        &self.previous
    }

    pub fn current(&self) -> &Arc<Configuration> {
        &self.current
    }

    pub fn workspace(&self) -> Option<&Workspace> {
        self.workspace.as_ref()
    }

    /// Layer whose change caused the event
    pub fn source(&self) -> ConfigurationTarget {
        self.source
    }

    /// Whether `section` changed. With overrides, the effective value for that
    /// resource and identifier must also differ.
    pub fn affects_configuration(&self, section: &str, overrides: Option<&ConfigurationOverrides>) -> bool {
        // Ancestors match through `affected_keys`; descendants only under a changed key itself
        let affected = self.affected_keys.contains(section)
            || self.changed_keys().any(|key| {
                section.starts_with(key.as_str()) && section.as_bytes().get(key.len()) == Some(&b'.')
            });
        if !affected {
            return false;
        }

        match overrides {
            Some(overrides) if !overrides.is_empty() => {
                let workspace = self.workspace.as_ref();
                self.previous.get_value(Some(section), overrides, workspace)
                    != self.current.get_value(Some(section), overrides, workspace)
            }
            _ => true,
        }
    }
}

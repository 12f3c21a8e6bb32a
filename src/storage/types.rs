//! Storage bridge payloads

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Snapshot of every stored item
pub type Items = BTreeMap<String, String>;

/// Batch of inserts and deletes, applied inserts first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert: Option<Vec<(String, String)>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<Vec<String>>,
}

impl UpdateRequest {
    pub fn insert(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            insert: Some(vec![(key.into(), value.into())]),
            delete: None,
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            insert: None,
            delete: Some(vec![key.into()]),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.insert.as_ref().map_or(true, Vec::is_empty)
            && self.delete.as_ref().map_or(true, Vec::is_empty)
    }
}

/// Change notification as it crosses the process boundary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemsChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed: Option<Vec<(String, String)>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<Vec<String>>,
}

impl ItemsChange {
    pub fn is_empty(&self) -> bool {
        self.changed.as_ref().map_or(true, Vec::is_empty)
            && self.deleted.as_ref().map_or(true, Vec::is_empty)
    }
}

/// Change notification republished on the consuming side
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageChangeEvent {
    pub changed: BTreeMap<String, String>,
    pub deleted: BTreeSet<String>,
}

impl From<ItemsChange> for StorageChangeEvent {
    fn from(change: ItemsChange) -> Self {
        Self {
            changed: change.changed.unwrap_or_default().into_iter().collect(),
            deleted: change.deleted.unwrap_or_default().into_iter().collect(),
        }
    }
}

impl StorageChangeEvent {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.deleted.is_empty()
    }
}

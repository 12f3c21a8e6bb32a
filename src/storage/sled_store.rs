//! Persistent item store backed by sled

use super::store::ItemStore;
use super::types::Items;
use crate::core::errors::StorageError;
use crate::core::Emitter;
use sled::{Db, Tree};
use std::path::Path;
use tracing::{info, warn};

const ITEMS_TREE: &str = "items";

/// Item store persisted in an embedded sled database
pub struct SledItemStore {
    db: Db,
    items: Tree,
    on_did_change_item: Emitter<String>,
}

impl SledItemStore {
    /// Open (or create) the database at `path`
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("Failed to create storage directory {:?}: {}", parent, e);
            }
        }

        let db = sled::open(path).map_err(|e| StorageError::Database {
            operation: format!("open {}", path.display()),
            message: e.to_string(),
            source: e,
        })?;
        let items = db.open_tree(ITEMS_TREE)?;

        info!("Item store opened at {:?} with {} items", path, items.len());
        Ok(Self {
            db,
            items,
            on_did_change_item: Emitter::new(),
        })
    }

    fn decode(key: &str, bytes: &[u8]) -> Result<String, StorageError> {
        String::from_utf8(bytes.to_vec()).map_err(|_| StorageError::InvalidValue {
            key: key.to_string(),
        })
    }
}

impl ItemStore for SledItemStore {
    fn items(&self) -> Items {
        let mut items = Items::new();
        for entry in self.items.iter() {
            match entry {
                Ok((key, value)) => {
                    let key = String::from_utf8_lossy(&key).into_owned();
                    match Self::decode(&key, &value) {
                        Ok(value) => {
                            items.insert(key, value);
                        }
                        Err(e) => warn!("Skipping stored item: {}", e),
                    }
                }
                Err(e) => warn!("Failed to read stored item: {}", e),
            }
        }
        items
    }

    fn get(&self, key: &str) -> Option<String> {
        match self.items.get(key) {
            Ok(Some(value)) => Self::decode(key, &value).ok(),
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read stored item {}: {}", key, e);
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let previous = self.items.insert(key, value.as_bytes())?;
        if previous.as_deref() != Some(value.as_bytes()) {
            self.on_did_change_item.fire(&key.to_string());
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        if self.items.remove(key)?.is_some() {
            self.on_did_change_item.fire(&key.to_string());
        }
        Ok(())
    }

    fn on_did_change_item(&self) -> &Emitter<String> {
        &self.on_did_change_item
    }

    fn close(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

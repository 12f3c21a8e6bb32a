//! The main-process item store

use super::types::Items;
use crate::core::errors::StorageError;
use crate::core::Emitter;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// Key/value store owned by the main process.
///
/// Every successful `set` or `delete` fires the key on [`ItemStore::on_did_change_item`],
/// one event per key, with no coalescing.
pub trait ItemStore: Send + Sync {
    /// Snapshot of every stored item
    fn items(&self) -> Items;

    fn get(&self, key: &str) -> Option<String>;

    /// Insert or overwrite an item
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove an item; removing a missing key is a no-op
    fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Raw per-key change notifications
    fn on_did_change_item(&self) -> &Emitter<String>;

    /// Flush and close the store
    fn close(&self) -> Result<(), StorageError>;
}

/// Volatile store used when no database is configured
#[derive(Debug, Default)]
pub struct InMemoryItemStore {
    items: RwLock<Items>,
    on_did_change_item: Emitter<String>,
    closed: AtomicBool,
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Items) -> Self {
        Self {
            items: RwLock::new(items),
            ..Self::default()
        }
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}

impl ItemStore for InMemoryItemStore {
    fn items(&self) -> Items {
        self.items.read().clone()
    }

    fn get(&self, key: &str) -> Option<String> {
        self.items.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.ensure_open()?;
        let previous = self
            .items
            .write()
            .insert(key.to_string(), value.to_string());
        if previous.as_deref() != Some(value) {
            self.on_did_change_item.fire(&key.to_string());
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.ensure_open()?;
        let removed = self.items.write().remove(key);
        if removed.is_some() {
            self.on_did_change_item.fire(&key.to_string());
        }
        Ok(())
    }

    fn on_did_change_item(&self) -> &Emitter<String> {
        &self.on_did_change_item
    }

    fn close(&self) -> Result<(), StorageError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

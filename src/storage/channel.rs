//! Server side of the storage bridge
//!
//! Serves the main-process [`ItemStore`] over a [`Channel`]. Raw per-key changes are
//! buffered for a debounce window; when the window expires each buffered key is
//! re-read from the live store, so a listener sees the final state of every key
//! touched in the window rather than a replay of the individual writes.

use super::lifecycle::initialize_store;
use super::store::ItemStore;
use super::types::{ItemsChange, Items, UpdateRequest};
use crate::config::StorageSettings;
use crate::core::errors::IpcError;
use crate::core::{Barrier, Subscription};
use crate::ipc::Channel;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub const GET_ITEMS: &str = "getItems";
pub const UPDATE_ITEMS: &str = "updateItems";
pub const ON_DID_CHANGE_ITEMS: &str = "onDidChangeItems";

struct ChannelState {
    store: Arc<dyn ItemStore>,
    ready: Barrier,
    debounce: Duration,
    pending: Mutex<BTreeSet<String>>,
    flush_scheduled: AtomicBool,
    sender: broadcast::Sender<Value>,
}

/// Storage channel served by the process that owns the store
pub struct StorageChannel {
    state: Arc<ChannelState>,
    _store_subscription: Subscription,
}

impl StorageChannel {
    /// Wrap a store and start its initialization.
    ///
    /// Must be called from within a Tokio runtime. Calls issued before
    /// initialization has finished wait for it.
    pub fn new(store: Arc<dyn ItemStore>, settings: &StorageSettings) -> Self {
        let (sender, _) = broadcast::channel(settings.event_capacity.max(1));
        let state = Arc::new(ChannelState {
            store,
            ready: Barrier::new(),
            debounce: settings.change_debounce(),
            pending: Mutex::new(BTreeSet::new()),
            flush_scheduled: AtomicBool::new(false),
            sender,
        });

        let weak: Weak<ChannelState> = Arc::downgrade(&state);
        let store_subscription = state.store.on_did_change_item().subscribe(move |key| {
            if let Some(state) = weak.upgrade() {
                ChannelState::record_change(&state, key);
            }
        });

        let init_state = Arc::clone(&state);
        tokio::spawn(async move {
            initialize_store(init_state.store.as_ref());
            init_state.ready.open();
        });

        Self {
            state,
            _store_subscription: store_subscription,
        }
    }

    /// Wait until start-up bookkeeping has completed
    pub async fn when_ready(&self) {
        self.state.ready.wait().await;
    }

    pub async fn get_items(&self) -> Items {
        self.when_ready().await;
        self.state.store.items()
    }

    /// Apply inserts, then deletes
    pub async fn update_items(&self, request: UpdateRequest) -> Result<(), IpcError> {
        self.when_ready().await;

        for (key, value) in request.insert.unwrap_or_default() {
            self.state.store.set(&key, &value)?;
        }
        for key in request.delete.unwrap_or_default() {
            self.state.store.delete(&key)?;
        }
        Ok(())
    }

    /// Number of remote listeners currently attached
    pub fn listener_count(&self) -> usize {
        self.state.sender.receiver_count()
    }
}

impl ChannelState {
    fn record_change(state: &Arc<Self>, key: &str) {
        state.pending.lock().insert(key.to_string());

        if state.flush_scheduled.swap(true, Ordering::AcqRel) {
            return;
        }

        let weak = Arc::downgrade(state);
        let debounce = state.debounce;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(debounce).await;
                    if let Some(state) = weak.upgrade() {
                        state.flush();
                    }
                });
            }
            Err(_) => {
                warn!("No runtime available to debounce storage changes, flushing immediately");
                state.flush();
            }
        }
    }

    fn flush(&self) {
        self.flush_scheduled.store(false, Ordering::Release);
        let keys = std::mem::take(&mut *self.pending.lock());
        if keys.is_empty() {
            return;
        }

        let mut changed = Vec::new();
        let mut deleted = Vec::new();
        for key in keys {
            match self.store.get(&key) {
                Some(value) => changed.push((key, value)),
                None => deleted.push(key),
            }
        }

        let change = ItemsChange {
            changed: (!changed.is_empty()).then_some(changed),
            deleted: (!deleted.is_empty()).then_some(deleted),
        };
        debug!(
            "Flushing storage changes: {} changed, {} deleted",
            change.changed.as_ref().map_or(0, Vec::len),
            change.deleted.as_ref().map_or(0, Vec::len)
        );

        match serde_json::to_value(&change) {
            Ok(payload) => {
                // No receivers is not an error: nobody is listening yet.
                let _ = self.sender.send(payload);
            }
            Err(e) => warn!("Failed to serialize storage change: {}", e),
        }
    }
}

#[async_trait]
impl Channel for StorageChannel {
    async fn call(&self, command: &str, arg: Value) -> Result<Value, IpcError> {
        match command {
            GET_ITEMS => {
                let items: Vec<(String, String)> = self.get_items().await.into_iter().collect();
                Ok(serde_json::to_value(items)?)
            }
            UPDATE_ITEMS => {
                let request: UpdateRequest =
                    serde_json::from_value(arg).map_err(|e| IpcError::InvalidArgument {
                        command: command.to_string(),
                        reason: e.to_string(),
                    })?;
                self.update_items(request).await?;
                Ok(Value::Null)
            }
            _ => Err(IpcError::UnknownCommand {
                command: command.to_string(),
            }),
        }
    }

    fn listen(&self, event: &str) -> Result<broadcast::Receiver<Value>, IpcError> {
        match event {
            ON_DID_CHANGE_ITEMS => Ok(self.state.sender.subscribe()),
            _ => Err(IpcError::UnknownEvent {
                event: event.to_string(),
            }),
        }
    }
}

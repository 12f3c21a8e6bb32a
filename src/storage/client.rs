//! Consumer side of the storage bridge

use super::channel::{GET_ITEMS, ON_DID_CHANGE_ITEMS, UPDATE_ITEMS};
use super::types::{Items, ItemsChange, StorageChangeEvent, UpdateRequest};
use crate::core::errors::IpcError;
use crate::core::Emitter;
use crate::ipc::Channel;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Proxy presenting the remote item store as a local key/value interface
pub struct StorageChannelClient {
    channel: Arc<dyn Channel>,
    on_did_change_storage: Emitter<StorageChangeEvent>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl StorageChannelClient {
    /// Connect to a storage channel and start republishing its change events.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(channel: Arc<dyn Channel>) -> Result<Self, IpcError> {
        let mut receiver = channel.listen(ON_DID_CHANGE_ITEMS)?;
        let on_did_change_storage = Emitter::new();

        let emitter = on_did_change_storage.clone();
        let forwarder = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(payload) => match serde_json::from_value::<ItemsChange>(payload) {
                        Ok(change) if change.is_empty() => {}
                        Ok(change) => emitter.fire(&StorageChangeEvent::from(change)),
                        Err(e) => error!(
                            "{}",
                            IpcError::InvalidEvent {
                                event: ON_DID_CHANGE_ITEMS.to_string(),
                                reason: e.to_string(),
                            }
                        ),
                    },
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Storage client missed {} change notifications", missed);
                    }
                    Err(RecvError::Closed) => {
                        debug!("Storage change stream closed");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            channel,
            on_did_change_storage,
            forwarder: Mutex::new(Some(forwarder)),
        })
    }

    pub async fn get_items(&self) -> Result<Items, IpcError> {
        let result = self.channel.call(GET_ITEMS, Value::Null).await?;
        let pairs: Vec<(String, String)> =
            serde_json::from_value(result).map_err(|e| IpcError::InvalidArgument {
                command: GET_ITEMS.to_string(),
                reason: e.to_string(),
            })?;
        Ok(pairs.into_iter().collect())
    }

    pub async fn update_items(&self, request: UpdateRequest) -> Result<(), IpcError> {
        let arg = serde_json::to_value(&request)?;
        self.channel.call(UPDATE_ITEMS, arg).await?;
        Ok(())
    }

    /// Remote changes, parsed; fires only when something changed or was deleted
    pub fn on_did_change_storage(&self) -> &Emitter<StorageChangeEvent> {
        &self.on_did_change_storage
    }

    /// Stop listening for remote changes. The remote store stays open; it is
    /// closed only by the process that owns it.
    pub fn close(&self) {
        if let Some(forwarder) = self.forwarder.lock().take() {
            forwarder.abort();
        }
    }
}

impl Drop for StorageChannelClient {
    fn drop(&mut self) {
        self.close();
    }
}

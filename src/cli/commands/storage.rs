use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::cli::args::StorageAction;
use crate::cli::commands::Command;
use crate::config::{paths, ServiceSettings};
use crate::ipc::Channel;
use crate::storage::{ItemStore, SledItemStore, StorageChannel, StorageChannelClient, UpdateRequest};

pub struct StorageCommand {
    action: StorageAction,
    settings: ServiceSettings,
}

impl StorageCommand {
    pub fn new(action: StorageAction, settings: ServiceSettings) -> Self {
        Self { action, settings }
    }
}

#[async_trait]
impl Command for StorageCommand {
    async fn execute(&self) -> Result<()> {
        let path = match &self.settings.storage.database {
            Some(path) => path.clone(),
            None => paths::storage_database()?,
        };
        let store: Arc<dyn ItemStore> = Arc::new(
            SledItemStore::open(&path).with_context(|| format!("Failed to open {}", path.display()))?,
        );

        // Items go through the same channel a remote process would use
        let channel: Arc<dyn Channel> = Arc::new(StorageChannel::new(Arc::clone(&store), &self.settings.storage));
        let client = StorageChannelClient::new(channel)?;

        match &self.action {
            StorageAction::Dump => {
                let items = client.get_items().await?;
                println!("{}", serde_json::to_string_pretty(&items)?);
            }

            StorageAction::Get { key } => match client.get_items().await?.get(key) {
                Some(value) => println!("{}", value),
                None => eprintln!("{} is not stored", key),
            },

            StorageAction::Set { key, value } => {
                client
                    .update_items(UpdateRequest::insert(key.as_str(), value.as_str()))
                    .await?;
                eprintln!("Stored {}", key);
            }

            StorageAction::Delete { key } => {
                client.update_items(UpdateRequest::delete(key.as_str())).await?;
                eprintln!("Deleted {}", key);
            }
        }

        client.close();
        store.close()?;
        Ok(())
    }
}

use anyhow::Result;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::timeout;
use workbench_services::config::StorageSettings;
use workbench_services::ipc::Channel;
use workbench_services::storage::lifecycle::{
    CURRENT_SESSION_DATE_KEY, INSTALLATION_ID_KEY, LAST_SESSION_DATE_KEY,
};
use workbench_services::storage::{
    InMemoryItemStore, ItemStore, SledItemStore, StorageChangeEvent, StorageChannel, StorageChannelClient,
    UpdateRequest,
};
use workbench_services::core::Subscription;

const DEBOUNCE_MS: u64 = 30;

fn settings() -> StorageSettings {
    StorageSettings {
        change_debounce_ms: DEBOUNCE_MS,
        ..StorageSettings::default()
    }
}

/// Channel and client over `store`, connected once start-up writes have flushed
async fn connect(store: Arc<dyn ItemStore>) -> Result<(Arc<StorageChannel>, StorageChannelClient)> {
    let channel = Arc::new(StorageChannel::new(store, &settings()));
    channel.when_ready().await;
    tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS * 4)).await;

    let remote: Arc<dyn Channel> = channel.clone();
    let client = StorageChannelClient::new(remote)?;
    Ok((channel, client))
}

fn forward_changes(client: &StorageChannelClient) -> (mpsc::UnboundedReceiver<StorageChangeEvent>, Subscription) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let subscription = client
        .on_did_change_storage()
        .subscribe(move |event: &StorageChangeEvent| {
            let _ = sender.send(event.clone());
        });
    (receiver, subscription)
}

/// Every change event until none arrives for a while
async fn drain(receiver: &mut mpsc::UnboundedReceiver<StorageChangeEvent>) -> Vec<StorageChangeEvent> {
    let mut events = Vec::new();
    while let Ok(Some(event)) = timeout(Duration::from_millis(DEBOUNCE_MS * 8), receiver.recv()).await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_start_up_records_installation_and_sessions() -> Result<()> {
    let (_channel, client) = connect(Arc::new(InMemoryItemStore::new())).await?;
    let items = client.get_items().await?;

    assert!(items.contains_key(INSTALLATION_ID_KEY));
    assert!(items.contains_key(CURRENT_SESSION_DATE_KEY));
    // No earlier session on a fresh store
    assert!(!items.contains_key(LAST_SESSION_DATE_KEY));
    Ok(())
}

#[tokio::test]
async fn test_window_reports_final_state_per_key() -> Result<()> {
    let (_channel, client) = connect(Arc::new(InMemoryItemStore::new())).await?;
    let (mut receiver, _subscription) = forward_changes(&client);

    client.update_items(UpdateRequest::insert("kept", "1")).await?;
    client.update_items(UpdateRequest::insert("kept", "2")).await?;
    client.update_items(UpdateRequest::insert("gone", "x")).await?;
    client.update_items(UpdateRequest::delete("gone")).await?;

    let events = drain(&mut receiver).await;
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].changed,
        BTreeMap::from([("kept".to_string(), "2".to_string())])
    );
    assert_eq!(events[0].deleted, BTreeSet::from(["gone".to_string()]));
    Ok(())
}

#[tokio::test]
async fn test_closed_client_stops_receiving() -> Result<()> {
    let (channel, client) = connect(Arc::new(InMemoryItemStore::new())).await?;
    let (mut receiver, _subscription) = forward_changes(&client);
    assert_eq!(channel.listener_count(), 1);

    client.close();
    channel.update_items(UpdateRequest::insert("after-close", "1")).await?;

    assert!(drain(&mut receiver).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_sled_store_survives_restart() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("storage.db");

    let installation_id = {
        let store: Arc<dyn ItemStore> = Arc::new(SledItemStore::open(&path)?);
        let (_channel, client) = connect(store.clone()).await?;
        client.update_items(UpdateRequest::insert("window.zoom", "1.5")).await?;
        let id = client.get_items().await?.get(INSTALLATION_ID_KEY).cloned();
        client.close();
        store.close()?;
        id
    };

    let store: Arc<dyn ItemStore> = Arc::new(SledItemStore::open(&path)?);
    let (_channel, client) = connect(store).await?;
    let items = client.get_items().await?;
    assert_eq!(items.get("window.zoom").map(String::as_str), Some("1.5"));
    assert_eq!(items.get(INSTALLATION_ID_KEY).cloned(), installation_id);
    assert!(items.contains_key(LAST_SESSION_DATE_KEY));
    Ok(())
}

#[derive(Debug, Clone)]
enum Op {
    Set(String, String),
    Delete(String),
}

fn op() -> impl Strategy<Value = Op> {
    let key = prop::sample::select(vec!["a", "b", "c"]).prop_map(str::to_string);
    prop_oneof![
        (key.clone(), "[0-9]{1,2}").prop_map(|(key, value)| Op::Set(key, value)),
        key.prop_map(Op::Delete),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn test_items_and_events_reflect_final_state(ops in prop::collection::vec(op(), 1..12)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let (_channel, client) = connect(Arc::new(InMemoryItemStore::new())).await.unwrap();
            let (mut receiver, _subscription) = forward_changes(&client);

            let mut expected: BTreeMap<String, Option<String>> = BTreeMap::new();
            for op in &ops {
                match op {
                    Op::Set(key, value) => {
                        client.update_items(UpdateRequest::insert(key.as_str(), value.as_str())).await.unwrap();
                        expected.insert(key.clone(), Some(value.clone()));
                    }
                    Op::Delete(key) => {
                        client.update_items(UpdateRequest::delete(key.as_str())).await.unwrap();
                        expected.insert(key.clone(), None);
                    }
                }
            }

            let items = client.get_items().await.unwrap();
            for (key, value) in &expected {
                assert_eq!(items.get(key), value.as_ref());
            }

            // Replay the reported changes; the last report per key must be its final state.
            // Deleting a key that never existed is not a change, so it may go unreported.
            let mut reported: BTreeMap<String, Option<String>> = BTreeMap::new();
            for event in drain(&mut receiver).await {
                for (key, value) in event.changed {
                    reported.insert(key, Some(value));
                }
                for key in event.deleted {
                    reported.insert(key, None);
                }
            }
            for (key, value) in &reported {
                assert_eq!(expected.get(key), Some(value));
            }
            for (key, value) in &expected {
                if value.is_some() {
                    assert_eq!(reported.get(key), Some(value));
                }
            }
        });
    }
}

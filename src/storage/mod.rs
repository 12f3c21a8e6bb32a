//! Inter-process storage bridge
//!
//! The process that owns the key/value store serves it through a [`StorageChannel`];
//! other processes reach it through a [`StorageChannelClient`] over any
//! [`crate::ipc::Channel`].

pub mod channel;
pub mod client;
pub mod lifecycle;
pub mod sled_store;
pub mod store;
pub mod types;

pub use channel::{StorageChannel, GET_ITEMS, ON_DID_CHANGE_ITEMS, UPDATE_ITEMS};
pub use client::StorageChannelClient;
pub use lifecycle::initialize_store;
pub use sled_store::SledItemStore;
pub use store::{InMemoryItemStore, ItemStore};
pub use types::{Items, ItemsChange, StorageChangeEvent, UpdateRequest};

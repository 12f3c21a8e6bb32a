//! Process-boundary channel contract
//!
//! A channel exposes named calls and named events. Arguments, results and event
//! payloads are JSON values, the form they take on the wire; the transport that
//! carries them between processes is not part of this crate.

use crate::core::errors::IpcError;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

/// A channel served on one side of a process boundary and consumed on the other
#[async_trait]
pub trait Channel: Send + Sync {
    /// Invoke a named call and wait for its result
    async fn call(&self, command: &str, arg: Value) -> Result<Value, IpcError>;

    /// Subscribe to a named event
    fn listen(&self, event: &str) -> Result<broadcast::Receiver<Value>, IpcError>;
}

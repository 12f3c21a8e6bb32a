//! # workbench-services
//!
//! Process-spanning services of an editor workbench: a storage bridge that serves a
//! key/value store to other processes, and a layered configuration service that owns
//! the settings and folders of the open workspace.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use workbench_services::config::ConfigurationSettings;
//! use workbench_services::configuration::{
//!     ConfigurationLocations, ConfigurationOverrides, ConfigurationRegistry, InMemoryFileService,
//!     WorkspaceInitializationPayload, WorkspaceService,
//! };
//!
//! # async fn run() -> anyhow::Result<()> {
//! let service = WorkspaceService::new(
//!     &ConfigurationSettings::default(),
//!     Arc::new(InMemoryFileService::new()),
//!     Arc::new(ConfigurationRegistry::new()),
//!     ConfigurationLocations::new("memory:///user/settings.json".parse()?),
//!     None,
//! );
//! service.bind_json_editor();
//! service
//!     .initialize(WorkspaceInitializationPayload::Empty { id: "empty".into() })
//!     .await?;
//! let tab_size = service.get_value(Some("editor.tabSize"), &ConfigurationOverrides::default());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`] - Storage bridge server channel and client
//! - [`configuration`] - Configuration layers, merge engine and workspace folders
//! - [`ipc`] - Channel abstraction the bridge is served over
//! - [`config`] - Service settings and platform paths
//! - [`core`] - Errors, events, readiness gates and resource helpers
//! - [`cli`] - Command-line interface

/// Command-line interface and argument parsing
#[cfg(feature = "cli")]
pub mod cli;
/// Service settings, platform paths and validation
pub mod config;
/// Layered workspace configuration
pub mod configuration;
/// Core types and utilities
pub mod core;
/// Channel abstraction for cross-process calls and events
pub mod ipc;
/// Inter-process storage bridge
pub mod storage;

pub use crate::core::errors::{ConfigurationError, IpcError, StorageError, WorkbenchError};

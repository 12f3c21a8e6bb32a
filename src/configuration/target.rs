//! Configuration layers, scopes and request options

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Layer a configuration read is attributed to or a write is directed at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfigurationTarget {
    Default,
    /// Local user settings. Writing to `User` and `UserLocal` is equivalent.
    User,
    UserLocal,
    UserRemote,
    Workspace,
    WorkspaceFolder,
    Memory,
}

impl ConfigurationTarget {
    pub const ALL: [ConfigurationTarget; 7] = [
        ConfigurationTarget::Default,
        ConfigurationTarget::User,
        ConfigurationTarget::UserLocal,
        ConfigurationTarget::UserRemote,
        ConfigurationTarget::Workspace,
        ConfigurationTarget::WorkspaceFolder,
        ConfigurationTarget::Memory,
    ];

    /// Targets backed by a settings file on disk
    pub fn is_persisted(self) -> bool {
        !matches!(self, ConfigurationTarget::Default | ConfigurationTarget::Memory)
    }

    fn as_str(self) -> &'static str {
        match self {
            ConfigurationTarget::Default => "default",
            ConfigurationTarget::User => "user",
            ConfigurationTarget::UserLocal => "userLocal",
            ConfigurationTarget::UserRemote => "userRemote",
            ConfigurationTarget::Workspace => "workspace",
            ConfigurationTarget::WorkspaceFolder => "workspaceFolder",
            ConfigurationTarget::Memory => "memory",
        }
    }
}

impl fmt::Display for ConfigurationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigurationTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|target| target.as_str().eq_ignore_ascii_case(s))
            .or(match s.to_ascii_lowercase().as_str() {
                "folder" => Some(ConfigurationTarget::WorkspaceFolder),
                "remote" => Some(ConfigurationTarget::UserRemote),
                _ => None,
            })
            .ok_or_else(|| format!("unknown configuration target '{}'", s))
    }
}

/// Where a registered setting may be defined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfigurationScope {
    /// Only in local user settings
    Application,
    /// Local or remote user settings
    Machine,
    #[default]
    Window,
    Resource,
    LanguageOverridable,
    MachineOverridable,
}

/// Scopes accepted by the remote user layer
pub const REMOTE_USER_SCOPES: &[ConfigurationScope] = &[
    ConfigurationScope::Machine,
    ConfigurationScope::Window,
    ConfigurationScope::Resource,
    ConfigurationScope::LanguageOverridable,
    ConfigurationScope::MachineOverridable,
];

/// Scopes accepted by the workspace layer (and the folder of a single-folder workspace)
pub const WORKSPACE_SCOPES: &[ConfigurationScope] = &[
    ConfigurationScope::Window,
    ConfigurationScope::Resource,
    ConfigurationScope::LanguageOverridable,
    ConfigurationScope::MachineOverridable,
];

/// Scopes accepted by folder layers of a multi-folder workspace
pub const FOLDER_SCOPES: &[ConfigurationScope] = &[
    ConfigurationScope::Resource,
    ConfigurationScope::LanguageOverridable,
    ConfigurationScope::MachineOverridable,
];

/// Selects the folder layer (by resource) and override section (by identifier) of a read or write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationOverrides {
    pub resource: Option<Url>,
    pub override_identifier: Option<String>,
}

impl ConfigurationOverrides {
    pub fn for_resource(resource: Url) -> Self {
        Self {
            resource: Some(resource),
            override_identifier: None,
        }
    }

    pub fn for_identifier(identifier: impl Into<String>) -> Self {
        Self {
            resource: None,
            override_identifier: Some(identifier.into()),
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.override_identifier = Some(identifier.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.resource.is_none() && self.override_identifier.is_none()
    }
}

/// Options of a configuration write
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    pub overrides: ConfigurationOverrides,
    /// Derived from where the key is currently defined when absent
    pub target: Option<ConfigurationTarget>,
    /// Log editing failures instead of returning them
    pub suppress_error_notification: bool,
}

impl UpdateOptions {
    pub fn target(target: ConfigurationTarget) -> Self {
        Self {
            target: Some(target),
            ..Self::default()
        }
    }

    pub fn with_overrides(mut self, overrides: ConfigurationOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn suppress_errors(mut self) -> Self {
        self.suppress_error_notification = true;
        self
    }
}

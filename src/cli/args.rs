use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Inspect and edit workbench settings, workspace folders and stored items.
///
/// # Examples
///
/// ```bash
/// # Effective value of a setting in a folder
/// workbench --folder ./app config get editor.tabSize
///
/// # Where a setting is defined
/// workbench --workspace project.code-workspace config inspect files.exclude
///
/// # Add a folder to a multi-folder workspace
/// workbench --workspace project.code-workspace folders add ../lib
/// ```
#[derive(Parser)]
#[command(name = "workbench")]
#[command(about = "Workbench settings, workspace folders and storage")]
#[command(version)]
pub struct Cli {
    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Service settings file (default: platform config directory)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    #[command(flatten)]
    pub workspace: WorkspaceArgs,
}

/// Which workspace to open; an empty workspace when neither is given
#[derive(Args, Debug, Clone, Default)]
pub struct WorkspaceArgs {
    /// Open a multi-folder workspace file
    #[arg(long, global = true, conflicts_with = "folder")]
    pub workspace: Option<PathBuf>,

    /// Open a single folder
    #[arg(long, global = true)]
    pub folder: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read and write settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Manage the folders of a multi-folder workspace
    Folders {
        #[command(subcommand)]
        action: FoldersAction,
    },

    /// Read and write stored items
    Storage {
        #[command(subcommand)]
        action: StorageAction,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Print the effective value of a setting, or every setting
    Get {
        key: Option<String>,

        /// Resource whose folder settings apply
        #[arg(long)]
        resource: Option<PathBuf>,

        /// Language override, e.g. `rust`
        #[arg(long)]
        language: Option<String>,
    },

    /// Show the value of a setting in each layer
    Inspect {
        key: String,

        #[arg(long)]
        resource: Option<PathBuf>,

        #[arg(long)]
        language: Option<String>,
    },

    /// Write a setting. The value is parsed as JSON, falling back to a string.
    Set {
        key: String,
        value: String,

        /// Layer to write: user, userRemote, workspace, folder
        #[arg(long)]
        target: Option<String>,

        #[arg(long)]
        resource: Option<PathBuf>,

        #[arg(long)]
        language: Option<String>,
    },

    /// Remove a setting from every layer that defines it, or from one layer
    Unset {
        key: String,

        #[arg(long)]
        target: Option<String>,

        #[arg(long)]
        resource: Option<PathBuf>,
    },

    /// List the keys defined in each layer
    Keys,
}

#[derive(Subcommand, Debug, Clone)]
pub enum FoldersAction {
    /// List the folders of the workspace
    List,

    /// Add folders
    Add {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Insert at this position instead of appending
        #[arg(long)]
        index: Option<usize>,

        /// Display name; only valid with a single folder
        #[arg(long)]
        name: Option<String>,
    },

    /// Remove folders
    Remove {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum StorageAction {
    /// Print every stored item as JSON
    Dump,

    /// Print one item
    Get { key: String },

    /// Store an item
    Set { key: String, value: String },

    /// Delete an item
    Delete { key: String },
}

pub mod args;
pub mod commands;

pub use args::{Cli, Commands, ConfigAction, FoldersAction, StorageAction, WorkspaceArgs};

use crate::config::{paths, ServiceSettings};
use anyhow::Result;
use clap::Parser;
use commands::config::ConfigCommand;
use commands::folders::FoldersCommand;
use commands::storage::StorageCommand;
use commands::Command;

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    let settings_path = match &cli.settings {
        Some(path) => path.clone(),
        None => paths::service_settings_file()?,
    };
    let settings = ServiceSettings::load_or_default(&settings_path).await?;

    // Initialize logging
    let log_level = if cli.verbose {
        "debug".to_string()
    } else {
        settings.logging.level.to_lowercase()
    };
    tracing_subscriber::fmt()
        .with_env_filter(format!("workbench_services={}", log_level))
        .with_writer(std::io::stderr)
        .init();

    let command: Box<dyn Command + Send + Sync> = match cli.command {
        Commands::Config { action } => Box::new(ConfigCommand::new(action, settings, cli.workspace)),
        Commands::Folders { action } => Box::new(FoldersCommand::new(action, settings, cli.workspace)),
        Commands::Storage { action } => Box::new(StorageCommand::new(action, settings)),
    };
    command.execute().await
}

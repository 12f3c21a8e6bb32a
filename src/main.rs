use anyhow::Result;
use workbench_services::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run_cli().await
}

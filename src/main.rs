//! tokensend - ERC20 transfer client
//!
#![doc = "tokensend - ERC20 transfer client"]
#![doc = "Main entry point for the tokensend application."]

use anyhow::Result;

use tokensend::cli::Cli;
use tokensend::commands;
use tokensend::config::Config;
use tokensend::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Initialize tracing
    init_logging(&config.logging)?;

    tracing::debug!(command = ?cli.command, "Starting tokensend");
    commands::run(cli, config).await
}

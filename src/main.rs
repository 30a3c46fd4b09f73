//! Notification consumer entry point.

use anyhow::Result;
use std::time::Duration;

use notification_consumer::cli::{Cli, Commands};
use notification_consumer::commands;
use notification_consumer::config::Config;
use notification_consumer::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let (mut config, warnings) = Config::load_with_warnings(config_path, &cli)?;

    if let Commands::Run {
        database: Some(path),
    } = &cli.command
    {
        config.storage.database_path = path.clone();
    }

    init_logging(&config.logging)?;
    for warning in &warnings {
        tracing::warn!("{}", warning);
    }
    tracing::debug!("Loaded configuration from {}", config_path);

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Run { .. } => {
            tracing::info!("Starting notification consumers");
            commands::run::run_consumers(config).await
        }
        Commands::Health { timeout_ms } => {
            commands::health::run_health(&config, Duration::from_millis(timeout_ms)).await
        }
        Commands::Publish {
            topic,
            event_type,
            payload,
        } => commands::publish::run_publish(&config, &topic, &event_type, &payload).await,
    }
}

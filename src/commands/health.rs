use std::time::Duration;

use crate::config::Config;
use crate::error::{NotificationError, Result};
use crate::health;

/// Prints the health report and fails when any component is down.
pub async fn run_health(config: &Config, timeout: Duration) -> Result<()> {
    let report = health::check(
        &config.kafka_client_config()?,
        &config.storage.database_path,
        timeout,
    )
    .await;

    println!();
    report.to_table().printstd();
    println!();

    match report.components.iter().find(|c| !c.healthy) {
        None => Ok(()),
        Some(c) if c.name == "kafka" => Err(NotificationError::Broker(c.detail.clone()).into()),
        Some(c) => Err(NotificationError::Storage(c.detail.clone()).into()),
    }
}

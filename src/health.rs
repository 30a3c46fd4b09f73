//! Reachability checks for the broker and the local store.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use prettytable::{format, row, Table};
use serde::Serialize;

use crate::consumer::kafka::probe_cluster;
use crate::consumer::KafkaClientConfig;
use crate::storage::SqliteStorage;

/// Broker metadata timeout used by the `health` command.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Result of checking one dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentStatus {
    pub name: &'static str,
    pub healthy: bool,
    pub detail: String,
}

impl ComponentStatus {
    fn up(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            healthy: true,
            detail: detail.into(),
        }
    }

    fn down(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            healthy: false,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub components: Vec<ComponentStatus>,
}

impl HealthReport {
    /// True when every component is healthy.
    pub fn is_healthy(&self) -> bool {
        self.components.iter().all(|c| c.healthy)
    }

    /// One row per component under a header row.
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
        table.add_row(row!["Component", "Status", "Detail"]);

        for component in &self.components {
            let status = if component.healthy {
                "healthy"
            } else {
                "unhealthy"
            };
            table.add_row(row![component.name, status, component.detail]);
        }
        table
    }
}

impl fmt::Display for HealthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_table())
    }
}

/// Fetches cluster metadata within `timeout`.
pub async fn check_broker(config: &KafkaClientConfig, timeout: Duration) -> ComponentStatus {
    match probe_cluster(config, timeout).await {
        Ok(summary) => ComponentStatus::up(
            "kafka",
            format!("{} broker(s), {} topic(s)", summary.brokers, summary.topics),
        ),
        Err(e) => ComponentStatus::down("kafka", e.to_string()),
    }
}

/// Opens the database and runs `SELECT 1`.
pub fn check_storage(database_path: &Path) -> ComponentStatus {
    match SqliteStorage::new_with_path(database_path).and_then(|storage| storage.ping()) {
        Ok(()) => ComponentStatus::up("database", database_path.display().to_string()),
        Err(e) => ComponentStatus::down("database", e.to_string()),
    }
}

/// Runs both checks.
pub async fn check(
    config: &KafkaClientConfig,
    database_path: &Path,
    timeout: Duration,
) -> HealthReport {
    let storage = {
        let path = database_path.to_path_buf();
        tokio::task::spawn_blocking(move || check_storage(&path))
            .await
            .unwrap_or_else(|e| ComponentStatus::down("database", e.to_string()))
    };
    let broker = check_broker(config, timeout).await;

    HealthReport {
        components: vec![broker, storage],
    }
}

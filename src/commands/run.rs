use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::consumer::{drain, BrokerConnector, ConsumerSupervisor, DrainReport, KafkaConnector};
use crate::error::Result;
use crate::notification::{EmailSender, MockEmailService, ServiceRegistry};
use crate::routing::EventRouter;
use crate::storage::SqliteStorage;

/// Runs every configured consumer against Kafka until Ctrl-C or SIGTERM.
pub async fn run_consumers(config: Config) -> Result<()> {
    let connector = Arc::new(KafkaConnector::new(config.kafka_client_config()?));
    let shutdown = CancellationToken::new();

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal_token.cancel();
    });

    let report = run_with(
        &config,
        connector,
        Arc::new(MockEmailService::new()),
        shutdown,
    )
    .await?;

    if report.panicked > 0 || report.aborted > 0 {
        warn!(
            stopped = report.stopped,
            panicked = report.panicked,
            aborted = report.aborted,
            "Some consumers did not stop cleanly"
        );
    }
    Ok(())
}

/// Starts the consumers on `connector` and drains them once `shutdown` fires.
///
/// # Errors
///
/// Returns an error if the database cannot be opened.
pub async fn run_with(
    config: &Config,
    connector: Arc<dyn BrokerConnector>,
    email: Arc<dyn EmailSender>,
    shutdown: CancellationToken,
) -> Result<DrainReport> {
    let storage = SqliteStorage::new_with_path(&config.storage.database_path)?;
    info!(path = %storage.path().display(), "Opened notification database");

    let router = EventRouter::new(Arc::new(ServiceRegistry::new(storage, email)));
    let bindings = config.bindings();
    for binding in &bindings {
        info!(
            topic = %binding.topic,
            group_suffix = %binding.group_suffix,
            event_types = binding.routes.len(),
            "Configured topic binding"
        );
    }

    let supervisor =
        ConsumerSupervisor::new(connector, router, config.kafka.consumer_group_id.clone())
            .with_reconnect_delay(config.consumer.reconnect_delay());
    let handles = supervisor.run(bindings, shutdown).await;

    let report = drain(handles, config.consumer.shutdown_grace()).await;
    info!(
        stopped = report.stopped,
        aborted = report.aborted,
        "All consumers drained"
    );
    Ok(report)
}

/// Waits for Ctrl-C, or SIGTERM on unix.
pub async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c() => {}
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    ctrl_c().await;
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C"),
        Err(e) => {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

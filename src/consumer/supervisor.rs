//! Launches and drains the topic consumer loops.
//!
//! The supervisor spawns one independent task per [`TopicBinding`]. All
//! tasks share one cancellation token. A loop that dies is logged and left
//! dead: there is no restart.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::binding::TopicBinding;
use super::broker::BrokerConnector;
use super::state::ConnectionState;
use super::topic_loop::{TopicConsumerLoop, DEFAULT_RECONNECT_DELAY};
use crate::routing::EventRouter;

/// Handle on a spawned topic consumer loop.
#[derive(Debug)]
pub struct ConsumerHandle {
    topic: String,
    group_id: String,
    state: watch::Receiver<ConnectionState>,
    task: JoinHandle<()>,
}

impl ConsumerHandle {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// The loop's current state. After the loop exits this stays at its
    /// final value.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Waits until the loop reaches `target`.
    ///
    /// Returns `false` if the loop ended without ever reaching it.
    pub async fn wait_for_state(&mut self, target: ConnectionState) -> bool {
        self.state.wait_for(|state| *state == target).await.is_ok()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the task to exit.
    ///
    /// # Errors
    ///
    /// Returns the `JoinError` if the task panicked or was aborted.
    pub async fn join(self) -> Result<(), JoinError> {
        self.task.await
    }

    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Result of draining the loops during teardown.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainReport {
    /// Loops that exited on their own
    pub stopped: usize,
    /// Loops that panicked
    pub panicked: usize,
    /// Loops aborted after the grace period
    pub aborted: usize,
}

/// Builds and spawns topic consumer loops.
pub struct ConsumerSupervisor {
    connector: Arc<dyn BrokerConnector>,
    router: EventRouter,
    group_prefix: String,
    reconnect_delay: Duration,
}

impl ConsumerSupervisor {
    pub fn new(
        connector: Arc<dyn BrokerConnector>,
        router: EventRouter,
        group_prefix: impl Into<String>,
    ) -> Self {
        Self {
            connector,
            router,
            group_prefix: group_prefix.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Consumer group id used for `binding`.
    pub fn group_id(&self, binding: &TopicBinding) -> String {
        format!("{}-{}", self.group_prefix, binding.group_suffix)
    }

    /// Spawns one loop per binding and returns immediately.
    pub fn spawn(
        &self,
        bindings: Vec<TopicBinding>,
        shutdown: &CancellationToken,
    ) -> Vec<ConsumerHandle> {
        bindings
            .into_iter()
            .map(|binding| self.spawn_loop(binding, shutdown.clone()))
            .collect()
    }

    /// Spawns the loops, then waits for `shutdown` to fire.
    ///
    /// The handles are returned so the caller can drain the loops during
    /// teardown.
    pub async fn run(
        &self,
        bindings: Vec<TopicBinding>,
        shutdown: CancellationToken,
    ) -> Vec<ConsumerHandle> {
        let handles = self.spawn(bindings, &shutdown);
        info!(consumers = handles.len(), "Consumer supervisor started");

        shutdown.cancelled().await;

        info!("Consumer supervisor received shutdown signal");
        handles
    }

    fn spawn_loop(&self, binding: TopicBinding, shutdown: CancellationToken) -> ConsumerHandle {
        let group_id = self.group_id(&binding);
        let topic = binding.topic.clone();
        let consumer_loop = TopicConsumerLoop::new(
            binding,
            group_id.clone(),
            Arc::clone(&self.connector),
            self.router.clone(),
        )
        .with_reconnect_delay(self.reconnect_delay);
        let state = consumer_loop.watch_state();

        let task_topic = topic.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = consumer_loop.run(shutdown).await {
                error!(topic = %task_topic, error = %e, "Topic consumer failed unexpectedly");
            }
        });

        ConsumerHandle {
            topic,
            group_id,
            state,
            task,
        }
    }
}

/// Waits up to `grace` for every loop to exit, aborting the stragglers.
pub async fn drain(handles: Vec<ConsumerHandle>, grace: Duration) -> DrainReport {
    let deadline = tokio::time::Instant::now() + grace;
    let mut report = DrainReport::default();

    for handle in handles {
        let topic = handle.topic.clone();
        let abort = handle.task.abort_handle();
        match tokio::time::timeout_at(deadline, handle.join()).await {
            Ok(Ok(())) => report.stopped += 1,
            Ok(Err(e)) => {
                error!(topic = %topic, error = %e, "Topic consumer task panicked");
                report.panicked += 1;
            }
            Err(_) => {
                warn!(topic = %topic, "Topic consumer did not stop within the grace period");
                abort.abort();
                report.aborted += 1;
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::binding::EventFamily;
    use crate::consumer::memory::MemoryBroker;
    use crate::routing::{EventHandler, HandlerError, HandlerRegistry};

    struct EmptyRegistry;

    impl HandlerRegistry for EmptyRegistry {
        fn acquire(&self) -> Result<Box<dyn EventHandler>, HandlerError> {
            Err("no handlers in this test".into())
        }
    }

    fn supervisor(broker: &MemoryBroker) -> ConsumerSupervisor {
        ConsumerSupervisor::new(
            Arc::new(broker.connector()),
            EventRouter::new(Arc::new(EmptyRegistry)),
            "svc",
        )
        .with_reconnect_delay(Duration::from_millis(10))
    }

    #[test]
    fn test_group_id_uses_binding_suffix() {
        let broker = MemoryBroker::new();
        let binding = TopicBinding::for_family(EventFamily::Tenant, "tenants");
        assert_eq!(supervisor(&broker).group_id(&binding), "svc-tenant-events");
    }

    #[tokio::test]
    async fn test_spawned_loops_stop_on_cancel() {
        let broker = MemoryBroker::new();
        let shutdown = CancellationToken::new();
        let bindings = vec![
            TopicBinding::for_family(EventFamily::User, "users"),
            TopicBinding::for_family(EventFamily::Booking, "bookings"),
        ];

        let mut handles = supervisor(&broker).spawn(bindings, &shutdown);
        for handle in handles.iter_mut() {
            assert!(handle.wait_for_state(ConnectionState::Consuming).await);
        }
        shutdown.cancel();

        let report = drain(handles, Duration::from_secs(5)).await;

        assert_eq!(report.stopped, 2);
        assert_eq!(report.aborted, 0);
        assert_eq!(broker.open_handles(), 0);
    }
}

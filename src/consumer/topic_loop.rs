//! The per-topic consumer loop.
//!
//! One [`TopicConsumerLoop`] owns one broker subscription for the lifetime
//! of the process:
//!
//! 1. Connect and subscribe, retrying with a fixed delay until it succeeds
//!    or shutdown is requested.
//! 2. Poll one message at a time and route it.
//! 3. Commit the message only when its [`DispatchOutcome`] allows it.
//!    Otherwise rewind so the same message comes back on the next poll.
//! 4. On shutdown or an unrecoverable broker error, release the handle and
//!    stop.
//!
//! Shutdown is observed while waiting for a connection, while sleeping
//! between attempts, and while blocked in poll. A message that has already
//! been received is always dispatched to completion, and its outcome still
//! decides whether it is committed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::binding::TopicBinding;
use super::broker::{BrokerConnector, BrokerConsumer, BrokerError, InboundMessage};
use super::metrics;
use super::state::{ConnectionState, StateCell};
use crate::events::{EnvelopeError, EventEnvelope};
use crate::routing::{DispatchOutcome, EventRouter};

/// Delay between connection attempts unless configured otherwise.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(2000);

/// Consumes one topic binding.
pub struct TopicConsumerLoop {
    binding: TopicBinding,
    group_id: String,
    connector: Arc<dyn BrokerConnector>,
    router: EventRouter,
    reconnect_delay: Duration,
    state: StateCell,
}

impl TopicConsumerLoop {
    pub fn new(
        binding: TopicBinding,
        group_id: impl Into<String>,
        connector: Arc<dyn BrokerConnector>,
        router: EventRouter,
    ) -> Self {
        Self {
            binding,
            group_id: group_id.into(),
            connector,
            router,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            state: StateCell::new(),
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn binding(&self) -> &TopicBinding {
        &self.binding
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Receiver that observes every state change. It keeps the final state
    /// after the loop is dropped.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Runs until `shutdown` is cancelled or the broker fails unrecoverably.
    ///
    /// The broker handle is released on every exit path and the state ends
    /// as [`ConnectionState::Stopped`].
    ///
    /// # Errors
    ///
    /// Returns the broker error that ended the loop. Connection failures
    /// are retried and never returned.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), BrokerError> {
        let span = info_span!(
            "topic_consumer",
            topic = %self.binding.topic,
            group_id = %self.group_id,
        );
        self.run_until_stopped(shutdown).instrument(span).await
    }

    async fn run_until_stopped(&self, shutdown: CancellationToken) -> Result<(), BrokerError> {
        info!("Starting topic consumer");

        let Some(mut consumer) = self.connect(&shutdown).await else {
            self.state.set(ConnectionState::Stopped);
            info!("Topic consumer stopped before connecting");
            return Ok(());
        };

        let result = self.consume(consumer.as_mut(), &shutdown).await;
        consumer.close();
        self.state.set(ConnectionState::Stopped);

        match &result {
            Ok(()) => info!("Topic consumer stopped"),
            Err(e) => error!(error = %e, "Topic consumer terminated"),
        }
        result
    }

    /// Returns `None` if shutdown was requested before a subscription was
    /// established.
    async fn connect(&self, shutdown: &CancellationToken) -> Option<Box<dyn BrokerConsumer>> {
        let mut attempt: u64 = 0;

        loop {
            if shutdown.is_cancelled() {
                return None;
            }
            attempt += 1;
            self.state.set(ConnectionState::Connecting);

            let result = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return None,
                result = self.connect_and_subscribe() => result,
            };

            match result {
                Ok(consumer) => {
                    info!(attempt, "Connected and subscribed");
                    return Some(consumer);
                }
                Err(e) => {
                    self.state.set(ConnectionState::Disconnected);
                    metrics::record_connect_failure(&self.binding.topic);
                    warn!(
                        attempt,
                        error = %e,
                        delay_ms = self.reconnect_delay.as_millis() as u64,
                        "Failed to initialize consumer (attempt {}), retrying",
                        attempt
                    );

                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => return None,
                        _ = tokio::time::sleep(self.reconnect_delay) => {}
                    }
                }
            }
        }
    }

    async fn connect_and_subscribe(&self) -> Result<Box<dyn BrokerConsumer>, BrokerError> {
        let mut consumer = self.connector.connect(&self.group_id).await?;
        if let Err(e) = consumer.subscribe(&self.binding.topic) {
            consumer.close();
            return Err(e);
        }
        self.state.set(ConnectionState::Subscribed);
        Ok(consumer)
    }

    async fn consume(
        &self,
        consumer: &mut dyn BrokerConsumer,
        shutdown: &CancellationToken,
    ) -> Result<(), BrokerError> {
        self.state.set(ConnectionState::Consuming);

        loop {
            let message = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested");
                    return Ok(());
                }
                polled = consumer.poll() => polled?,
            };

            self.process(consumer, message).await?;
        }
    }

    async fn process(
        &self,
        consumer: &mut dyn BrokerConsumer,
        message: InboundMessage,
    ) -> Result<(), BrokerError> {
        let envelope = match EventEnvelope::decode(message.payload()) {
            Ok(envelope) => envelope,
            Err(EnvelopeError::MissingDiscriminator { event_id }) => {
                metrics::record_decode_error(&self.binding.topic, "missing_event_type");
                warn!(
                    partition = message.partition,
                    offset = message.offset,
                    event_id = %event_id,
                    "Envelope has no eventType, leaving offset uncommitted"
                );
                return self.redeliver(consumer, &message).await;
            }
            Err(e) => {
                metrics::record_decode_error(&self.binding.topic, "malformed");
                error!(
                    partition = message.partition,
                    offset = message.offset,
                    error = %e,
                    "Failed to parse event envelope, leaving offset uncommitted"
                );
                return self.redeliver(consumer, &message).await;
            }
        };

        let span = info_span!(
            "dispatch",
            event_id = %envelope.event_id,
            event_type = %envelope.event_type,
            partition = message.partition,
            offset = message.offset,
        );
        self.dispatch_and_settle(consumer, &message, &envelope)
            .instrument(span)
            .await
    }

    async fn dispatch_and_settle(
        &self,
        consumer: &mut dyn BrokerConsumer,
        message: &InboundMessage,
        envelope: &EventEnvelope,
    ) -> Result<(), BrokerError> {
        debug!("Received event");

        let outcome = self.router.dispatch(&self.binding.routes, envelope).await;
        metrics::record_outcome(&self.binding.topic, &outcome);

        match &outcome {
            DispatchOutcome::Handled => debug!("Event handled"),
            DispatchOutcome::SkippedUnknownType => {
                warn!("Unknown event type for this topic, skipping")
            }
            DispatchOutcome::SkippedUndecodablePayload => {
                warn!("Payload does not describe its event type, skipping")
            }
            DispatchOutcome::Failed(e) => {
                error!(error = %e, "Error processing event, message will be redelivered")
            }
        }

        if !outcome.should_commit() {
            return self.redeliver(consumer, message).await;
        }

        match consumer.commit(message).await {
            Ok(()) => metrics::record_commit(&self.binding.topic),
            Err(e) => {
                metrics::record_commit_failure(&self.binding.topic);
                warn!(error = %e, "Failed to commit offset, message may be redelivered");
            }
        }
        Ok(())
    }

    /// Rewinds so the next poll returns `message` again, then yields so a
    /// message that keeps failing cannot monopolise the worker thread.
    async fn redeliver(
        &self,
        consumer: &mut dyn BrokerConsumer,
        message: &InboundMessage,
    ) -> Result<(), BrokerError> {
        match consumer.rewind(message).await {
            Ok(()) => metrics::record_redelivery(&self.binding.topic),
            Err(e @ BrokerError::PartitionRevoked { .. }) => {
                warn!(
                    partition = message.partition,
                    offset = message.offset,
                    error = %e,
                    "Partition revoked before rewind, new owner resumes from the committed offset"
                );
            }
            Err(e) => return Err(e),
        }
        tokio::task::yield_now().await;
        Ok(())
    }
}

//! Kafka implementation of the broker abstraction.
//!
//! Uses an rdkafka [`StreamConsumer`] per topic loop with auto-commit
//! disabled. Blocking client calls (metadata, commit, seek) run on the
//! blocking pool so they never stall the runtime.
//!
//! # Example
//!
//! ```rust,no_run
//! use notification_consumer::consumer::config::KafkaClientConfig;
//! use notification_consumer::consumer::kafka::KafkaConnector;
//! use notification_consumer::consumer::BrokerConnector;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let connector = KafkaConnector::new(KafkaClientConfig::new("localhost:9092", "svc"));
//! let mut consumer = connector.connect("svc-user-events").await?;
//! consumer.subscribe("user-events")?;
//! let message = consumer.poll().await?;
//! consumer.commit(&message).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, CommitMode, Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::{Offset, TopicPartitionList};
use tracing::{debug, info, warn};

use super::broker::{BrokerConnector, BrokerConsumer, BrokerError, InboundMessage};
use super::config::KafkaClientConfig;
use crate::events::EventEnvelope;

/// Default timeout for metadata requests used as a reachability probe.
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(1);

/// Pause before polling again after a transient transport error.
const TRANSIENT_ERROR_PAUSE: Duration = Duration::from_millis(250);

const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

/// Builds Kafka consumers from a shared client configuration.
#[derive(Debug, Clone)]
pub struct KafkaConnector {
    config: KafkaClientConfig,
    metadata_timeout: Duration,
}

impl KafkaConnector {
    pub fn new(config: KafkaClientConfig) -> Self {
        Self {
            config,
            metadata_timeout: METADATA_TIMEOUT,
        }
    }

    /// Overrides how long `connect` waits for cluster metadata.
    pub fn with_metadata_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_timeout = timeout;
        self
    }

    pub fn config(&self) -> &KafkaClientConfig {
        &self.config
    }
}

#[async_trait]
impl BrokerConnector for KafkaConnector {
    async fn connect(&self, group_id: &str) -> Result<Box<dyn BrokerConsumer>, BrokerError> {
        let mut client_config = ClientConfig::new();
        for (key, value) in self.config.consumer_settings(group_id) {
            client_config.set(key, value);
        }
        client_config.set("enable.partition.eof", "false");

        let consumer: StreamConsumer = client_config
            .create()
            .map_err(|e| BrokerError::Connect(format!("Failed to create consumer: {}", e)))?;
        let consumer = Arc::new(consumer);

        // Client creation succeeds without a reachable cluster; metadata does not.
        let probe = Arc::clone(&consumer);
        let timeout = self.metadata_timeout;
        tokio::task::spawn_blocking(move || probe.fetch_metadata(None, timeout).map(|_| ()))
            .await
            .map_err(|e| BrokerError::Connect(e.to_string()))?
            .map_err(|e| BrokerError::Connect(format!("Cluster unreachable: {}", e)))?;

        info!(
            brokers = %self.config.brokers,
            group_id = %group_id,
            auto_offset_reset = %self.config.auto_offset_reset,
            security_protocol = %self.config.security_protocol.as_str(),
            "Connected to Kafka"
        );

        Ok(Box::new(KafkaTopicConsumer {
            consumer: Some(consumer),
            group_id: group_id.to_string(),
        }))
    }
}

/// A Kafka consumer-group membership owned by one topic loop.
pub struct KafkaTopicConsumer {
    consumer: Option<Arc<StreamConsumer>>,
    group_id: String,
}

impl KafkaTopicConsumer {
    fn handle(&self) -> Result<Arc<StreamConsumer>, BrokerError> {
        self.consumer
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| BrokerError::Poll(format!("Consumer {} is closed", self.group_id)))
    }
}

fn is_transient(error: &KafkaError) -> bool {
    matches!(
        error.rdkafka_error_code(),
        Some(
            RDKafkaErrorCode::AllBrokersDown
                | RDKafkaErrorCode::BrokerTransportFailure
                | RDKafkaErrorCode::OperationTimedOut
                | RDKafkaErrorCode::PartitionEOF
        )
    )
}

#[async_trait]
impl BrokerConsumer for KafkaTopicConsumer {
    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        let consumer = self.handle().map_err(|e| BrokerError::Subscribe {
            topic: topic.to_string(),
            reason: e.to_string(),
        })?;
        consumer
            .subscribe(&[topic])
            .map_err(|e| BrokerError::Subscribe {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    async fn poll(&mut self) -> Result<InboundMessage, BrokerError> {
        let consumer = self.handle()?;
        loop {
            match consumer.recv().await {
                Ok(message) => {
                    return Ok(InboundMessage {
                        topic: message.topic().to_string(),
                        partition: message.partition(),
                        offset: message.offset(),
                        key: message.key().map(<[u8]>::to_vec),
                        value: message.payload().map(<[u8]>::to_vec),
                    });
                }
                Err(e) if is_transient(&e) => {
                    warn!(
                        group_id = %self.group_id,
                        error = %e,
                        "Transient broker error, retrying poll"
                    );
                    tokio::time::sleep(TRANSIENT_ERROR_PAUSE).await;
                }
                Err(e) => return Err(BrokerError::Poll(e.to_string())),
            }
        }
    }

    async fn commit(&mut self, message: &InboundMessage) -> Result<(), BrokerError> {
        let commit_error = |reason: String| BrokerError::Commit {
            topic: message.topic.clone(),
            partition: message.partition,
            offset: message.offset,
            reason,
        };

        let consumer = self.handle().map_err(|e| commit_error(e.to_string()))?;
        let mut positions = TopicPartitionList::new();
        positions
            .add_partition_offset(
                &message.topic,
                message.partition,
                Offset::Offset(message.offset + 1),
            )
            .map_err(|e| commit_error(e.to_string()))?;

        tokio::task::spawn_blocking(move || consumer.commit(&positions, CommitMode::Sync))
            .await
            .map_err(|e| commit_error(e.to_string()))?
            .map_err(|e| commit_error(e.to_string()))
    }

    async fn rewind(&mut self, message: &InboundMessage) -> Result<(), BrokerError> {
        let seek_error = |reason: String| BrokerError::Seek {
            topic: message.topic.clone(),
            partition: message.partition,
            offset: message.offset,
            reason,
        };

        let consumer = self.handle().map_err(|e| seek_error(e.to_string()))?;
        let topic = message.topic.clone();
        let partition = message.partition;
        let offset = message.offset;

        let seek = tokio::task::spawn_blocking(move || {
            consumer
                .seek(&topic, partition, Offset::Offset(offset), SEEK_TIMEOUT)
                .map_err(|e| {
                    // Seek errors carry no code, so ownership is checked directly.
                    let owned = consumer
                        .assignment()
                        .map(|assigned| assigned.find_partition(&topic, partition).is_some())
                        .unwrap_or(true);
                    (e.to_string(), owned)
                })
        })
        .await
        .map_err(|e| seek_error(e.to_string()))?;

        match seek {
            Ok(()) => Ok(()),
            Err((reason, true)) => Err(seek_error(reason)),
            Err((reason, false)) => Err(BrokerError::PartitionRevoked {
                topic: message.topic.clone(),
                partition: message.partition,
                reason,
            }),
        }
    }

    fn close(&mut self) {
        if let Some(consumer) = self.consumer.take() {
            consumer.unsubscribe();
            debug!(group_id = %self.group_id, "Kafka consumer closed");
        }
    }
}

impl Drop for KafkaTopicConsumer {
    fn drop(&mut self) {
        self.close();
    }
}

/// Summary returned by a successful metadata probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSummary {
    pub brokers: usize,
    pub topics: usize,
}

/// Requests cluster metadata to confirm the brokers are reachable.
///
/// # Errors
///
/// Returns `BrokerError::Connect` if the client cannot be created or no
/// metadata arrives within `timeout`.
pub async fn probe_cluster(
    config: &KafkaClientConfig,
    timeout: Duration,
) -> Result<ClusterSummary, BrokerError> {
    let mut client_config = ClientConfig::new();
    for (key, value) in config.connection_settings() {
        client_config.set(key, value);
    }

    let consumer: BaseConsumer = client_config
        .create()
        .map_err(|e| BrokerError::Connect(format!("Failed to create client: {}", e)))?;

    tokio::task::spawn_blocking(move || {
        consumer
            .fetch_metadata(None, timeout)
            .map(|metadata| ClusterSummary {
                brokers: metadata.brokers().len(),
                topics: metadata.topics().len(),
            })
    })
    .await
    .map_err(|e| BrokerError::Connect(e.to_string()))?
    .map_err(|e| BrokerError::Connect(e.to_string()))
}

/// Produces envelopes to Kafka.
pub struct KafkaPublisher {
    producer: FutureProducer,
    timeout: Duration,
}

impl KafkaPublisher {
    /// Creates a producer from the shared client settings.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Connect` if the producer cannot be created.
    pub fn new(config: &KafkaClientConfig) -> Result<Self, BrokerError> {
        let mut client_config = ClientConfig::new();
        for (key, value) in config.connection_settings() {
            client_config.set(key, value);
        }
        client_config.set("message.timeout.ms", "5000");

        let producer: FutureProducer = client_config
            .create()
            .map_err(|e| BrokerError::Connect(format!("Failed to create producer: {}", e)))?;

        Ok(Self {
            producer,
            timeout: Duration::from_secs(5),
        })
    }

    /// Publishes an envelope keyed by its `eventType`.
    ///
    /// Returns the partition and offset the broker assigned.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the broker rejects the record.
    pub async fn publish(
        &self,
        topic: &str,
        envelope: &EventEnvelope,
    ) -> crate::error::Result<(i32, i64)> {
        let payload = envelope.encode()?;
        let record = FutureRecord::to(topic)
            .key(envelope.event_type.as_str())
            .payload(&payload);

        match self.producer.send(record, Timeout::After(self.timeout)).await {
            Ok((partition, offset)) => {
                debug!(
                    topic = %topic,
                    partition = partition,
                    offset = offset,
                    event_type = %envelope.event_type,
                    event_id = %envelope.event_id,
                    "Envelope published"
                );
                Ok((partition, offset))
            }
            Err((e, _)) => Err(crate::error::NotificationError::Broker(format!(
                "Failed to publish to {}: {}",
                topic, e
            ))
            .into()),
        }
    }
}

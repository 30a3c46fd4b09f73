//! Broker client abstraction.
//!
//! The consumer loop talks to the broker only through these traits, so the
//! same loop runs against Kafka ([`super::kafka`]) and the in-process broker
//! used by tests (`consumer::memory`, behind the `test-util` feature).

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by a broker client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The client could not be built or the cluster is unreachable.
    #[error("Failed to connect: {0}")]
    Connect(String),

    /// The subscription request was rejected.
    #[error("Failed to subscribe to {topic}: {reason}")]
    Subscribe { topic: String, reason: String },

    /// Fetching the next message failed unrecoverably.
    #[error("Poll failed: {0}")]
    Poll(String),

    /// The offset could not be committed.
    #[error("Commit of {topic}[{partition}]@{offset} failed: {reason}")]
    Commit {
        topic: String,
        partition: i32,
        offset: i64,
        reason: String,
    },

    /// The partition could not be repositioned for redelivery.
    #[error("Seek of {topic}[{partition}] to {offset} failed: {reason}")]
    Seek {
        topic: String,
        partition: i32,
        offset: i64,
        reason: String,
    },

    /// The partition was reassigned to another group member before it could
    /// be repositioned. The new owner resumes from the committed offset.
    #[error("Partition {topic}[{partition}] is no longer assigned: {reason}")]
    PartitionRevoked {
        topic: String,
        partition: i32,
        reason: String,
    },
}

/// One record as delivered by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    /// Raw value; `None` for tombstones
    pub value: Option<Vec<u8>>,
}

impl InboundMessage {
    /// The value bytes, treating a tombstone as empty.
    pub fn payload(&self) -> &[u8] {
        self.value.as_deref().unwrap_or_default()
    }
}

/// Creates consumer handles for a consumer group.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    /// Builds a consumer in `group_id` and verifies the cluster is reachable.
    async fn connect(&self, group_id: &str) -> Result<Box<dyn BrokerConsumer>, BrokerError>;
}

/// An exclusive handle on one consumer-group membership.
///
/// `poll` must be cancel-safe: dropping its future before it resolves must
/// not lose or skip a message.
#[async_trait]
pub trait BrokerConsumer: Send {
    /// Subscribes to a single topic.
    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError>;

    /// Waits for the next message.
    async fn poll(&mut self) -> Result<InboundMessage, BrokerError>;

    /// Commits the position just past `message`.
    async fn commit(&mut self, message: &InboundMessage) -> Result<(), BrokerError>;

    /// Repositions the partition so that `message` is delivered again by the
    /// next poll.
    ///
    /// Returns `BrokerError::PartitionRevoked` when this member no longer
    /// owns the partition.
    async fn rewind(&mut self, message: &InboundMessage) -> Result<(), BrokerError>;

    /// Leaves the group and releases the handle. Calling it twice is a no-op.
    fn close(&mut self);
}

//! In-process broker.
//!
//! A single-partition, append-only log per topic with per-group committed
//! offsets. It implements the same [`BrokerConnector`] and
//! [`BrokerConsumer`] traits as the Kafka adapter and records every connect,
//! delivery, commit and handle release so the consumer loop's commit
//! behavior can be asserted without a running cluster.
//!
//! # Example
//!
//! ```rust
//! use notification_consumer::consumer::memory::MemoryBroker;
//! use notification_consumer::consumer::BrokerConnector;
//!
//! # tokio_test::block_on(async {
//! let broker = MemoryBroker::new();
//! broker.publish("user-events", b"{\"eventType\":\"UnknownThing\"}".to_vec());
//!
//! let mut consumer = broker.connector().connect("svc-user-events").await.unwrap();
//! consumer.subscribe("user-events").unwrap();
//! let message = consumer.poll().await.unwrap();
//! consumer.commit(&message).await.unwrap();
//!
//! assert_eq!(broker.committed_offset("svc-user-events", "user-events"), Some(1));
//! # });
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::broker::{BrokerConnector, BrokerConsumer, BrokerError, InboundMessage};
use super::config::OffsetReset;

/// A commit observed by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub group_id: String,
    pub topic: String,
    pub partition: i32,
    /// Next offset to read, i.e. the committed message's offset plus one
    pub offset: i64,
}

/// A message handed to a consumer by `poll`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRecord {
    pub group_id: String,
    pub topic: String,
    pub offset: i64,
}

#[derive(Default)]
struct BrokerState {
    logs: HashMap<String, Vec<Vec<u8>>>,
    committed: HashMap<(String, String), i64>,
    commits: Vec<CommitRecord>,
    deliveries: Vec<DeliveryRecord>,
    connect_attempts: usize,
    connect_failures_left: usize,
    failing_commits: usize,
    revoked_rewinds: usize,
    failing_rewinds: usize,
    poll_failures: Vec<String>,
    opened: usize,
    closed: usize,
}

struct Shared {
    state: Mutex<BrokerState>,
    appended: Notify,
    offset_reset: OffsetReset,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        // A poisoned lock only means a test thread panicked mid-update.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Handle on an in-process broker. Clones share the same logs.
#[derive(Clone)]
pub struct MemoryBroker {
    shared: Arc<Shared>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    /// Creates an empty broker whose new groups start at the earliest offset.
    pub fn new() -> Self {
        Self::with_offset_reset(OffsetReset::Earliest)
    }

    /// Creates an empty broker with the given reset policy for new groups.
    ///
    /// `OffsetReset::None` is treated as `Earliest`.
    pub fn with_offset_reset(offset_reset: OffsetReset) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(BrokerState::default()),
                appended: Notify::new(),
                offset_reset,
            }),
        }
    }

    /// Returns a connector producing consumers on this broker.
    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Appends a value to `topic` and returns its offset.
    pub fn publish(&self, topic: &str, value: impl Into<Vec<u8>>) -> i64 {
        let offset = {
            let mut state = self.shared.lock();
            let log = state.logs.entry(topic.to_string()).or_default();
            log.push(value.into());
            (log.len() - 1) as i64
        };
        self.shared.appended.notify_waiters();
        offset
    }

    /// Makes the next `count` connect attempts fail.
    pub fn fail_connects(&self, count: usize) {
        self.shared.lock().connect_failures_left = count;
    }

    /// Makes the next `count` commits fail.
    pub fn fail_commits(&self, count: usize) {
        self.shared.lock().failing_commits = count;
    }

    /// Makes the next `count` rewinds report the partition as revoked.
    pub fn revoke_rewinds(&self, count: usize) {
        self.shared.lock().revoked_rewinds = count;
    }

    /// Makes the next `count` rewinds fail outright.
    pub fn fail_rewinds(&self, count: usize) {
        self.shared.lock().failing_rewinds = count;
    }

    /// Makes the next poll on any consumer fail with `reason`.
    pub fn fail_next_poll(&self, reason: &str) {
        self.shared.lock().poll_failures.push(reason.to_string());
        self.shared.appended.notify_waiters();
    }

    pub fn connect_attempts(&self) -> usize {
        self.shared.lock().connect_attempts
    }

    pub fn commits(&self) -> Vec<CommitRecord> {
        self.shared.lock().commits.clone()
    }

    pub fn deliveries(&self) -> Vec<DeliveryRecord> {
        self.shared.lock().deliveries.clone()
    }

    /// How many times the message at `offset` of `topic` was delivered.
    pub fn delivery_count(&self, topic: &str, offset: i64) -> usize {
        self.shared
            .lock()
            .deliveries
            .iter()
            .filter(|d| d.topic == topic && d.offset == offset)
            .count()
    }

    /// The next offset `group_id` will read from `topic`, if it committed.
    pub fn committed_offset(&self, group_id: &str, topic: &str) -> Option<i64> {
        self.shared
            .lock()
            .committed
            .get(&(group_id.to_string(), topic.to_string()))
            .copied()
    }

    /// Consumer handles created and not yet released.
    pub fn open_handles(&self) -> usize {
        let state = self.shared.lock();
        state.opened - state.closed
    }

    /// Consumer handles released so far.
    pub fn closed_handles(&self) -> usize {
        self.shared.lock().closed
    }
}

/// Connector for a [`MemoryBroker`].
#[derive(Clone)]
pub struct MemoryConnector {
    shared: Arc<Shared>,
}

#[async_trait]
impl BrokerConnector for MemoryConnector {
    async fn connect(&self, group_id: &str) -> Result<Box<dyn BrokerConsumer>, BrokerError> {
        let mut state = self.shared.lock();
        state.connect_attempts += 1;
        if state.connect_failures_left > 0 {
            state.connect_failures_left -= 1;
            return Err(BrokerError::Connect(format!(
                "broker unavailable (attempt {})",
                state.connect_attempts
            )));
        }
        state.opened += 1;

        Ok(Box::new(MemoryConsumer {
            shared: Arc::clone(&self.shared),
            group_id: group_id.to_string(),
            topic: None,
            position: 0,
            closed: false,
        }))
    }
}

/// A consumer on the in-process broker.
pub struct MemoryConsumer {
    shared: Arc<Shared>,
    group_id: String,
    topic: Option<String>,
    position: i64,
    closed: bool,
}

impl MemoryConsumer {
    fn try_next(&mut self) -> Option<Result<InboundMessage, BrokerError>> {
        let mut state = self.shared.lock();
        if !state.poll_failures.is_empty() {
            let reason = state.poll_failures.remove(0);
            return Some(Err(BrokerError::Poll(reason)));
        }

        let topic = self.topic.as_ref()?;
        let value = state
            .logs
            .get(topic)
            .and_then(|log| log.get(self.position as usize))
            .cloned()?;

        let message = InboundMessage {
            topic: topic.clone(),
            partition: 0,
            offset: self.position,
            key: None,
            value: Some(value),
        };
        state.deliveries.push(DeliveryRecord {
            group_id: self.group_id.clone(),
            topic: topic.clone(),
            offset: self.position,
        });
        self.position += 1;
        Some(Ok(message))
    }
}

#[async_trait]
impl BrokerConsumer for MemoryConsumer {
    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        if self.closed {
            return Err(BrokerError::Subscribe {
                topic: topic.to_string(),
                reason: "consumer closed".to_string(),
            });
        }

        let state = self.shared.lock();
        let committed = state
            .committed
            .get(&(self.group_id.clone(), topic.to_string()))
            .copied();
        self.position = match (committed, self.shared.offset_reset) {
            (Some(offset), _) => offset,
            (None, OffsetReset::Latest) => {
                state.logs.get(topic).map(|log| log.len() as i64).unwrap_or(0)
            }
            (None, _) => 0,
        };
        self.topic = Some(topic.to_string());
        Ok(())
    }

    async fn poll(&mut self) -> Result<InboundMessage, BrokerError> {
        if self.closed {
            return Err(BrokerError::Poll("consumer closed".to_string()));
        }

        // A consumer that is rewound on every message must still let other
        // tasks run between polls.
        tokio::task::yield_now().await;

        let shared = Arc::clone(&self.shared);
        loop {
            // Registered before checking so an append in between is not missed.
            let appended = shared.appended.notified();
            if let Some(result) = self.try_next() {
                return result;
            }
            appended.await;
        }
    }

    async fn commit(&mut self, message: &InboundMessage) -> Result<(), BrokerError> {
        let mut state = self.shared.lock();
        if state.failing_commits > 0 {
            state.failing_commits -= 1;
            return Err(BrokerError::Commit {
                topic: message.topic.clone(),
                partition: message.partition,
                offset: message.offset,
                reason: "injected commit failure".to_string(),
            });
        }

        let next = message.offset + 1;
        state
            .committed
            .insert((self.group_id.clone(), message.topic.clone()), next);
        state.commits.push(CommitRecord {
            group_id: self.group_id.clone(),
            topic: message.topic.clone(),
            partition: message.partition,
            offset: next,
        });
        Ok(())
    }

    async fn rewind(&mut self, message: &InboundMessage) -> Result<(), BrokerError> {
        {
            let mut state = self.shared.lock();
            if state.revoked_rewinds > 0 {
                state.revoked_rewinds -= 1;
                return Err(BrokerError::PartitionRevoked {
                    topic: message.topic.clone(),
                    partition: message.partition,
                    reason: "injected rebalance".to_string(),
                });
            }
            if state.failing_rewinds > 0 {
                state.failing_rewinds -= 1;
                return Err(BrokerError::Seek {
                    topic: message.topic.clone(),
                    partition: message.partition,
                    offset: message.offset,
                    reason: "injected seek failure".to_string(),
                });
            }
        }

        self.position = message.offset;
        tokio::task::yield_now().await;
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.shared.lock().closed += 1;
        }
    }
}

impl Drop for MemoryConsumer {
    fn drop(&mut self) {
        self.close();
    }
}

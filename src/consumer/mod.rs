//! Multi-topic consumer orchestration
//!
//! This module provides:
//! - Kafka client configuration with consumer-group naming
//! - A broker abstraction with Kafka and in-process implementations
//! - The per-topic consumer loop with at-least-once commit handling
//! - A supervisor that runs one loop per topic binding
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use notification_consumer::consumer::{
//!     drain, ConsumerSupervisor, EventFamily, KafkaClientConfig, KafkaConnector, TopicBinding,
//! };
//! use notification_consumer::routing::EventRouter;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(router: EventRouter) {
//! let client = KafkaClientConfig::new("localhost:9092", "notification-service");
//! let supervisor = ConsumerSupervisor::new(
//!     Arc::new(KafkaConnector::new(client)),
//!     router,
//!     "notification-service",
//! );
//!
//! let shutdown = CancellationToken::new();
//! let bindings = vec![TopicBinding::for_family(EventFamily::User, "user-events")];
//! let handles = supervisor.run(bindings, shutdown).await;
//! drain(handles, std::time::Duration::from_secs(10)).await;
//! # }
//! ```
//!
//! # Commit semantics
//!
//! Offsets are committed manually, one message at a time, after dispatch:
//!
//! - **Handled / unknown type / undecodable payload**: committed
//! - **Handler or payload error**: not committed, redelivered on next poll
//! - **Malformed envelope or missing eventType**: not committed, redelivered
//!
//! A message that always fails blocks its partition until it is fixed or
//! removed.

pub mod binding;
pub mod broker;
pub mod config;
pub mod kafka;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod metrics;
pub mod state;
pub mod supervisor;
pub mod topic_loop;

pub use binding::{EventFamily, TopicBinding};
pub use broker::{BrokerConnector, BrokerConsumer, BrokerError, InboundMessage};
pub use config::{
    ConfigError, KafkaClientConfig, OffsetReset, SaslConfig, SaslMechanism, SecurityProtocol,
    SslConfig,
};
pub use kafka::{KafkaConnector, KafkaPublisher};
pub use state::ConnectionState;
pub use supervisor::{drain, ConsumerHandle, ConsumerSupervisor, DrainReport};
pub use topic_loop::{TopicConsumerLoop, DEFAULT_RECONNECT_DELAY};

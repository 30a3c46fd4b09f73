//! Notification consumer library
//!
//! Consumes domain events from several Kafka topics, replicates the
//! records the notification service needs into a local SQLite store, and
//! sends notification emails.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `events`: Envelope codec, discriminators and typed payloads
//! - `routing`: Handler contracts and discriminator-based dispatch
//! - `consumer`: Topic bindings, the per-topic loop, the supervisor and the
//!   broker adapters (Kafka and in-memory)
//! - `notification`: Event handlers and email rendering
//! - `storage`: SQLite replica of users, tenants and bookings
//! - `config`: Configuration management and validation
//! - `health`: Broker and database reachability checks
//! - `error`: Error types and result aliases
//!
//! # Example
//!
//! ```no_run
//! use notification_consumer::Config;
//!
//! # fn main() -> anyhow::Result<()> {
//! let cli = notification_consumer::cli::Cli::parse_args();
//! let config = Config::load("config/config.yaml", &cli)?;
//! config.validate()?;
//! for binding in config.bindings() {
//!     println!("{} -> {}", binding.topic, binding.group_suffix);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod consumer;
pub mod error;
pub mod events;
pub mod health;
pub mod logging;
pub mod notification;
pub mod routing;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use consumer::{ConsumerSupervisor, TopicBinding, TopicConsumerLoop};
pub use error::{NotificationError, Result};
pub use events::{EventEnvelope, EventKind};
pub use routing::{DispatchOutcome, EventRouter};

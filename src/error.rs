//! Error types for the notification consumer
//!
//! Application-level failures are collected in [`NotificationError`] using
//! `thiserror`. Component-specific errors (envelope decoding, broker access,
//! Kafka client configuration) live next to the code that raises them and are
//! converted into this type when they cross into application plumbing.

use thiserror::Error;

/// Main error type for notification consumer operations
///
/// Covers configuration loading, storage access, broker interaction and the
/// serialization formats used by the service.
#[derive(Error, Debug)]
pub enum NotificationError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local store errors (database open, query, constraint failures)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Broker errors surfaced outside a consumer loop (health, publish)
    #[error("Broker error: {0}")]
    Broker(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// SQLite errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result type alias for notification consumer operations
///
/// Uses `anyhow::Error` so callers can attach context while propagating.
pub type Result<T> = anyhow::Result<T>;

//! Kafka client configuration.
//!
//! [`KafkaClientConfig`] carries the settings shared by every topic consumer
//! and by the publish and health tools. Each topic loop derives its own group
//! id from the shared prefix and its binding's suffix.
//!
//! # Example
//!
//! ```rust
//! use notification_consumer::consumer::config::{KafkaClientConfig, OffsetReset};
//!
//! let config = KafkaClientConfig::new("localhost:9092", "notification-service")
//!     .with_auto_offset_reset(OffsetReset::Latest)
//!     .with_sasl_plain("$ConnectionString", "secret");
//!
//! assert_eq!(config.group_id("user-events"), "notification-service-user-events");
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while building a client configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Missing required configuration value.
    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    /// Invalid security protocol specified.
    #[error("Invalid security protocol: {0}")]
    InvalidSecurityProtocol(String),

    /// Invalid SASL mechanism specified.
    #[error("Invalid SASL mechanism: {0}")]
    InvalidSaslMechanism(String),
}

/// Security protocol for broker connections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SecurityProtocol {
    /// No encryption or authentication.
    #[default]
    Plaintext,
    /// TLS encryption without SASL.
    Ssl,
    /// SASL authentication without TLS.
    SaslPlaintext,
    /// SASL authentication with TLS encryption.
    SaslSsl,
}

impl SecurityProtocol {
    /// Returns the librdkafka configuration string for this protocol.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plaintext => "PLAINTEXT",
            Self::Ssl => "SSL",
            Self::SaslPlaintext => "SASL_PLAINTEXT",
            Self::SaslSsl => "SASL_SSL",
        }
    }

    /// Whether this protocol authenticates with SASL.
    pub fn uses_sasl(&self) -> bool {
        matches!(self, Self::SaslPlaintext | Self::SaslSsl)
    }
}

impl FromStr for SecurityProtocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PLAINTEXT" => Ok(Self::Plaintext),
            "SSL" => Ok(Self::Ssl),
            "SASL_PLAINTEXT" => Ok(Self::SaslPlaintext),
            "SASL_SSL" => Ok(Self::SaslSsl),
            _ => Err(ConfigError::InvalidSecurityProtocol(s.to_string())),
        }
    }
}

/// SASL authentication mechanism.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SaslMechanism {
    /// PLAIN mechanism (username/password in clear text, used by Event Hubs).
    #[default]
    Plain,
    /// SCRAM-SHA-256 mechanism.
    ScramSha256,
    /// SCRAM-SHA-512 mechanism.
    ScramSha512,
}

impl SaslMechanism {
    /// Returns the librdkafka configuration string for this mechanism.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::ScramSha256 => "SCRAM-SHA-256",
            Self::ScramSha512 => "SCRAM-SHA-512",
        }
    }
}

impl FromStr for SaslMechanism {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PLAIN" => Ok(Self::Plain),
            "SCRAM-SHA-256" => Ok(Self::ScramSha256),
            "SCRAM-SHA-512" => Ok(Self::ScramSha512),
            _ => Err(ConfigError::InvalidSaslMechanism(s.to_string())),
        }
    }
}

/// Where a consumer group starts when it has no committed offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OffsetReset {
    /// Start from the oldest retained message.
    #[default]
    Earliest,
    /// Start from the next message produced.
    Latest,
    /// Fail instead of picking a position.
    None,
}

impl OffsetReset {
    /// Parses a policy name, case-insensitively.
    ///
    /// `"none"` and `"error"` both select [`OffsetReset::None`]. Anything
    /// unrecognized falls back to [`OffsetReset::Earliest`].
    ///
    /// # Examples
    ///
    /// ```
    /// use notification_consumer::consumer::config::OffsetReset;
    ///
    /// assert_eq!(OffsetReset::parse("Latest"), OffsetReset::Latest);
    /// assert_eq!(OffsetReset::parse("error"), OffsetReset::None);
    /// assert_eq!(OffsetReset::parse("sideways"), OffsetReset::Earliest);
    /// ```
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "earliest" => Self::Earliest,
            "latest" => Self::Latest,
            "none" | "error" => Self::None,
            _ => Self::Earliest,
        }
    }

    /// Returns the librdkafka `auto.offset.reset` value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Earliest => "earliest",
            Self::Latest => "latest",
            Self::None => "error",
        }
    }
}

impl fmt::Display for OffsetReset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SASL authentication configuration.
#[derive(Clone)]
pub struct SaslConfig {
    /// Authentication mechanism to use.
    pub mechanism: SaslMechanism,
    /// SASL username.
    pub username: String,
    /// SASL password.
    pub password: String,
}

impl fmt::Debug for SaslConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaslConfig")
            .field("mechanism", &self.mechanism)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// SSL/TLS configuration.
#[derive(Debug, Clone, Default)]
pub struct SslConfig {
    /// Path to CA certificate file.
    pub ca_location: Option<String>,
    /// Path to client certificate file (for mTLS).
    pub certificate_location: Option<String>,
    /// Path to client key file (for mTLS).
    pub key_location: Option<String>,
}

/// Connection settings shared by all topic consumers.
///
/// Auto-commit is never enabled: the consumer loop commits each message
/// explicitly once its dispatch outcome allows it.
#[derive(Debug, Clone)]
pub struct KafkaClientConfig {
    /// Kafka broker addresses (comma-separated).
    pub brokers: String,

    /// Prefix for every consumer group id.
    pub group_prefix: String,

    /// Security protocol for the connection.
    pub security_protocol: SecurityProtocol,

    /// SASL configuration (required for SASL protocols).
    pub sasl_config: Option<SaslConfig>,

    /// SSL configuration.
    pub ssl_config: Option<SslConfig>,

    /// Auto offset reset policy.
    pub auto_offset_reset: OffsetReset,

    /// Session timeout duration.
    pub session_timeout: Duration,
}

impl KafkaClientConfig {
    /// Creates a configuration with plaintext transport, `earliest` offset
    /// reset and a 30 second session timeout.
    pub fn new(brokers: &str, group_prefix: &str) -> Self {
        Self {
            brokers: brokers.to_string(),
            group_prefix: group_prefix.to_string(),
            security_protocol: SecurityProtocol::default(),
            sasl_config: None,
            ssl_config: None,
            auto_offset_reset: OffsetReset::default(),
            session_timeout: Duration::from_secs(30),
        }
    }

    /// Configures SASL/PLAIN authentication over TLS.
    pub fn with_sasl_plain(self, username: &str, password: &str) -> Self {
        self.with_sasl(SaslMechanism::Plain, username, password)
    }

    /// Configures SASL/SCRAM-SHA-256 authentication over TLS.
    pub fn with_sasl_scram_sha256(self, username: &str, password: &str) -> Self {
        self.with_sasl(SaslMechanism::ScramSha256, username, password)
    }

    /// Configures SASL authentication with the given mechanism.
    ///
    /// This also sets the security protocol to `SaslSsl`.
    pub fn with_sasl(mut self, mechanism: SaslMechanism, username: &str, password: &str) -> Self {
        self.security_protocol = SecurityProtocol::SaslSsl;
        self.sasl_config = Some(SaslConfig {
            mechanism,
            username: username.to_string(),
            password: password.to_string(),
        });
        self
    }

    /// Overrides the security protocol.
    pub fn with_security_protocol(mut self, protocol: SecurityProtocol) -> Self {
        self.security_protocol = protocol;
        self
    }

    /// Configures TLS with a CA certificate.
    pub fn with_ssl(mut self, ca_location: &str) -> Self {
        self.ssl_config = Some(SslConfig {
            ca_location: Some(ca_location.to_string()),
            ..Default::default()
        });
        self
    }

    /// Sets the auto offset reset policy.
    pub fn with_auto_offset_reset(mut self, policy: OffsetReset) -> Self {
        self.auto_offset_reset = policy;
        self
    }

    /// Sets the consumer session timeout.
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Returns the consumer group id for a binding suffix.
    pub fn group_id(&self, suffix: &str) -> String {
        format!("{}-{}", self.group_prefix, suffix)
    }

    /// Checks that the settings are complete.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingConfig` when brokers or the group prefix
    /// are empty, or when a SASL protocol has no credentials.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.brokers.trim().is_empty() {
            return Err(ConfigError::MissingConfig("bootstrap servers".to_string()));
        }
        if self.group_prefix.trim().is_empty() {
            return Err(ConfigError::MissingConfig("consumer group id".to_string()));
        }
        if self.security_protocol.uses_sasl() && self.sasl_config.is_none() {
            return Err(ConfigError::MissingConfig(format!(
                "SASL credentials for {}",
                self.security_protocol.as_str()
            )));
        }
        Ok(())
    }

    /// Settings common to consumers and producers.
    pub fn connection_settings(&self) -> Vec<(String, String)> {
        let mut settings = vec![
            ("bootstrap.servers".to_string(), self.brokers.clone()),
            (
                "security.protocol".to_string(),
                self.security_protocol.as_str().to_string(),
            ),
        ];

        if let Some(sasl) = &self.sasl_config {
            settings.push((
                "sasl.mechanism".to_string(),
                sasl.mechanism.as_str().to_string(),
            ));
            settings.push(("sasl.username".to_string(), sasl.username.clone()));
            settings.push(("sasl.password".to_string(), sasl.password.clone()));
        }

        if let Some(ssl) = &self.ssl_config {
            if let Some(ca) = &ssl.ca_location {
                settings.push(("ssl.ca.location".to_string(), ca.clone()));
            }
            if let Some(cert) = &ssl.certificate_location {
                settings.push(("ssl.certificate.location".to_string(), cert.clone()));
            }
            if let Some(key) = &ssl.key_location {
                settings.push(("ssl.key.location".to_string(), key.clone()));
            }
        }

        settings
    }

    /// Full consumer settings for one consumer group.
    pub fn consumer_settings(&self, group_id: &str) -> Vec<(String, String)> {
        let mut settings = self.connection_settings();
        settings.extend([
            ("group.id".to_string(), group_id.to_string()),
            ("client.id".to_string(), group_id.to_string()),
            (
                "auto.offset.reset".to_string(),
                self.auto_offset_reset.as_str().to_string(),
            ),
            ("enable.auto.commit".to_string(), "false".to_string()),
            ("enable.auto.offset.store".to_string(), "false".to_string()),
            (
                "session.timeout.ms".to_string(),
                self.session_timeout.as_millis().to_string(),
            ),
        ]);
        settings
    }
}

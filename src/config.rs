//! Configuration management for the notification consumer
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::consumer::{
    ConfigError, EventFamily, KafkaClientConfig, OffsetReset, SaslMechanism, SecurityProtocol,
    TopicBinding,
};
use crate::error::{NotificationError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Kafka connection settings
    #[serde(default)]
    pub kafka: KafkaConfig,
    /// Topic name per event family
    #[serde(default)]
    pub topics: TopicsConfig,
    /// Consumer loop tuning
    #[serde(default)]
    pub consumer: ConsumerConfig,
    /// Local database
    #[serde(default)]
    pub storage: StorageConfig,
    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Kafka connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    /// Kafka brokers (comma-separated)
    #[serde(default = "default_bootstrap_servers")]
    pub bootstrap_servers: String,

    /// Prefix shared by every consumer group this service creates
    #[serde(default = "default_consumer_group_id")]
    pub consumer_group_id: String,

    /// Where a new consumer group starts (earliest, latest, none)
    #[serde(default = "default_auto_offset_reset")]
    pub auto_offset_reset: String,

    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,

    /// Security configuration
    #[serde(default)]
    pub security: Option<KafkaSecurityConfig>,
}

/// Kafka security configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaSecurityConfig {
    /// Security protocol (PLAINTEXT, SSL, SASL_PLAINTEXT, SASL_SSL)
    pub protocol: String,

    /// SASL mechanism (PLAIN, SCRAM-SHA-256, SCRAM-SHA-512)
    #[serde(default)]
    pub sasl_mechanism: Option<String>,

    #[serde(default)]
    pub sasl_username: Option<String>,

    /// SASL password (prefer env var NOTIFICATION_KAFKA_SASL_PASSWORD)
    #[serde(default)]
    pub sasl_password: Option<String>,

    /// CA certificate bundle for SSL transports
    #[serde(default)]
    pub ssl_ca_location: Option<String>,
}

/// Topic per event family. An empty name disables that family's consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicsConfig {
    #[serde(default = "default_user_events_topic")]
    pub user_events: String,
    #[serde(default = "default_tenant_events_topic")]
    pub tenant_events: String,
    #[serde(default = "default_provider_events_topic")]
    pub provider_events: String,
    #[serde(default = "default_booking_events_topic")]
    pub booking_events: String,
}

/// Consumer loop tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Fixed delay between connection attempts
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// How long shutdown waits for loops to stop before aborting them
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Enable JSON-formatted logs
    #[serde(default)]
    pub json_format: bool,

    /// Log file path (if None, STDOUT only)
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

fn default_bootstrap_servers() -> String {
    "localhost:9092".to_string()
}

fn default_consumer_group_id() -> String {
    "notification-service".to_string()
}

fn default_auto_offset_reset() -> String {
    "earliest".to_string()
}

fn default_session_timeout_ms() -> u64 {
    30_000
}

fn default_user_events_topic() -> String {
    "user-events".to_string()
}

fn default_tenant_events_topic() -> String {
    "tenant-events".to_string()
}

fn default_provider_events_topic() -> String {
    "provider-events".to_string()
}

fn default_booking_events_topic() -> String {
    "booking-events".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    2000
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

fn default_database_path() -> PathBuf {
    PathBuf::from("data/notifications.db")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: default_bootstrap_servers(),
            consumer_group_id: default_consumer_group_id(),
            auto_offset_reset: default_auto_offset_reset(),
            session_timeout_ms: default_session_timeout_ms(),
            security: None,
        }
    }
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            user_events: default_user_events_topic(),
            tenant_events: default_tenant_events_topic(),
            provider_events: default_provider_events_topic(),
            booking_events: default_booking_events_topic(),
        }
    }
}

impl TopicsConfig {
    /// Configured topic for `family`.
    pub fn topic_for(&self, family: EventFamily) -> &str {
        match family {
            EventFamily::User => &self.user_events,
            EventFamily::Tenant => &self.tenant_events,
            EventFamily::Provider => &self.provider_events,
            EventFamily::Booking => &self.booking_events,
        }
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: default_reconnect_delay_ms(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl ConsumerConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error: defaults are used instead.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let (config, warnings) = Self::load_with_warnings(path, cli)?;
        for warning in &warnings {
            tracing::warn!("{}", warning);
        }
        Ok(config)
    }

    /// Like [`Config::load`], but returns the load-time warnings instead of
    /// logging them, for callers that set up logging from the loaded config.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load_with_warnings(path: &str, cli: &crate::cli::Cli) -> Result<(Self, Vec<String>)> {
        let mut warnings = Vec::new();
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            warnings.push(format!("Config file not found at {}, using defaults", path));
            Self::default()
        };

        config.apply_env_vars(&mut warnings);
        config.apply_cli_overrides(cli);

        Ok((config, warnings))
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| NotificationError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| NotificationError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self, warnings: &mut Vec<String>) {
        // Kafka overrides
        if let Ok(servers) = std::env::var("NOTIFICATION_KAFKA_BOOTSTRAP_SERVERS") {
            self.kafka.bootstrap_servers = servers;
        }

        if let Ok(group_id) = std::env::var("NOTIFICATION_KAFKA_GROUP_ID") {
            self.kafka.consumer_group_id = group_id;
        }

        if let Ok(reset) = std::env::var("NOTIFICATION_KAFKA_AUTO_OFFSET_RESET") {
            self.kafka.auto_offset_reset = reset;
        }

        if let Ok(protocol) = std::env::var("NOTIFICATION_KAFKA_SECURITY_PROTOCOL") {
            self.security_mut().protocol = protocol;
        }

        if let Ok(mechanism) = std::env::var("NOTIFICATION_KAFKA_SASL_MECHANISM") {
            self.security_mut().sasl_mechanism = Some(mechanism);
        }

        if let Ok(username) = std::env::var("NOTIFICATION_KAFKA_SASL_USERNAME") {
            self.security_mut().sasl_username = Some(username);
        }

        if let Ok(password) = std::env::var("NOTIFICATION_KAFKA_SASL_PASSWORD") {
            self.security_mut().sasl_password = Some(password);
        }

        // Topic overrides
        if let Ok(topic) = std::env::var("NOTIFICATION_TOPIC_USER_EVENTS") {
            self.topics.user_events = topic;
        }

        if let Ok(topic) = std::env::var("NOTIFICATION_TOPIC_TENANT_EVENTS") {
            self.topics.tenant_events = topic;
        }

        if let Ok(topic) = std::env::var("NOTIFICATION_TOPIC_PROVIDER_EVENTS") {
            self.topics.provider_events = topic;
        }

        if let Ok(topic) = std::env::var("NOTIFICATION_TOPIC_BOOKING_EVENTS") {
            self.topics.booking_events = topic;
        }

        // Consumer overrides
        if let Ok(delay) = std::env::var("NOTIFICATION_RECONNECT_DELAY_MS") {
            if let Ok(value) = delay.parse() {
                self.consumer.reconnect_delay_ms = value;
            } else {
                warnings.push(format!("Invalid NOTIFICATION_RECONNECT_DELAY_MS: {}", delay));
            }
        }

        if let Ok(grace) = std::env::var("NOTIFICATION_SHUTDOWN_GRACE_SECS") {
            if let Ok(value) = grace.parse() {
                self.consumer.shutdown_grace_secs = value;
            } else {
                warnings.push(format!("Invalid NOTIFICATION_SHUTDOWN_GRACE_SECS: {}", grace));
            }
        }

        // Storage and logging overrides
        if let Ok(path) = std::env::var("NOTIFICATION_DATABASE_PATH") {
            self.storage.database_path = PathBuf::from(path);
        }

        if let Ok(level) = std::env::var("NOTIFICATION_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(json) = std::env::var("NOTIFICATION_LOG_JSON") {
            self.logging.json_format = matches!(json.to_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    fn security_mut(&mut self) -> &mut KafkaSecurityConfig {
        self.kafka
            .security
            .get_or_insert_with(|| KafkaSecurityConfig {
                protocol: SecurityProtocol::default().as_str().to_string(),
                sasl_mechanism: None,
                sasl_username: None,
                sasl_password: None,
                ssl_ca_location: None,
            })
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(brokers) = &cli.brokers {
            self.kafka.bootstrap_servers = brokers.clone();
        }

        if cli.verbose {
            self.logging.level = "debug".to_string();
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        self.kafka_client_config()?
            .validate()
            .map_err(|e| NotificationError::Config(e.to_string()))?;

        if self.bindings().is_empty() {
            return Err(
                NotificationError::Config("At least one topic must be configured".to_string())
                    .into(),
            );
        }

        if self.consumer.reconnect_delay_ms == 0 {
            return Err(NotificationError::Config(
                "consumer.reconnect_delay_ms must be greater than 0".to_string(),
            )
            .into());
        }

        if self.storage.database_path.as_os_str().is_empty() {
            return Err(
                NotificationError::Config("storage.database_path cannot be empty".to_string())
                    .into(),
            );
        }

        Ok(())
    }

    /// Builds the Kafka client settings.
    ///
    /// # Errors
    ///
    /// Returns error if the security protocol or SASL mechanism is unknown
    pub fn kafka_client_config(&self) -> Result<KafkaClientConfig> {
        let mut config =
            KafkaClientConfig::new(&self.kafka.bootstrap_servers, &self.kafka.consumer_group_id)
                .with_auto_offset_reset(OffsetReset::parse(&self.kafka.auto_offset_reset))
                .with_session_timeout(Duration::from_millis(self.kafka.session_timeout_ms));

        if let Some(security) = &self.kafka.security {
            let protocol: SecurityProtocol = security
                .protocol
                .parse()
                .map_err(|e: ConfigError| NotificationError::Config(e.to_string()))?;

            if protocol.uses_sasl() {
                if let (Some(username), Some(password)) =
                    (&security.sasl_username, &security.sasl_password)
                {
                    let mechanism = match &security.sasl_mechanism {
                        Some(m) => m
                            .parse()
                            .map_err(|e: ConfigError| NotificationError::Config(e.to_string()))?,
                        None => SaslMechanism::default(),
                    };
                    config = config.with_sasl(mechanism, username, password);
                }
            }
            // with_sasl assumes SASL_SSL; the configured protocol wins.
            config = config.with_security_protocol(protocol);

            if let Some(ca_location) = &security.ssl_ca_location {
                config = config.with_ssl(ca_location);
            }
        }

        Ok(config)
    }

    /// One binding per family whose topic is non-empty.
    pub fn bindings(&self) -> Vec<TopicBinding> {
        EventFamily::ALL
            .iter()
            .filter_map(|family| {
                let topic = self.topics.topic_for(*family).trim();
                (!topic.is_empty()).then(|| TopicBinding::for_family(*family, topic))
            })
            .collect()
    }
}

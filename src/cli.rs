//! Command-line interface definition for the notification consumer
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands to run the consumers, check health, and publish
//! test events.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Notification consumer
///
/// Consumes user, tenant, provider and booking events from Kafka and
/// sends the matching notifications.
#[derive(Parser, Debug, Clone)]
#[command(name = "notification-consumer")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Override the Kafka bootstrap servers from config
    #[arg(long, global = true)]
    pub brokers: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start every configured topic consumer and run until interrupted
    Run {
        /// Override the SQLite database path from config
        #[arg(long)]
        database: Option<PathBuf>,
    },

    /// Check broker and database reachability
    Health {
        /// Broker metadata timeout in milliseconds
        #[arg(long, default_value_t = 1000)]
        timeout_ms: u64,
    },

    /// Wrap a JSON payload in an event envelope and produce it
    Publish {
        /// Destination topic
        #[arg(short, long)]
        topic: String,

        /// Envelope discriminator, for example `CustomerCreatedEvent`
        #[arg(short, long)]
        event_type: String,

        /// File holding the JSON payload object
        #[arg(short, long)]
        payload: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

//! Consumer counters.
//!
//! Recorded through the `metrics` facade. Without an installed recorder the
//! macros are no-ops.
//!
//! # Metrics
//!
//! - `consumer_dispatch_total`: dispatch outcomes by topic and outcome
//! - `consumer_decode_errors_total`: envelopes rejected before routing
//! - `consumer_commits_total`: offsets committed by topic
//! - `consumer_commit_failures_total`: failed commit attempts by topic
//! - `consumer_connect_failures_total`: failed connect attempts by topic
//! - `consumer_redeliveries_total`: messages rewound for redelivery by topic

use metrics::increment_counter;

use crate::routing::DispatchOutcome;

pub fn record_outcome(topic: &str, outcome: &DispatchOutcome) {
    increment_counter!(
        "consumer_dispatch_total",
        "topic" => topic.to_string(),
        "outcome" => outcome.label()
    );
}

pub fn record_decode_error(topic: &str, reason: &'static str) {
    increment_counter!(
        "consumer_decode_errors_total",
        "topic" => topic.to_string(),
        "reason" => reason
    );
}

pub fn record_commit(topic: &str) {
    increment_counter!("consumer_commits_total", "topic" => topic.to_string());
}

pub fn record_commit_failure(topic: &str) {
    increment_counter!("consumer_commit_failures_total", "topic" => topic.to_string());
}

pub fn record_connect_failure(topic: &str) {
    increment_counter!("consumer_connect_failures_total", "topic" => topic.to_string());
}

pub fn record_redelivery(topic: &str) {
    increment_counter!("consumer_redeliveries_total", "topic" => topic.to_string());
}

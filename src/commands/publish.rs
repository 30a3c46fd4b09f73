use std::path::Path;

use serde_json::{Map, Value};
use tracing::info;

use crate::config::Config;
use crate::consumer::KafkaPublisher;
use crate::error::{NotificationError, Result};
use crate::events::envelope::json_kind;
use crate::events::{EventEnvelope, EventKind};

/// Reads a JSON object from `payload_path` and wraps it in an envelope.
///
/// Unknown event types are allowed with a warning so consumers' skip path
/// can be exercised.
pub fn load_envelope(event_type: &str, payload_path: &Path) -> Result<EventEnvelope> {
    let contents = std::fs::read_to_string(payload_path)?;
    let value: Value = serde_json::from_str(&contents)?;
    let payload: Map<String, Value> = match value {
        Value::Object(map) => map,
        other => {
            return Err(NotificationError::Config(format!(
                "Payload in {} must be a JSON object, found {}",
                payload_path.display(),
                json_kind(&other)
            ))
            .into())
        }
    };

    if EventKind::from_discriminator(event_type).is_none() {
        tracing::warn!(event_type = %event_type, "Publishing an event type no consumer routes");
    }

    Ok(EventEnvelope::new(event_type, payload))
}

pub async fn run_publish(
    config: &Config,
    topic: &str,
    event_type: &str,
    payload_path: &Path,
) -> Result<()> {
    let envelope = load_envelope(event_type, payload_path)?;
    let publisher = KafkaPublisher::new(&config.kafka_client_config()?)?;

    let (partition, offset) = publisher.publish(topic, &envelope).await?;
    info!(
        topic = %topic,
        partition,
        offset,
        event_id = %envelope.event_id,
        "Published event"
    );
    println!(
        "Published {} ({}) to {} [partition {}, offset {}]",
        envelope.event_type, envelope.event_id, topic, partition, offset
    );
    Ok(())
}

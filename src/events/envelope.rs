//! Wire envelope codec.
//!
//! Every event travels as a single UTF-8 JSON object. The envelope fields
//! (`eventId`, `occurredAt`, `eventType`, `version`) sit beside the
//! type-specific fields at the top level, all in lowerCamelCase, with null
//! properties omitted:
//!
//! ```text
//! {
//!   "eventId": "6f1c...",
//!   "occurredAt": "2025-12-12T12:32:00.000Z",
//!   "eventType": "CustomerCreatedEvent",
//!   "version": "1.0",
//!   "userId": "...",
//!   "email": "jane@example.com"
//! }
//! ```
//!
//! Decoding is strict about the types of the four envelope fields and lenient
//! about anything else: unknown properties are kept in the payload map and
//! ignored by the typed decoders.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Envelope schema version written by producers.
pub const ENVELOPE_VERSION: &str = "1.0";

const ENVELOPE_FIELDS: [&str; 4] = ["eventId", "occurredAt", "eventType", "version"];

/// Errors raised while decoding or encoding an envelope.
#[derive(Error, Debug)]
pub enum EnvelopeError {
    /// The raw value is not valid JSON, not an object, or an envelope field
    /// has the wrong type.
    #[error("Malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The envelope parsed but carries no usable `eventType`.
    #[error("Envelope {event_id} has no eventType")]
    MissingDiscriminator {
        /// Identifier of the offending envelope (generated if absent)
        event_id: Uuid,
    },

    /// The outbound payload could not be turned into a JSON object.
    #[error("Cannot encode payload: {0}")]
    Encode(String),
}

/// A typed event body that can be carried inside an [`EventEnvelope`].
pub trait EventPayload: Serialize + DeserializeOwned {
    /// Discriminator written to `eventType`.
    const EVENT_TYPE: &'static str;

    /// Identifier property that must be present for the payload to count as
    /// populated. A payload without it decodes to `None`.
    const KEY_FIELD: &'static str;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEnvelope {
    #[serde(default)]
    event_id: Option<Uuid>,
    #[serde(default)]
    occurred_at: Option<DateTime<Utc>>,
    #[serde(default)]
    event_type: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(flatten)]
    payload: Map<String, Value>,
}

/// A decoded event envelope.
///
/// `payload` holds every top-level property that is not one of the four
/// envelope fields.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    /// Unique event identifier
    pub event_id: Uuid,
    /// When the producer recorded the event
    pub occurred_at: DateTime<Utc>,
    /// Discriminator naming the payload shape
    pub event_type: String,
    /// Envelope schema version
    pub version: String,
    /// Type-specific properties
    pub payload: Map<String, Value>,
}

impl EventEnvelope {
    /// Creates an envelope around an already-built JSON object.
    ///
    /// Null properties and any envelope-named keys in `payload` are dropped.
    pub fn new(event_type: impl Into<String>, payload: Map<String, Value>) -> Self {
        let payload = payload
            .into_iter()
            .filter(|(key, value)| !value.is_null() && !ENVELOPE_FIELDS.contains(&key.as_str()))
            .collect();

        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            event_type: event_type.into(),
            version: ENVELOPE_VERSION.to_string(),
            payload,
        }
    }

    /// Wraps a typed event, using its discriminator as `eventType`.
    ///
    /// # Errors
    ///
    /// Returns `EnvelopeError::Encode` if the event does not serialize to a
    /// JSON object.
    ///
    /// # Examples
    ///
    /// ```
    /// use notification_consumer::events::{EventEnvelope, UserDeletedEvent};
    /// use uuid::Uuid;
    ///
    /// let event = UserDeletedEvent { user_id: Uuid::new_v4() };
    /// let envelope = EventEnvelope::wrap(&event).unwrap();
    /// assert_eq!(envelope.event_type, "UserDeletedEvent");
    /// ```
    pub fn wrap<P: EventPayload>(event: &P) -> Result<Self, EnvelopeError> {
        match serde_json::to_value(event) {
            Ok(Value::Object(map)) => Ok(Self::new(P::EVENT_TYPE, map)),
            Ok(other) => Err(EnvelopeError::Encode(format!(
                "{} serialized to {} instead of an object",
                P::EVENT_TYPE,
                json_kind(&other)
            ))),
            Err(e) => Err(EnvelopeError::Encode(e.to_string())),
        }
    }

    /// Decodes a raw broker value.
    ///
    /// Absent `eventId`, `occurredAt` and `version` fall back to a fresh id,
    /// the current time and [`ENVELOPE_VERSION`]. Present values must have
    /// the right type.
    ///
    /// # Errors
    ///
    /// Returns `EnvelopeError::Malformed` for invalid JSON, a non-object
    /// value, or a mistyped envelope field, and
    /// `EnvelopeError::MissingDiscriminator` when `eventType` is absent or
    /// blank.
    pub fn decode(raw: &[u8]) -> Result<Self, EnvelopeError> {
        let raw: RawEnvelope = serde_json::from_slice(raw).map_err(EnvelopeError::Malformed)?;
        let event_id = raw.event_id.unwrap_or_else(Uuid::new_v4);

        let event_type = match raw.event_type {
            Some(event_type) if !event_type.trim().is_empty() => event_type,
            _ => return Err(EnvelopeError::MissingDiscriminator { event_id }),
        };

        Ok(Self {
            event_id,
            occurred_at: raw.occurred_at.unwrap_or_else(Utc::now),
            event_type,
            version: raw
                .version
                .unwrap_or_else(|| ENVELOPE_VERSION.to_string()),
            payload: raw.payload,
        })
    }

    /// Encodes the envelope to its wire form.
    ///
    /// # Errors
    ///
    /// Returns `EnvelopeError::Encode` if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        let mut object = Map::with_capacity(self.payload.len() + ENVELOPE_FIELDS.len());
        object.insert("eventId".into(), Value::String(self.event_id.to_string()));
        object.insert(
            "occurredAt".into(),
            Value::String(self.occurred_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        object.insert("eventType".into(), Value::String(self.event_type.clone()));
        object.insert("version".into(), Value::String(self.version.clone()));
        for (key, value) in &self.payload {
            if !value.is_null() && !ENVELOPE_FIELDS.contains(&key.as_str()) {
                object.insert(key.clone(), value.clone());
            }
        }

        serde_json::to_vec(&Value::Object(object)).map_err(|e| EnvelopeError::Encode(e.to_string()))
    }

    /// Decodes the payload into a specific shape.
    ///
    /// Returns `Ok(None)` when the shape's key field is absent or null: the
    /// payload does not describe this kind of event at all. Properties of the
    /// wrong type are an error.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json::Error` when a present property
    /// cannot be converted.
    pub fn decode_payload<P: EventPayload>(&self) -> Result<Option<P>, serde_json::Error> {
        match self.payload.get(P::KEY_FIELD) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => serde_json::from_value(Value::Object(self.payload.clone())).map(Some),
        }
    }
}

/// Deserializes an explicit `null` as the type's default, so producers that
/// write nulls for empty text are read the same as ones that omit the field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Article and name of a JSON value's type, for error messages.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{CustomerCreatedEvent, UserDeletedEvent};
    use serde_json::json;

    #[test]
    fn test_decode_full_envelope() {
        let raw = json!({
            "eventId": "0b6f4a2e-8d0c-4c5e-9d41-3a5b0f6c7d11",
            "occurredAt": "2025-12-12T12:32:00Z",
            "eventType": "UserDeletedEvent",
            "version": "1.0",
            "userId": "4e1b3c6a-0f2d-4a7b-8c9e-1d2f3a4b5c6d"
        });

        let envelope = EventEnvelope::decode(raw.to_string().as_bytes()).unwrap();

        assert_eq!(
            envelope.event_id.to_string(),
            "0b6f4a2e-8d0c-4c5e-9d41-3a5b0f6c7d11"
        );
        assert_eq!(envelope.event_type, "UserDeletedEvent");
        assert_eq!(envelope.version, "1.0");
        assert_eq!(envelope.occurred_at.to_rfc3339(), "2025-12-12T12:32:00+00:00");
        assert_eq!(envelope.payload.len(), 1);
        assert!(envelope.payload.contains_key("userId"));
    }

    #[test]
    fn test_decode_defaults_missing_metadata() {
        let envelope =
            EventEnvelope::decode(br#"{"eventType":"UnknownThing"}"#).unwrap();

        assert_eq!(envelope.event_type, "UnknownThing");
        assert_eq!(envelope.version, ENVELOPE_VERSION);
        assert!(envelope.payload.is_empty());
    }

    #[test]
    fn test_decode_rejects_invalid_json() {
        let result = EventEnvelope::decode(b"not-json");
        assert!(matches!(result, Err(EnvelopeError::Malformed(_))));
    }

    #[test]
    fn test_decode_rejects_non_object() {
        let result = EventEnvelope::decode(b"[1, 2, 3]");
        assert!(matches!(result, Err(EnvelopeError::Malformed(_))));
    }

    #[test]
    fn test_decode_rejects_mistyped_event_id() {
        let result = EventEnvelope::decode(br#"{"eventId":"nope","eventType":"UserDeletedEvent"}"#);
        assert!(matches!(result, Err(EnvelopeError::Malformed(_))));
    }

    #[test]
    fn test_missing_event_type_is_distinct_from_malformed() {
        let result = EventEnvelope::decode(br#"{"userId":"4e1b3c6a-0f2d-4a7b-8c9e-1d2f3a4b5c6d"}"#);
        assert!(matches!(
            result,
            Err(EnvelopeError::MissingDiscriminator { .. })
        ));

        let result = EventEnvelope::decode(br#"{"eventType":"   "}"#);
        assert!(matches!(
            result,
            Err(EnvelopeError::MissingDiscriminator { .. })
        ));
    }

    #[test]
    fn test_decode_keeps_unknown_fields() {
        let envelope =
            EventEnvelope::decode(br#"{"eventType":"UserDeletedEvent","futureField":[1,2]}"#)
                .unwrap();
        assert_eq!(envelope.payload.get("futureField"), Some(&json!([1, 2])));
    }

    #[test]
    fn test_encode_writes_camel_case_and_omits_nulls() {
        let mut payload = Map::new();
        payload.insert("userId".into(), json!("4e1b3c6a-0f2d-4a7b-8c9e-1d2f3a4b5c6d"));
        payload.insert("tenantId".into(), Value::Null);
        let envelope = EventEnvelope::new("UserDeletedEvent", payload);

        let encoded: Value = serde_json::from_slice(&envelope.encode().unwrap()).unwrap();

        assert_eq!(encoded["eventType"], "UserDeletedEvent");
        assert_eq!(encoded["version"], "1.0");
        assert!(encoded["occurredAt"].as_str().unwrap().ends_with('Z'));
        assert!(encoded.get("tenantId").is_none());
        assert_eq!(encoded["userId"], "4e1b3c6a-0f2d-4a7b-8c9e-1d2f3a4b5c6d");
    }

    #[test]
    fn test_wrap_and_decode_payload() {
        let event = UserDeletedEvent {
            user_id: Uuid::new_v4(),
        };
        let envelope = EventEnvelope::wrap(&event).unwrap();
        let decoded = EventEnvelope::decode(&envelope.encode().unwrap()).unwrap();

        assert_eq!(decoded.event_id, envelope.event_id);
        let payload: Option<UserDeletedEvent> = decoded.decode_payload().unwrap();
        assert_eq!(payload, Some(event));
    }

    #[test]
    fn test_decode_payload_without_key_field_is_none() {
        let envelope =
            EventEnvelope::decode(br#"{"eventType":"CustomerCreatedEvent","email":"a@b.c"}"#)
                .unwrap();
        let payload: Option<CustomerCreatedEvent> = envelope.decode_payload().unwrap();
        assert!(payload.is_none());
    }

    #[test]
    fn test_decode_payload_with_wrong_type_is_error() {
        let envelope = EventEnvelope::decode(
            br#"{"eventType":"CustomerCreatedEvent","userId":"4e1b3c6a-0f2d-4a7b-8c9e-1d2f3a4b5c6d","role":"admin"}"#,
        )
        .unwrap();
        let payload: Result<Option<CustomerCreatedEvent>, _> = envelope.decode_payload();
        assert!(payload.is_err());
    }
}

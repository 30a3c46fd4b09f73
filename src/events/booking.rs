//! Booking lifecycle events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use uuid::Uuid;

use super::envelope::EventPayload;

/// Body of a booking creation event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookingEvent {
    pub booking_id: Uuid,
    pub tenant_id: Uuid,
    /// User who placed the booking
    pub owner_id: Uuid,
    pub service_id: Uuid,
    pub start_date_time: DateTime<Utc>,
    pub end_date_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingCreatedEvent(pub BookingEvent);

impl Deref for BookingCreatedEvent {
    type Target = BookingEvent;

    fn deref(&self) -> &BookingEvent {
        &self.0
    }
}

impl EventPayload for BookingCreatedEvent {
    const EVENT_TYPE: &'static str = "BookingCreatedEvent";
    const KEY_FIELD: &'static str = "bookingId";
}

/// A booking was cancelled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookingCancelledEvent {
    pub booking_id: Uuid,
    pub tenant_id: Uuid,
    pub owner_id: Uuid,
    pub service_id: Uuid,
}

impl EventPayload for BookingCancelledEvent {
    const EVENT_TYPE: &'static str = "BookingCancelledEvent";
    const KEY_FIELD: &'static str = "bookingId";
}

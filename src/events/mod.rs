//! Domain events carried on the broker.
//!
//! This module provides:
//! - The wire envelope codec ([`EventEnvelope`])
//! - The discriminator enum ([`EventKind`])
//! - Typed payloads for each event shape
//! - [`DomainEvent`], the decoded sum of all payloads
//!
//! # Example
//!
//! ```rust
//! use notification_consumer::events::{DomainEvent, EventEnvelope, EventKind};
//!
//! let raw = br#"{"eventType":"UserDeletedEvent","userId":"4e1b3c6a-0f2d-4a7b-8c9e-1d2f3a4b5c6d"}"#;
//! let envelope = EventEnvelope::decode(raw).unwrap();
//! let event = DomainEvent::decode(EventKind::UserDeleted, &envelope).unwrap();
//! assert!(matches!(event, Some(DomainEvent::UserDeleted(_))));
//! ```

pub mod booking;
pub mod envelope;
pub mod kind;
pub mod tenant;
pub mod user;

pub use booking::{BookingCancelledEvent, BookingCreatedEvent, BookingEvent};
pub use envelope::{EventEnvelope, EventPayload, EnvelopeError, ENVELOPE_VERSION};
pub use kind::EventKind;
pub use tenant::{TenantCreatedEvent, TenantEvent, TenantUpdatedEvent};
pub use user::{
    CustomerCreatedEvent, ProviderCreatedEvent, UserDeletedEvent, UserEvent, UserUpdatedEvent,
};

/// A payload decoded into its concrete shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    CustomerCreated(CustomerCreatedEvent),
    UserUpdated(UserUpdatedEvent),
    UserDeleted(UserDeletedEvent),
    ProviderCreated(ProviderCreatedEvent),
    TenantCreated(TenantCreatedEvent),
    TenantUpdated(TenantUpdatedEvent),
    BookingCreated(BookingCreatedEvent),
    BookingCancelled(BookingCancelledEvent),
}

impl DomainEvent {
    /// Decodes the envelope payload as the shape named by `kind`.
    ///
    /// `Ok(None)` means the payload does not carry the shape's identifier.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when a present property has the wrong type.
    pub fn decode(
        kind: EventKind,
        envelope: &EventEnvelope,
    ) -> Result<Option<Self>, serde_json::Error> {
        match kind {
            EventKind::CustomerCreated => {
                envelope.decode_payload().map(|p| p.map(Self::CustomerCreated))
            }
            EventKind::UserUpdated => envelope.decode_payload().map(|p| p.map(Self::UserUpdated)),
            EventKind::UserDeleted => envelope.decode_payload().map(|p| p.map(Self::UserDeleted)),
            EventKind::ProviderCreated => {
                envelope.decode_payload().map(|p| p.map(Self::ProviderCreated))
            }
            EventKind::TenantCreated => {
                envelope.decode_payload().map(|p| p.map(Self::TenantCreated))
            }
            EventKind::TenantUpdated => {
                envelope.decode_payload().map(|p| p.map(Self::TenantUpdated))
            }
            EventKind::BookingCreated => {
                envelope.decode_payload().map(|p| p.map(Self::BookingCreated))
            }
            EventKind::BookingCancelled => {
                envelope.decode_payload().map(|p| p.map(Self::BookingCancelled))
            }
        }
    }

    /// The kind this event was decoded as.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::CustomerCreated(_) => EventKind::CustomerCreated,
            Self::UserUpdated(_) => EventKind::UserUpdated,
            Self::UserDeleted(_) => EventKind::UserDeleted,
            Self::ProviderCreated(_) => EventKind::ProviderCreated,
            Self::TenantCreated(_) => EventKind::TenantCreated,
            Self::TenantUpdated(_) => EventKind::TenantUpdated,
            Self::BookingCreated(_) => EventKind::BookingCreated,
            Self::BookingCancelled(_) => EventKind::BookingCancelled,
        }
    }
}

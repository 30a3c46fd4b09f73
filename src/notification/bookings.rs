//! Booking replication and booking emails.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::email::EmailMessage;
use super::handler::NotificationHandler;
use crate::events::{BookingCancelledEvent, BookingCreatedEvent};
use crate::routing::{HandlerError, HandlerResult};
use crate::storage::Booking;

/// Greeting used when the booking owner is not in the local store.
const FALLBACK_RECIPIENT_NAME: &str = "User";

/// Where a booking email for `owner_id` goes.
struct Recipient {
    to: String,
    name: String,
}

impl NotificationHandler {
    async fn recipient(&self, owner_id: Uuid) -> Result<Recipient, HandlerError> {
        let owner = self
            .with_storage(move |storage| storage.get_user(owner_id))
            .await?;

        Ok(match owner {
            Some(user) => Recipient {
                to: user.email,
                name: user.first_name,
            },
            None => Recipient {
                to: owner_id.to_string(),
                name: FALLBACK_RECIPIENT_NAME.to_string(),
            },
        })
    }

    pub(super) async fn booking_created(&self, event: BookingCreatedEvent) -> HandlerResult {
        let booking_id = event.booking_id;
        info!(booking_id = %booking_id, "Handling booking created event");

        let now = Utc::now();
        let booking = Booking {
            id: booking_id,
            tenant_id: event.tenant_id,
            start_date_time: event.start_date_time,
            end_date_time: event.end_date_time,
            created_at: now,
            updated_at: now,
        };
        let created = self
            .with_storage(move |storage| {
                if storage.get_booking(booking.id)?.is_some() {
                    return Ok(false);
                }
                storage.insert_booking(&booking)?;
                Ok(true)
            })
            .await?;

        if !created {
            warn!(booking_id = %booking_id, "Booking already exists, skipping creation");
            return Ok(());
        }
        info!(booking_id = %booking_id, "Created booking");

        let recipient = self.recipient(event.owner_id).await?;
        self.send(EmailMessage::BookingCreated {
            to: recipient.to,
            recipient_name: recipient.name,
            booking_id,
            service_id: event.service_id,
            start_date_time: event.start_date_time,
            end_date_time: event.end_date_time,
            notes: event.notes.clone(),
        })
        .await
    }

    pub(super) async fn booking_cancelled(&self, event: BookingCancelledEvent) -> HandlerResult {
        let booking_id = event.booking_id;
        info!(booking_id = %booking_id, "Handling booking cancelled event");

        let deleted = self
            .with_storage(move |storage| storage.delete_booking(booking_id))
            .await?;
        if !deleted {
            warn!(booking_id = %booking_id, "Booking not found for cancellation");
            return Ok(());
        }
        info!(booking_id = %booking_id, "Deleted booking");

        let recipient = self.recipient(event.owner_id).await?;
        self.send(EmailMessage::BookingCancelled {
            to: recipient.to,
            recipient_name: recipient.name,
            booking_id,
            service_id: event.service_id,
        })
        .await
    }
}

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use super::email::{EmailMessage, EmailSender};
use crate::events::{
    BookingCancelledEvent, BookingCreatedEvent, CustomerCreatedEvent, ProviderCreatedEvent,
    TenantCreatedEvent, TenantUpdatedEvent, UserDeletedEvent, UserUpdatedEvent,
};
use crate::routing::{EventHandler, HandlerError, HandlerResult};
use crate::storage::SqliteStorage;

/// An update arrived for a record this service never replicated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} {id} does not exist")]
pub struct MissingRecordError {
    pub kind: &'static str,
    pub id: Uuid,
}

/// Applies domain events to the local store and sends the resulting emails.
///
/// One instance serves a single dispatch. The event-specific logic lives in
/// `accounts.rs` and `bookings.rs`.
pub struct NotificationHandler {
    pub(super) storage: SqliteStorage,
    pub(super) email: Arc<dyn EmailSender>,
}

impl NotificationHandler {
    pub fn new(storage: SqliteStorage, email: Arc<dyn EmailSender>) -> Self {
        Self { storage, email }
    }

    /// Runs a store operation on the blocking pool.
    pub(super) async fn with_storage<T, F>(&self, op: F) -> Result<T, HandlerError>
    where
        F: FnOnce(&SqliteStorage) -> crate::error::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let storage = self.storage.clone();
        let result = tokio::task::spawn_blocking(move || op(&storage)).await?;
        result.map_err(HandlerError::from)
    }

    pub(super) async fn send(&self, message: EmailMessage) -> HandlerResult {
        self.email.send(&message).await?;
        Ok(())
    }
}

#[async_trait]
impl EventHandler for NotificationHandler {
    async fn on_customer_created(&self, event: CustomerCreatedEvent) -> HandlerResult {
        self.customer_created(event).await
    }

    async fn on_user_updated(&self, event: UserUpdatedEvent) -> HandlerResult {
        self.user_updated(event).await
    }

    async fn on_user_deleted(&self, event: UserDeletedEvent) -> HandlerResult {
        self.user_deleted(event).await
    }

    async fn on_provider_created(&self, event: ProviderCreatedEvent) -> HandlerResult {
        self.provider_created(event).await
    }

    async fn on_tenant_created(&self, event: TenantCreatedEvent) -> HandlerResult {
        self.tenant_created(event).await
    }

    async fn on_tenant_updated(&self, event: TenantUpdatedEvent) -> HandlerResult {
        self.tenant_updated(event).await
    }

    async fn on_booking_created(&self, event: BookingCreatedEvent) -> HandlerResult {
        self.booking_created(event).await
    }

    async fn on_booking_cancelled(&self, event: BookingCancelledEvent) -> HandlerResult {
        self.booking_cancelled(event).await
    }
}

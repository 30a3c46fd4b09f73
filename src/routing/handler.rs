//! Handler collaborators invoked by the router.

use async_trait::async_trait;

use crate::events::{
    BookingCancelledEvent, BookingCreatedEvent, CustomerCreatedEvent, ProviderCreatedEvent,
    TenantCreatedEvent, TenantUpdatedEvent, UserDeletedEvent, UserUpdatedEvent,
};

/// Error returned by a handler. Any error marks the dispatch as failed.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result of a single handler operation.
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Side effects for each routable event shape.
///
/// A handler instance lives for exactly one dispatch. Implementations that
/// touch shared state must be safe to run concurrently from several topic
/// loops.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_customer_created(&self, event: CustomerCreatedEvent) -> HandlerResult;

    async fn on_user_updated(&self, event: UserUpdatedEvent) -> HandlerResult;

    async fn on_user_deleted(&self, event: UserDeletedEvent) -> HandlerResult;

    async fn on_provider_created(&self, event: ProviderCreatedEvent) -> HandlerResult;

    async fn on_tenant_created(&self, event: TenantCreatedEvent) -> HandlerResult;

    async fn on_tenant_updated(&self, event: TenantUpdatedEvent) -> HandlerResult;

    async fn on_booking_created(&self, event: BookingCreatedEvent) -> HandlerResult;

    async fn on_booking_cancelled(&self, event: BookingCancelledEvent) -> HandlerResult;
}

/// Source of per-dispatch handlers.
///
/// The router calls [`HandlerRegistry::acquire`] once for every recognized
/// message and drops the handler when the dispatch completes. Nothing a
/// handler holds survives into the next message.
pub trait HandlerRegistry: Send + Sync {
    /// Builds a handler scoped to a single dispatch.
    ///
    /// # Errors
    ///
    /// Returns an error if the handler's collaborators cannot be resolved.
    /// The dispatch is then treated as failed.
    fn acquire(&self) -> std::result::Result<Box<dyn EventHandler>, HandlerError>;
}

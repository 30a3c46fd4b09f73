//! Discriminator-based dispatch.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::handler::{HandlerError, HandlerRegistry};
use crate::events::{DomainEvent, EventEnvelope, EventKind};

/// The result of routing one envelope. It alone decides whether the
/// consumed offset is committed.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// A handler ran and returned normally
    Handled,
    /// The discriminator is unknown or not routable on this topic
    SkippedUnknownType,
    /// The payload did not carry the identifier for its shape
    SkippedUndecodablePayload,
    /// Payload decoding, handler resolution, or the handler itself raised
    Failed(HandlerError),
}

impl DispatchOutcome {
    /// Whether the message that produced this outcome should be committed.
    pub fn should_commit(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Handled => "handled",
            Self::SkippedUnknownType => "skipped_unknown_type",
            Self::SkippedUndecodablePayload => "skipped_undecodable_payload",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(error) => write!(f, "failed: {}", error),
            other => f.write_str(other.label()),
        }
    }
}

/// The set of event kinds a topic accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    kinds: BTreeSet<EventKind>,
}

impl RouteTable {
    /// Creates a table routing the given kinds.
    pub fn new(kinds: impl IntoIterator<Item = EventKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }

    /// A table routing every known kind.
    pub fn all() -> Self {
        Self::new(EventKind::ALL)
    }

    pub fn contains(&self, kind: EventKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Routable kinds in declaration order.
    pub fn kinds(&self) -> Vec<EventKind> {
        self.kinds.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

/// Maps an envelope to exactly one handler call.
///
/// The router holds no per-message state; handlers are acquired from the
/// registry for each dispatch and dropped when it completes.
#[derive(Clone)]
pub struct EventRouter {
    registry: Arc<dyn HandlerRegistry>,
}

impl EventRouter {
    pub fn new(registry: Arc<dyn HandlerRegistry>) -> Self {
        Self { registry }
    }

    /// Routes `envelope` using the kinds allowed by `routes`.
    ///
    /// Unknown or unroutable discriminators return
    /// [`DispatchOutcome::SkippedUnknownType`] without touching the registry.
    pub async fn dispatch(
        &self,
        routes: &RouteTable,
        envelope: &EventEnvelope,
    ) -> DispatchOutcome {
        let kind = match EventKind::from_discriminator(&envelope.event_type) {
            Some(kind) if routes.contains(kind) => kind,
            _ => return DispatchOutcome::SkippedUnknownType,
        };

        let event = match DomainEvent::decode(kind, envelope) {
            Ok(Some(event)) => event,
            Ok(None) => return DispatchOutcome::SkippedUndecodablePayload,
            Err(e) => return DispatchOutcome::Failed(Box::new(e)),
        };

        let handler = match self.registry.acquire() {
            Ok(handler) => handler,
            Err(e) => return DispatchOutcome::Failed(e),
        };

        debug!(event_type = %kind, event_id = %envelope.event_id, "Invoking handler");

        let result = match event {
            DomainEvent::CustomerCreated(e) => handler.on_customer_created(e).await,
            DomainEvent::UserUpdated(e) => handler.on_user_updated(e).await,
            DomainEvent::UserDeleted(e) => handler.on_user_deleted(e).await,
            DomainEvent::ProviderCreated(e) => handler.on_provider_created(e).await,
            DomainEvent::TenantCreated(e) => handler.on_tenant_created(e).await,
            DomainEvent::TenantUpdated(e) => handler.on_tenant_updated(e).await,
            DomainEvent::BookingCreated(e) => handler.on_booking_created(e).await,
            DomainEvent::BookingCancelled(e) => handler.on_booking_cancelled(e).await,
        };

        match result {
            Ok(()) => DispatchOutcome::Handled,
            Err(e) => DispatchOutcome::Failed(e),
        }
    }
}

impl fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRouter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::*;
    use crate::routing::handler::{EventHandler, HandlerResult};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Calls {
        acquired: AtomicUsize,
        seen: Mutex<Vec<&'static str>>,
    }

    struct TestHandler {
        calls: Arc<Calls>,
        fail: bool,
    }

    impl TestHandler {
        fn record(&self, name: &'static str) -> HandlerResult {
            self.calls.seen.lock().unwrap().push(name);
            if self.fail {
                Err("handler exploded".into())
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl EventHandler for TestHandler {
        async fn on_customer_created(&self, _: CustomerCreatedEvent) -> HandlerResult {
            self.record("customer_created")
        }
        async fn on_user_updated(&self, _: UserUpdatedEvent) -> HandlerResult {
            self.record("user_updated")
        }
        async fn on_user_deleted(&self, _: UserDeletedEvent) -> HandlerResult {
            self.record("user_deleted")
        }
        async fn on_provider_created(&self, _: ProviderCreatedEvent) -> HandlerResult {
            self.record("provider_created")
        }
        async fn on_tenant_created(&self, _: TenantCreatedEvent) -> HandlerResult {
            self.record("tenant_created")
        }
        async fn on_tenant_updated(&self, _: TenantUpdatedEvent) -> HandlerResult {
            self.record("tenant_updated")
        }
        async fn on_booking_created(&self, _: BookingCreatedEvent) -> HandlerResult {
            self.record("booking_created")
        }
        async fn on_booking_cancelled(&self, _: BookingCancelledEvent) -> HandlerResult {
            self.record("booking_cancelled")
        }
    }

    struct TestRegistry {
        calls: Arc<Calls>,
        fail: bool,
    }

    impl HandlerRegistry for TestRegistry {
        fn acquire(&self) -> Result<Box<dyn EventHandler>, HandlerError> {
            self.calls.acquired.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(TestHandler {
                calls: Arc::clone(&self.calls),
                fail: self.fail,
            }))
        }
    }

    fn router(fail: bool) -> (EventRouter, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        let registry = TestRegistry {
            calls: Arc::clone(&calls),
            fail,
        };
        (EventRouter::new(Arc::new(registry)), calls)
    }

    fn envelope(value: serde_json::Value) -> EventEnvelope {
        EventEnvelope::decode(value.to_string().as_bytes()).unwrap()
    }

    fn customer_created() -> EventEnvelope {
        envelope(json!({
            "eventType": "CustomerCreatedEvent",
            "userId": "4e1b3c6a-0f2d-4a7b-8c9e-1d2f3a4b5c6d",
            "email": "jane@example.com"
        }))
    }

    #[tokio::test]
    async fn test_recognized_event_is_handled() {
        let (router, calls) = router(false);

        let outcome = router.dispatch(&RouteTable::all(), &customer_created()).await;

        assert!(matches!(outcome, DispatchOutcome::Handled));
        assert_eq!(*calls.seen.lock().unwrap(), vec!["customer_created"]);
        assert_eq!(calls.acquired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handler_error_is_failed() {
        let (router, _calls) = router(true);

        let outcome = router.dispatch(&RouteTable::all(), &customer_created()).await;

        assert!(matches!(outcome, DispatchOutcome::Failed(_)));
        assert!(!outcome.should_commit());
    }

    #[tokio::test]
    async fn test_unknown_type_never_acquires_handler() {
        let (router, calls) = router(false);

        let outcome = router
            .dispatch(&RouteTable::all(), &envelope(json!({"eventType": "UnknownThing"})))
            .await;

        assert!(matches!(outcome, DispatchOutcome::SkippedUnknownType));
        assert!(outcome.should_commit());
        assert_eq!(calls.acquired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_kind_outside_route_table_is_unknown() {
        let (router, calls) = router(false);
        let routes = RouteTable::new([EventKind::BookingCreated, EventKind::BookingCancelled]);

        let outcome = router.dispatch(&routes, &customer_created()).await;

        assert!(matches!(outcome, DispatchOutcome::SkippedUnknownType));
        assert_eq!(calls.acquired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_identifier_is_undecodable() {
        let (router, calls) = router(false);

        let outcome = router
            .dispatch(
                &RouteTable::all(),
                &envelope(json!({"eventType": "BookingCreatedEvent", "notes": "hi"})),
            )
            .await;

        assert!(matches!(outcome, DispatchOutcome::SkippedUndecodablePayload));
        assert!(calls.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_null_text_fields_are_handled() {
        let (router, calls) = router(false);

        let outcome = router
            .dispatch(
                &RouteTable::all(),
                &envelope(json!({
                    "eventType": "CustomerCreatedEvent",
                    "userId": "4e1b3c6a-0f2d-4a7b-8c9e-1d2f3a4b5c6d",
                    "email": "a@b.c",
                    "lastName": null
                })),
            )
            .await;

        assert!(matches!(outcome, DispatchOutcome::Handled));
        assert_eq!(*calls.seen.lock().unwrap(), vec!["customer_created"]);
    }

    #[tokio::test]
    async fn test_mistyped_payload_is_failed() {
        let (router, calls) = router(false);

        let outcome = router
            .dispatch(
                &RouteTable::all(),
                &envelope(json!({"eventType": "UserDeletedEvent", "userId": 42})),
            )
            .await;

        assert!(matches!(outcome, DispatchOutcome::Failed(_)));
        assert!(calls.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_route_table_kinds_are_ordered() {
        let routes = RouteTable::new([EventKind::UserDeleted, EventKind::CustomerCreated]);
        assert_eq!(
            routes.kinds(),
            vec![EventKind::CustomerCreated, EventKind::UserDeleted]
        );
        assert!(!routes.contains(EventKind::TenantCreated));
        assert_eq!(routes.len(), 2);
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(DispatchOutcome::Handled.label(), "handled");
        assert_eq!(
            DispatchOutcome::Failed("boom".into()).to_string(),
            "failed: boom"
        );
    }
}

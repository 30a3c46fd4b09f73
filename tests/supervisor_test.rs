//! Supervisor fan-out, isolation between topics, and teardown.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use common::{customer_created_json, envelope_bytes, wait_until, RecordingRegistry};
use notification_consumer::consumer::memory::MemoryBroker;
use notification_consumer::consumer::{
    drain, ConnectionState, ConsumerSupervisor, EventFamily, TopicBinding,
};
use notification_consumer::events::{EventKind, TenantCreatedEvent, TenantEvent};
use notification_consumer::routing::EventRouter;

fn supervisor(broker: &MemoryBroker, registry: &RecordingRegistry) -> ConsumerSupervisor {
    ConsumerSupervisor::new(
        Arc::new(broker.connector()),
        EventRouter::new(Arc::new(registry.clone())),
        "notification-service",
    )
    .with_reconnect_delay(Duration::from_millis(10))
}

fn all_bindings() -> Vec<TopicBinding> {
    EventFamily::ALL
        .iter()
        .map(|family| TopicBinding::for_family(*family, family.group_suffix()))
        .collect()
}

#[tokio::test]
async fn test_one_loop_per_binding_with_distinct_groups() {
    let broker = MemoryBroker::new();
    let registry = RecordingRegistry::new();
    let shutdown = CancellationToken::new();

    let mut handles = supervisor(&broker, &registry).spawn(all_bindings(), &shutdown);
    for handle in handles.iter_mut() {
        assert!(handle.wait_for_state(ConnectionState::Consuming).await);
    }

    let mut groups: Vec<&str> = handles.iter().map(|h| h.group_id()).collect();
    groups.sort();
    assert_eq!(
        groups,
        vec![
            "notification-service-booking-events",
            "notification-service-provider-events",
            "notification-service-tenant-events",
            "notification-service-user-events",
        ]
    );
    assert_eq!(broker.open_handles(), 4);

    shutdown.cancel();
    let report = drain(handles, Duration::from_secs(5)).await;

    assert_eq!(report.stopped, 4);
    assert_eq!(broker.open_handles(), 0);
}

#[tokio::test]
async fn test_stalled_topic_does_not_block_others() {
    let broker = MemoryBroker::new();
    let registry = RecordingRegistry::new();
    let shutdown = CancellationToken::new();
    let tenant_id = Uuid::new_v4();

    broker.publish("user-events", b"not-json".to_vec());
    broker.publish(
        "tenant-events",
        envelope_bytes(&TenantCreatedEvent(TenantEvent {
            tenant_id,
            owner_id: Uuid::new_v4(),
            vat_number: "IT000".to_string(),
            business_name: "Shop".to_string(),
            ..Default::default()
        })),
    );

    let handles = supervisor(&broker, &registry).spawn(all_bindings(), &shutdown);

    assert!(
        wait_until(|| {
            broker.committed_offset("notification-service-tenant-events", "tenant-events")
                == Some(1)
        })
        .await
    );
    shutdown.cancel();
    drain(handles, Duration::from_secs(5)).await;

    assert_eq!(registry.calls(), vec![(EventKind::TenantCreated, tenant_id)]);
    assert_eq!(
        broker.committed_offset("notification-service-user-events", "user-events"),
        None
    );
}

#[tokio::test]
async fn test_failed_loop_is_not_restarted() {
    let broker = MemoryBroker::new();
    let registry = RecordingRegistry::new();
    let shutdown = CancellationToken::new();

    let mut handles = supervisor(&broker, &registry).spawn(
        vec![TopicBinding::for_family(EventFamily::User, "user-events")],
        &shutdown,
    );
    assert!(handles[0].wait_for_state(ConnectionState::Consuming).await);

    broker.fail_next_poll("group coordinator lost");
    assert!(handles[0].wait_for_state(ConnectionState::Stopped).await);
    assert!(wait_until(|| handles[0].is_finished()).await);

    broker.publish("user-events", customer_created_json(Uuid::new_v4(), "x@example.com"));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(broker.connect_attempts(), 1);
    assert!(registry.calls().is_empty());

    shutdown.cancel();
    let report = drain(handles, Duration::from_secs(1)).await;
    assert_eq!(report.stopped, 1);
}

#[tokio::test]
async fn test_run_returns_handles_after_shutdown() {
    let broker = MemoryBroker::new();
    let registry = RecordingRegistry::new();
    let shutdown = CancellationToken::new();

    let canceller = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let handles = supervisor(&broker, &registry)
        .run(all_bindings(), shutdown)
        .await;
    assert_eq!(handles.len(), 4);

    let report = drain(handles, Duration::from_secs(5)).await;
    assert_eq!(report.stopped, 4);
    assert_eq!(report.aborted, 0);
}

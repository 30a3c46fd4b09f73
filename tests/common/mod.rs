use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;
use uuid::Uuid;

use notification_consumer::events::*;
use notification_consumer::routing::{EventHandler, HandlerError, HandlerRegistry, HandlerResult};
use notification_consumer::storage::SqliteStorage;

#[allow(dead_code)]
pub fn create_temp_storage() -> (SqliteStorage, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let db_path = tmp.path().join("notifications.db");
    let storage =
        SqliteStorage::new_with_path(db_path).expect("failed to create sqlite storage with path");
    (storage, tmp)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Polls `condition` every 5ms until it holds or five seconds pass.
#[allow(dead_code)]
pub async fn wait_until<F: FnMut() -> bool>(mut condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

#[allow(dead_code)]
pub fn customer_created_json(user_id: Uuid, email: &str) -> Vec<u8> {
    json!({
        "eventId": Uuid::new_v4(),
        "occurredAt": "2026-01-15T10:00:00.000Z",
        "eventType": "CustomerCreatedEvent",
        "version": "1.0",
        "userId": user_id,
        "username": "jane",
        "firstName": "Jane",
        "lastName": "Doe",
        "email": email,
        "role": 1
    })
    .to_string()
    .into_bytes()
}

#[allow(dead_code)]
pub fn envelope_bytes<P: EventPayload>(event: &P) -> Vec<u8> {
    EventEnvelope::wrap(event)
        .and_then(|envelope| envelope.encode())
        .expect("failed to encode envelope")
}

/// Registry whose handlers record every call and fail on demand.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct RecordingRegistry {
    calls: Arc<Mutex<Vec<(EventKind, Uuid)>>>,
    acquisitions: Arc<AtomicUsize>,
    failures_left: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl RecordingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` handler calls return an error.
    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    /// Handler calls so far, as (kind, key) pairs.
    pub fn calls(&self) -> Vec<(EventKind, Uuid)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }
}

impl HandlerRegistry for RecordingRegistry {
    fn acquire(&self) -> Result<Box<dyn EventHandler>, HandlerError> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingHandler {
            registry: self.clone(),
        }))
    }
}

struct RecordingHandler {
    registry: RecordingRegistry,
}

impl RecordingHandler {
    fn record(&self, kind: EventKind, key: Uuid) -> HandlerResult {
        if let Ok(mut calls) = self.registry.calls.lock() {
            calls.push((kind, key));
        }

        let failing = self
            .registry
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(format!("handler failure for {}", key).into());
        }
        Ok(())
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn on_customer_created(&self, event: CustomerCreatedEvent) -> HandlerResult {
        self.record(EventKind::CustomerCreated, event.user_id)
    }

    async fn on_user_updated(&self, event: UserUpdatedEvent) -> HandlerResult {
        self.record(EventKind::UserUpdated, event.user_id)
    }

    async fn on_user_deleted(&self, event: UserDeletedEvent) -> HandlerResult {
        self.record(EventKind::UserDeleted, event.user_id)
    }

    async fn on_provider_created(&self, event: ProviderCreatedEvent) -> HandlerResult {
        self.record(EventKind::ProviderCreated, event.user_id)
    }

    async fn on_tenant_created(&self, event: TenantCreatedEvent) -> HandlerResult {
        self.record(EventKind::TenantCreated, event.tenant_id)
    }

    async fn on_tenant_updated(&self, event: TenantUpdatedEvent) -> HandlerResult {
        self.record(EventKind::TenantUpdated, event.tenant_id)
    }

    async fn on_booking_created(&self, event: BookingCreatedEvent) -> HandlerResult {
        self.record(EventKind::BookingCreated, event.booking_id)
    }

    async fn on_booking_cancelled(&self, event: BookingCancelledEvent) -> HandlerResult {
        self.record(EventKind::BookingCancelled, event.booking_id)
    }
}

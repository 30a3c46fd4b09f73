//! Notification handlers
//!
//! Replicates users, tenants and bookings into the local store and sends the
//! emails that go with them. [`ServiceRegistry`] is the [`HandlerRegistry`]
//! the consumer loops dispatch into.

pub mod accounts;
pub mod bookings;
pub mod email;
pub mod handler;

pub use email::{EmailError, EmailMessage, EmailSender, MockEmailService};
#[cfg(any(test, feature = "test-util"))]
pub use email::RecordingEmailSender;
pub use handler::{MissingRecordError, NotificationHandler};

use std::sync::Arc;

use crate::routing::{EventHandler, HandlerError, HandlerRegistry};
use crate::storage::SqliteStorage;

/// Builds a fresh [`NotificationHandler`] for every dispatch.
#[derive(Clone)]
pub struct ServiceRegistry {
    storage: SqliteStorage,
    email: Arc<dyn EmailSender>,
}

impl ServiceRegistry {
    pub fn new(storage: SqliteStorage, email: Arc<dyn EmailSender>) -> Self {
        Self { storage, email }
    }

    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

impl HandlerRegistry for ServiceRegistry {
    fn acquire(&self) -> Result<Box<dyn EventHandler>, HandlerError> {
        Ok(Box::new(NotificationHandler::new(
            self.storage.clone(),
            Arc::clone(&self.email),
        )))
    }
}

//! User, provider and tenant replication.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::email::EmailMessage;
use super::handler::{MissingRecordError, NotificationHandler};
use crate::events::{
    CustomerCreatedEvent, ProviderCreatedEvent, TenantCreatedEvent, TenantEvent,
    TenantUpdatedEvent, UserDeletedEvent, UserEvent, UserUpdatedEvent,
};
use crate::routing::HandlerResult;
use crate::storage::{Tenant, User};

fn user_from_event(event: &UserEvent, now: DateTime<Utc>) -> User {
    User {
        id: event.user_id,
        first_name: event.first_name.clone(),
        last_name: event.last_name.clone(),
        email: event.email.clone(),
        tenant_id: event.tenant_id,
        created_at: now,
        updated_at: now,
    }
}

fn tenant_from_event(event: &TenantEvent, now: DateTime<Utc>) -> Tenant {
    Tenant {
        id: event.tenant_id,
        owner_id: event.owner_id,
        vat_number: event.vat_number.clone(),
        business_name: event.business_name.clone(),
        business_email: event.business_email.clone(),
        business_phone: event.business_phone.clone(),
        address: event.address.clone().unwrap_or_default(),
        description: event.description.clone(),
        created_at: now,
        updated_at: now,
    }
}

fn welcome(user: &User) -> EmailMessage {
    EmailMessage::Welcome {
        to: user.email.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
    }
}

impl NotificationHandler {
    pub(super) async fn customer_created(&self, event: CustomerCreatedEvent) -> HandlerResult {
        let user_id = event.user_id;
        info!(user_id = %user_id, "Handling customer created event");

        let user = user_from_event(&event, Utc::now());
        let to_insert = user.clone();
        let created = self
            .with_storage(move |storage| {
                if storage.get_user(to_insert.id)?.is_some() {
                    return Ok(false);
                }
                storage.insert_user(&to_insert)?;
                Ok(true)
            })
            .await?;

        if !created {
            warn!(user_id = %user_id, "User already exists, skipping creation");
            return Ok(());
        }
        info!(user_id = %user_id, "Created customer");

        self.send(welcome(&user)).await?;
        info!(email = %user.email, "Sent welcome email");
        Ok(())
    }

    /// Creates the provider's tenant and then the provider's user account.
    /// Either may already exist; the welcome email goes out only when the
    /// user is new.
    pub(super) async fn provider_created(&self, event: ProviderCreatedEvent) -> HandlerResult {
        info!(
            user_id = %event.user_id,
            tenant_id = %event.tenant_id,
            "Handling provider created event"
        );

        let now = Utc::now();
        let tenant = Tenant {
            id: event.tenant_id,
            owner_id: event.owner_id,
            vat_number: event.vat_number.clone(),
            business_name: event.business_name.clone(),
            business_email: event.business_email.clone(),
            business_phone: event.business_phone.clone(),
            address: event.address.clone().unwrap_or_default(),
            description: event.description.clone(),
            created_at: now,
            updated_at: now,
        };
        let user = User {
            id: event.user_id,
            first_name: event.first_name.clone(),
            last_name: event.last_name.clone(),
            email: event.email.clone(),
            tenant_id: Some(event.tenant_id),
            created_at: now,
            updated_at: now,
        };

        let tenant_created = self
            .with_storage(move |storage| {
                if storage.get_tenant(tenant.id)?.is_some() {
                    return Ok(false);
                }
                storage.insert_tenant(&tenant)?;
                Ok(true)
            })
            .await?;
        if tenant_created {
            info!(tenant_id = %event.tenant_id, "Created tenant");
        } else {
            info!(tenant_id = %event.tenant_id, "Tenant already exists, skipping creation");
        }

        let to_insert = user.clone();
        let user_created = self
            .with_storage(move |storage| {
                if storage.get_user(to_insert.id)?.is_some() {
                    return Ok(false);
                }
                storage.insert_user(&to_insert)?;
                Ok(true)
            })
            .await?;
        if !user_created {
            info!(user_id = %event.user_id, "User already exists, skipping creation");
            return Ok(());
        }
        info!(user_id = %event.user_id, "Created provider user");

        self.send(welcome(&user)).await?;
        info!(email = %user.email, "Sent welcome email");
        Ok(())
    }

    pub(super) async fn user_updated(&self, event: UserUpdatedEvent) -> HandlerResult {
        let user_id = event.user_id;
        info!(user_id = %user_id, "Handling user updated event");

        let user = user_from_event(&event, Utc::now());
        let updated = self
            .with_storage(move |storage| storage.update_user(&user))
            .await?;
        if !updated {
            return Err(Box::new(MissingRecordError {
                kind: "user",
                id: user_id,
            }));
        }

        info!(user_id = %user_id, "Updated user");
        Ok(())
    }

    pub(super) async fn user_deleted(&self, event: UserDeletedEvent) -> HandlerResult {
        let user_id = event.user_id;
        info!(user_id = %user_id, "Handling user deleted event");

        let deleted = self
            .with_storage(move |storage| storage.delete_user(user_id))
            .await?;
        if deleted {
            info!(user_id = %user_id, "Deleted user");
        } else {
            warn!(user_id = %user_id, "User not found for deletion");
        }
        Ok(())
    }

    pub(super) async fn tenant_created(&self, event: TenantCreatedEvent) -> HandlerResult {
        let tenant_id = event.tenant_id;
        info!(tenant_id = %tenant_id, "Handling tenant created event");

        let tenant = tenant_from_event(&event, Utc::now());
        let created = self
            .with_storage(move |storage| {
                if storage.get_tenant(tenant.id)?.is_some() {
                    return Ok(false);
                }
                storage.insert_tenant(&tenant)?;
                Ok(true)
            })
            .await?;

        if created {
            info!(tenant_id = %tenant_id, "Created tenant");
        } else {
            warn!(tenant_id = %tenant_id, "Tenant already exists, skipping creation");
        }
        Ok(())
    }

    pub(super) async fn tenant_updated(&self, event: TenantUpdatedEvent) -> HandlerResult {
        let tenant_id = event.tenant_id;
        info!(tenant_id = %tenant_id, "Handling tenant updated event");

        let tenant = tenant_from_event(&event, Utc::now());
        let updated = self
            .with_storage(move |storage| storage.update_tenant(&tenant))
            .await?;
        if !updated {
            return Err(Box::new(MissingRecordError {
                kind: "tenant",
                id: tenant_id,
            }));
        }

        info!(tenant_id = %tenant_id, "Updated tenant");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::email::RecordingEmailSender;
    use crate::storage::SqliteStorage;
    use std::sync::Arc;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn handler() -> (NotificationHandler, SqliteStorage, RecordingEmailSender, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = SqliteStorage::new_with_path(dir.path().join("test.db")).unwrap();
        let email = RecordingEmailSender::new();
        let handler = NotificationHandler::new(storage.clone(), Arc::new(email.clone()));
        (handler, storage, email, dir)
    }

    fn user_event(email: &str) -> UserEvent {
        UserEvent {
            user_id: Uuid::new_v4(),
            username: "jane".to_string(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: email.to_string(),
            role: 1,
            tenant_id: None,
        }
    }

    fn tenant_event() -> TenantEvent {
        TenantEvent {
            tenant_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            vat_number: "IT01234567890".to_string(),
            business_name: "Barber Shop".to_string(),
            business_email: None,
            business_phone: None,
            address: None,
            description: None,
        }
    }

    #[tokio::test]
    async fn test_customer_created_inserts_and_welcomes() {
        let (handler, storage, email, _dir) = handler();
        let event = user_event("jane@example.com");
        let user_id = event.user_id;

        handler
            .customer_created(CustomerCreatedEvent(event))
            .await
            .unwrap();

        assert!(storage.get_user(user_id).unwrap().is_some());
        assert_eq!(email.sent().len(), 1);
        assert_eq!(email.sent()[0].to(), "jane@example.com");
    }

    #[tokio::test]
    async fn test_customer_created_twice_sends_one_email() {
        let (handler, _storage, email, _dir) = handler();
        let event = user_event("jane@example.com");

        handler
            .customer_created(CustomerCreatedEvent(event.clone()))
            .await
            .unwrap();
        handler
            .customer_created(CustomerCreatedEvent(event))
            .await
            .unwrap();

        assert_eq!(email.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_customer_created_email_failure_is_an_error() {
        let (handler, storage, email, _dir) = handler();
        email.fail_next(1);
        let event = user_event("jane@example.com");
        let user_id = event.user_id;

        let result = handler.customer_created(CustomerCreatedEvent(event)).await;

        assert!(result.is_err());
        assert!(storage.get_user(user_id).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_provider_created_creates_tenant_then_user() {
        let (handler, storage, email, _dir) = handler();
        let event = ProviderCreatedEvent {
            user_id: Uuid::new_v4(),
            first_name: "Mario".to_string(),
            last_name: "Rossi".to_string(),
            email: "mario@example.com".to_string(),
            tenant_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            vat_number: "IT000".to_string(),
            business_name: "Mario's".to_string(),
            ..Default::default()
        };

        handler.provider_created(event.clone()).await.unwrap();

        let tenant = storage.get_tenant(event.tenant_id).unwrap().unwrap();
        assert_eq!(tenant.address, "");
        let user = storage.get_user(event.user_id).unwrap().unwrap();
        assert_eq!(user.tenant_id, Some(event.tenant_id));
        assert_eq!(email.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_user_updated_preserves_created_at() {
        let (handler, storage, _email, _dir) = handler();
        let event = user_event("jane@example.com");
        handler
            .customer_created(CustomerCreatedEvent(event.clone()))
            .await
            .unwrap();
        let before = storage.get_user(event.user_id).unwrap().unwrap();

        let mut changed = event.clone();
        changed.last_name = "Smith".to_string();
        handler
            .user_updated(UserUpdatedEvent(changed))
            .await
            .unwrap();

        let after = storage.get_user(event.user_id).unwrap().unwrap();
        assert_eq!(after.last_name, "Smith");
        assert_eq!(after.created_at, before.created_at);
    }

    #[tokio::test]
    async fn test_user_updated_for_unknown_user_fails() {
        let (handler, _storage, _email, _dir) = handler();

        let result = handler
            .user_updated(UserUpdatedEvent(user_event("x@example.com")))
            .await;

        let err = result.unwrap_err();
        assert!(err.to_string().starts_with("user "));
    }

    #[tokio::test]
    async fn test_user_deleted_absent_is_ok() {
        let (handler, _storage, _email, _dir) = handler();
        let event = UserDeletedEvent {
            user_id: Uuid::new_v4(),
        };
        assert!(handler.user_deleted(event).await.is_ok());
    }

    #[tokio::test]
    async fn test_tenant_created_then_updated() {
        let (handler, storage, _email, _dir) = handler();
        let event = tenant_event();
        handler
            .tenant_created(TenantCreatedEvent(event.clone()))
            .await
            .unwrap();

        let mut changed = event.clone();
        changed.address = Some("Via Roma 1".to_string());
        handler
            .tenant_updated(TenantUpdatedEvent(changed))
            .await
            .unwrap();

        let tenant = storage.get_tenant(event.tenant_id).unwrap().unwrap();
        assert_eq!(tenant.address, "Via Roma 1");
    }

    #[tokio::test]
    async fn test_tenant_updated_for_unknown_tenant_fails() {
        let (handler, _storage, _email, _dir) = handler();
        let result = handler
            .tenant_updated(TenantUpdatedEvent(tenant_event()))
            .await;
        assert!(result.is_err());
    }
}

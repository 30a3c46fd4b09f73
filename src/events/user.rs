//! User and provider lifecycle events.

use serde::{Deserialize, Serialize};
use std::ops::Deref;
use uuid::Uuid;

use super::envelope::{null_as_default, EventPayload};

/// Common body of user lifecycle events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserEvent {
    /// Identifier of the user in the identity service
    pub user_id: Uuid,
    /// Login name
    #[serde(deserialize_with = "null_as_default")]
    pub username: String,
    /// Given name
    #[serde(deserialize_with = "null_as_default")]
    pub first_name: String,
    /// Family name
    #[serde(deserialize_with = "null_as_default")]
    pub last_name: String,
    /// Primary email address
    #[serde(deserialize_with = "null_as_default")]
    pub email: String,
    /// Numeric role code assigned by the identity service
    pub role: i32,
    /// Tenant the user belongs to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,
}

/// A customer account was registered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerCreatedEvent(pub UserEvent);

/// A user's profile changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserUpdatedEvent(pub UserEvent);

impl Deref for CustomerCreatedEvent {
    type Target = UserEvent;

    fn deref(&self) -> &UserEvent {
        &self.0
    }
}

impl Deref for UserUpdatedEvent {
    type Target = UserEvent;

    fn deref(&self) -> &UserEvent {
        &self.0
    }
}

impl EventPayload for CustomerCreatedEvent {
    const EVENT_TYPE: &'static str = "CustomerCreatedEvent";
    const KEY_FIELD: &'static str = "userId";
}

impl EventPayload for UserUpdatedEvent {
    const EVENT_TYPE: &'static str = "UserUpdatedEvent";
    const KEY_FIELD: &'static str = "userId";
}

/// A user account was removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserDeletedEvent {
    pub user_id: Uuid,
}

impl EventPayload for UserDeletedEvent {
    const EVENT_TYPE: &'static str = "UserDeletedEvent";
    const KEY_FIELD: &'static str = "userId";
}

/// A service provider signed up, creating both an owner account and a tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderCreatedEvent {
    pub user_id: Uuid,
    #[serde(deserialize_with = "null_as_default")]
    pub username: String,
    #[serde(deserialize_with = "null_as_default")]
    pub first_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub last_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub email: String,
    pub role: i32,
    pub tenant_id: Uuid,
    pub owner_id: Uuid,
    #[serde(deserialize_with = "null_as_default")]
    pub vat_number: String,
    #[serde(deserialize_with = "null_as_default")]
    pub business_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl EventPayload for ProviderCreatedEvent {
    const EVENT_TYPE: &'static str = "ProviderCreatedEvent";
    const KEY_FIELD: &'static str = "userId";
}

//! Tenant lifecycle events.

use serde::{Deserialize, Serialize};
use std::ops::Deref;
use uuid::Uuid;

use super::envelope::{null_as_default, EventPayload};

/// Common body of tenant lifecycle events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TenantEvent {
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

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantCreatedEvent(pub TenantEvent);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantUpdatedEvent(pub TenantEvent);

impl Deref for TenantCreatedEvent {
    type Target = TenantEvent;

    fn deref(&self) -> &TenantEvent {
        &self.0
    }
}

impl Deref for TenantUpdatedEvent {
    type Target = TenantEvent;

    fn deref(&self) -> &TenantEvent {
        &self.0
    }
}

impl EventPayload for TenantCreatedEvent {
    const EVENT_TYPE: &'static str = "TenantCreatedEvent";
    const KEY_FIELD: &'static str = "tenantId";
}

impl EventPayload for TenantUpdatedEvent {
    const EVENT_TYPE: &'static str = "TenantUpdatedEvent";
    const KEY_FIELD: &'static str = "tenantId";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tenant_event_null_address_is_none() {
        let event: TenantCreatedEvent = serde_json::from_value(json!({
            "tenantId": "9a7e8f60-1b2c-4d3e-8f90-a1b2c3d4e5f6",
            "ownerId": "4e1b3c6a-0f2d-4a7b-8c9e-1d2f3a4b5c6d",
            "vatNumber": "IT123",
            "businessName": "Barber Shop",
            "address": null
        }))
        .unwrap();

        assert_eq!(event.business_name, "Barber Shop");
        assert!(event.address.is_none());
    }

    #[test]
    fn test_tenant_event_null_vat_number_is_empty() {
        let event: TenantUpdatedEvent = serde_json::from_value(json!({
            "tenantId": "9a7e8f60-1b2c-4d3e-8f90-a1b2c3d4e5f6",
            "vatNumber": null,
            "businessName": "Barber Shop"
        }))
        .unwrap();

        assert_eq!(event.vat_number, "");
    }
}

//! Topic bindings.
//!
//! A [`TopicBinding`] is everything one consumer loop needs to know about
//! its subscription: the topic, the consumer-group suffix, and which event
//! kinds the topic may route.

use std::fmt;

use crate::events::EventKind;
use crate::routing::RouteTable;

/// The four event families the service subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventFamily {
    User,
    Tenant,
    Provider,
    Booking,
}

impl EventFamily {
    pub const ALL: [EventFamily; 4] = [
        EventFamily::User,
        EventFamily::Tenant,
        EventFamily::Provider,
        EventFamily::Booking,
    ];

    /// Consumer-group suffix for this family.
    pub fn group_suffix(&self) -> &'static str {
        match self {
            Self::User => "user-events",
            Self::Tenant => "tenant-events",
            Self::Provider => "provider-events",
            Self::Booking => "booking-events",
        }
    }

    /// Event kinds published on this family's topic.
    pub fn kinds(&self) -> &'static [EventKind] {
        match self {
            Self::User => &[
                EventKind::CustomerCreated,
                EventKind::UserUpdated,
                EventKind::UserDeleted,
            ],
            Self::Tenant => &[EventKind::TenantCreated, EventKind::TenantUpdated],
            Self::Provider => &[EventKind::ProviderCreated],
            Self::Booking => &[EventKind::BookingCreated, EventKind::BookingCancelled],
        }
    }
}

impl fmt::Display for EventFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.group_suffix())
    }
}

/// Immutable description of one subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicBinding {
    /// Topic to subscribe to
    pub topic: String,
    /// Appended to the shared group prefix to form the consumer group id
    pub group_suffix: String,
    /// Event kinds routable on this topic
    pub routes: RouteTable,
}

impl TopicBinding {
    pub fn new(
        topic: impl Into<String>,
        group_suffix: impl Into<String>,
        routes: RouteTable,
    ) -> Self {
        Self {
            topic: topic.into(),
            group_suffix: group_suffix.into(),
            routes,
        }
    }

    /// Binding for a family's topic with its standard suffix and routes.
    ///
    /// # Examples
    ///
    /// ```
    /// use notification_consumer::consumer::{EventFamily, TopicBinding};
    /// use notification_consumer::events::EventKind;
    ///
    /// let binding = TopicBinding::for_family(EventFamily::Booking, "booking-events");
    /// assert_eq!(binding.group_suffix, "booking-events");
    /// assert!(binding.routes.contains(EventKind::BookingCancelled));
    /// assert!(!binding.routes.contains(EventKind::CustomerCreated));
    /// ```
    pub fn for_family(family: EventFamily, topic: impl Into<String>) -> Self {
        Self::new(
            topic,
            family.group_suffix(),
            RouteTable::new(family.kinds().iter().copied()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_families_partition_all_kinds() {
        let mut seen: Vec<EventKind> = EventFamily::ALL
            .iter()
            .flat_map(|family| family.kinds().iter().copied())
            .collect();
        seen.sort();
        assert_eq!(seen, EventKind::ALL.to_vec());
    }

    #[test]
    fn test_user_binding_routes_user_events_only() {
        let binding = TopicBinding::for_family(EventFamily::User, "users");

        assert_eq!(binding.topic, "users");
        assert_eq!(binding.group_suffix, "user-events");
        assert_eq!(
            binding.routes.kinds(),
            vec![
                EventKind::CustomerCreated,
                EventKind::UserUpdated,
                EventKind::UserDeleted
            ]
        );
    }

    #[test]
    fn test_provider_binding() {
        let binding = TopicBinding::for_family(EventFamily::Provider, "providers");
        assert_eq!(binding.routes.kinds(), vec![EventKind::ProviderCreated]);
        assert_eq!(EventFamily::Provider.to_string(), "provider-events");
    }
}

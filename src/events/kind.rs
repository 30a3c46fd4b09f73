//! Discriminators for the known event families.

use std::fmt;

/// Every `eventType` the service knows how to route.
///
/// The wire discriminator is the producer's type name, e.g.
/// `CustomerCreatedEvent`. Matching is exact and case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    /// A customer account was registered
    CustomerCreated,
    /// A user's profile changed
    UserUpdated,
    /// A user was removed
    UserDeleted,
    /// A provider signed up together with their business (tenant)
    ProviderCreated,
    /// A tenant was created on its own
    TenantCreated,
    /// A tenant's business details changed
    TenantUpdated,
    /// A booking was placed
    BookingCreated,
    /// A booking was cancelled
    BookingCancelled,
}

impl EventKind {
    /// All known kinds, in routing-table order.
    pub const ALL: [EventKind; 8] = [
        EventKind::CustomerCreated,
        EventKind::UserUpdated,
        EventKind::UserDeleted,
        EventKind::ProviderCreated,
        EventKind::TenantCreated,
        EventKind::TenantUpdated,
        EventKind::BookingCreated,
        EventKind::BookingCancelled,
    ];

    /// Returns the wire discriminator for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CustomerCreated => "CustomerCreatedEvent",
            Self::UserUpdated => "UserUpdatedEvent",
            Self::UserDeleted => "UserDeletedEvent",
            Self::ProviderCreated => "ProviderCreatedEvent",
            Self::TenantCreated => "TenantCreatedEvent",
            Self::TenantUpdated => "TenantUpdatedEvent",
            Self::BookingCreated => "BookingCreatedEvent",
            Self::BookingCancelled => "BookingCancelledEvent",
        }
    }

    /// Resolves a wire discriminator, returning `None` for anything unknown.
    ///
    /// # Examples
    ///
    /// ```
    /// use notification_consumer::events::EventKind;
    ///
    /// assert_eq!(
    ///     EventKind::from_discriminator("TenantUpdatedEvent"),
    ///     Some(EventKind::TenantUpdated)
    /// );
    /// assert_eq!(EventKind::from_discriminator("UnknownThing"), None);
    /// ```
    pub fn from_discriminator(discriminator: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == discriminator)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

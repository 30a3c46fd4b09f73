//! Event routing
//!
//! Turns a decoded [`EventEnvelope`](crate::events::EventEnvelope) into a
//! single handler call and reports a [`DispatchOutcome`] that the consumer
//! loop uses to decide whether to commit.

pub mod handler;
pub mod router;

pub use handler::{EventHandler, HandlerError, HandlerRegistry, HandlerResult};
pub use router::{DispatchOutcome, EventRouter, RouteTable};

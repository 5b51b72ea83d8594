//! # Receive endpoint coordinator.
//!
//! A [`ReceiveEndpoint`] owns one logical endpoint: a scope under the
//! [`Supervisor`](crate::Supervisor), the consumer bound to it, and the
//! lifecycle events fanned out to observers.
//!
//! - [`ReceiveEndpointBuilder`] collects broker, settings, pipe and observers
//! - [`ReceiveEndpoint`] handle to a started endpoint (`stop`, `completed`, `state`)
//! - [`events`] lifecycle event payloads

mod builder;
mod coordinator;
pub mod events;

pub use builder::ReceiveEndpointBuilder;
pub use coordinator::{EndpointState, ReceiveEndpoint};
pub use events::{
    ReceiveEndpointCompleted, ReceiveEndpointEvent, ReceiveEndpointFaulted, ReceiveEndpointReady,
};

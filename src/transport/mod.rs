//! # Transport-facing side of the runtime.
//!
//! - [`Broker`] the subscription capability each transport implements
//! - [`Delivery`] / [`DeliverySink`] raw messages and the callback they arrive on
//! - [`HostSettings`] / [`ReceiveSettings`] where to connect and what to subscribe
//! - [`DeliveryMetrics`] counters reported when an endpoint completes
//! - [`memory::InMemoryBroker`] in-process broker for tests and demos

mod broker;
mod consumer;
mod delivery;
mod host;
pub mod memory;
mod metrics;
mod settings;

pub use broker::Broker;
pub(crate) use consumer::{Consumer, ConsumerParts};
pub use consumer::DeliverySink;
pub use delivery::{AckMode, ConsumerTag, Delivery, Settlement};
pub use host::HostSettings;
pub use metrics::DeliveryMetrics;
pub use settings::ReceiveSettings;

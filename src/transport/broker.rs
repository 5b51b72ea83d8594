//! # Broker subscription capability.
//!
//! A [`Broker`] is implemented by each transport. The runtime only needs to
//! subscribe a [`DeliverySink`](crate::DeliverySink) to a queue, cancel that
//! subscription, and settle deliveries when acknowledgements are manual.
//!
//! ## Contract
//! - `subscribe` returns once the broker has acknowledged the subscription;
//!   deliveries may be pushed to the sink before it returns.
//! - `cancel` returns once the broker guarantees no further deliveries;
//!   deliveries pushed while it is pending are still processed.
//! - An unsolicited cancel or connection loss is reported via
//!   [`DeliverySink::fault`](crate::DeliverySink::fault).

use async_trait::async_trait;

use super::consumer::DeliverySink;
use super::delivery::{ConsumerTag, Settlement};
use super::settings::ReceiveSettings;
use crate::error::BrokerError;

#[async_trait]
pub trait Broker: Send + Sync + 'static {
    /// Subscribes `sink` to `settings.queue_name`.
    async fn subscribe(
        &self,
        settings: &ReceiveSettings,
        sink: DeliverySink,
    ) -> Result<ConsumerTag, BrokerError>;

    /// Cancels a subscription.
    async fn cancel(&self, tag: &ConsumerTag) -> Result<(), BrokerError>;

    /// Settles one delivery. Only called for [`AckMode::Manual`](crate::AckMode::Manual).
    async fn settle(
        &self,
        tag: &ConsumerTag,
        delivery_tag: u64,
        settlement: Settlement,
    ) -> Result<(), BrokerError> {
        let _ = (tag, delivery_tag, settlement);
        Ok(())
    }

    /// Human-readable name (for logs).
    fn name(&self) -> &str;
}

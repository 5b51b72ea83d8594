//! # Per-delivery receive context.
//!
//! A [`ReceiveContext`] is created by the consumer for every delivery, passed
//! by `&mut` through the receive pipe and dropped once the pipe returns.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use url::Url;

use super::{PayloadMap, PipeContext};
use crate::transport::{ConsumerTag, Delivery};

/// Context for one broker delivery.
///
/// Delivery metadata is immutable; filters communicate through [`PayloadMap`].
#[derive(Debug)]
pub struct ReceiveContext {
    delivery: Delivery,
    input_address: Arc<Url>,
    consumer_tag: ConsumerTag,
    received_at: Instant,
    cancellation: CancellationToken,
    payloads: PayloadMap,
}

impl ReceiveContext {
    /// Wraps a delivery received on `input_address`.
    pub fn new(
        delivery: Delivery,
        input_address: Arc<Url>,
        consumer_tag: ConsumerTag,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            delivery,
            input_address,
            consumer_tag,
            received_at: Instant::now(),
            cancellation,
            payloads: PayloadMap::new(),
        }
    }

    /// The raw delivery.
    pub fn delivery(&self) -> &Delivery {
        &self.delivery
    }

    /// Address of the endpoint that received the delivery.
    pub fn input_address(&self) -> &Url {
        &self.input_address
    }

    /// Tag of the subscription the delivery arrived on.
    pub fn consumer_tag(&self) -> &ConsumerTag {
        &self.consumer_tag
    }

    /// Time elapsed since the context was created.
    pub fn elapsed(&self) -> Duration {
        self.received_at.elapsed()
    }

    /// True if the broker flagged this delivery as a redelivery.
    pub fn redelivered(&self) -> bool {
        self.delivery.redelivered
    }
}

impl PipeContext for ReceiveContext {
    fn payloads(&self) -> &PayloadMap {
        &self.payloads
    }

    fn payloads_mut(&mut self) -> &mut PayloadMap {
        &mut self.payloads
    }

    fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}

//! # Delivery counters.
//!
//! [`DeliveryCounters`] are the only mutable state shared between concurrent
//! deliveries of one consumer. Updates are lock-free.
//!
//! The concurrent counter carries a `CLOSED` bit: once the consumer has
//! finished cancelling its subscription it closes the counters, after which
//! [`DeliveryCounters::try_begin`] refuses new deliveries. Closing and counting
//! are one atomic word, so a delivery either counts before the drain check
//! or is refused.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;
use tokio::sync::Notify;

use super::delivery::ConsumerTag;

const CLOSED: usize = 1 << (usize::BITS - 1);

/// Snapshot of a consumer's counters, read at completion time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryMetrics {
    pub consumer_tag: ConsumerTag,
    /// Deliveries dispatched into the pipe over the consumer's lifetime.
    pub delivery_count: u64,
    /// Deliveries inside the pipe at snapshot time.
    pub concurrent_delivery_count: usize,
    /// Peak of `concurrent_delivery_count`.
    pub max_concurrent_delivery_count: usize,
}

#[derive(Debug, Default)]
pub(crate) struct DeliveryCounters {
    deliveries: AtomicU64,
    concurrent: AtomicUsize,
    peak: AtomicUsize,
    idle: Notify,
}

/// Marks one delivery in flight; dropping it ends the delivery.
#[derive(Debug)]
pub(crate) struct InFlight {
    counters: Arc<DeliveryCounters>,
}

impl DeliveryCounters {
    /// Counts a new delivery, or returns `None` once the counters are closed.
    pub(crate) fn try_begin(self: &Arc<Self>) -> Option<InFlight> {
        let prev = self
            .concurrent
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                (v & CLOSED == 0).then_some(v + 1)
            })
            .ok()?;
        self.deliveries.fetch_add(1, Ordering::Relaxed);
        self.peak.fetch_max(prev + 1, Ordering::Relaxed);
        Some(InFlight {
            counters: Arc::clone(self),
        })
    }

    /// Uncounts a delivery admitted by [`DeliveryCounters::try_begin`] that
    /// never reached the pipe.
    pub(crate) fn refund(&self) {
        self.deliveries.fetch_sub(1, Ordering::Relaxed);
    }

    /// Refuses further deliveries. Returns `false` if already closed.
    pub(crate) fn close(&self) -> bool {
        self.concurrent.fetch_or(CLOSED, Ordering::AcqRel) & CLOSED == 0
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.concurrent.load(Ordering::Acquire) & CLOSED != 0
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.concurrent.load(Ordering::Acquire) & !CLOSED
    }

    pub(crate) fn delivery_count(&self) -> u64 {
        self.deliveries.load(Ordering::Relaxed)
    }

    /// Resolves once no delivery is in flight.
    pub(crate) async fn drained(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    pub(crate) fn snapshot(&self, consumer_tag: ConsumerTag) -> DeliveryMetrics {
        DeliveryMetrics {
            consumer_tag,
            delivery_count: self.delivery_count(),
            concurrent_delivery_count: self.in_flight(),
            max_concurrent_delivery_count: self.peak.load(Ordering::Relaxed),
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let prev = self.counters.concurrent.fetch_sub(1, Ordering::AcqRel);
        if prev & !CLOSED == 1 {
            self.counters.idle.notify_waiters();
        }
    }
}

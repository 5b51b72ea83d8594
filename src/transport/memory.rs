//! # In-memory broker.
//!
//! [`InMemoryBroker`] is an in-process [`Broker`] for tests and demos. Queues
//! are created on first use; messages published to a queue without a
//! subscriber are buffered and flushed on subscribe.
//!
//! It can also simulate broker behavior the runtime must tolerate:
//! - rejected subscriptions ([`InMemoryBroker::reject_subscriptions`])
//! - slow cancellation, during which deliveries keep flowing
//!   ([`InMemoryBroker::with_cancel_latency`])
//! - a lost connection ([`InMemoryBroker::sever`])
//!
//! ## Example
//! ```rust
//! use recvisor::memory::InMemoryBroker;
//!
//! let broker = InMemoryBroker::new();
//! broker.publish("orders", "hello");
//! assert_eq!(broker.backlog_len("orders"), 1);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use super::broker::Broker;
use super::consumer::DeliverySink;
use super::delivery::{ConsumerTag, Delivery, Settlement};
use super::settings::ReceiveSettings;
use crate::error::BrokerError;

#[derive(Default)]
struct Queue {
    subscriber: Option<(ConsumerTag, DeliverySink)>,
    backlog: VecDeque<Delivery>,
    reject: Option<String>,
}

#[derive(Default)]
struct State {
    queues: HashMap<String, Queue>,
    next_delivery_tag: u64,
    next_consumer: u64,
    settlements: Vec<(ConsumerTag, u64, Settlement)>,
}

impl State {
    fn queue_of(&self, tag: &ConsumerTag) -> Option<String> {
        self.queues
            .iter()
            .find(|(_, q)| q.subscriber.as_ref().is_some_and(|(t, _)| t == tag))
            .map(|(name, _)| name.clone())
    }
}

/// In-process broker. Clones share the same queues.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<State>>,
    cancel_latency: Duration,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays the acknowledgement of `cancel`; the subscriber stays attached meanwhile.
    #[must_use]
    pub fn with_cancel_latency(mut self, latency: Duration) -> Self {
        self.cancel_latency = latency;
        self
    }

    /// Publishes `body` to `queue`, returning its delivery tag.
    pub fn publish(&self, queue: &str, body: impl Into<Bytes>) -> u64 {
        let delivery_tag = self.next_delivery_tag();
        self.publish_delivery(queue, Delivery::new(delivery_tag, body));
        delivery_tag
    }

    /// Publishes a prepared delivery. Its delivery tag is used as is.
    pub fn publish_delivery(&self, queue: &str, delivery: Delivery) {
        let sink = {
            let mut state = self.state.lock();
            let q = state.queues.entry(queue.to_string()).or_default();
            match &q.subscriber {
                Some((_, sink)) => sink.clone(),
                None => {
                    q.backlog.push_back(delivery);
                    return;
                }
            }
        };
        if !sink.deliver(delivery.clone()) {
            self.state
                .lock()
                .queues
                .entry(queue.to_string())
                .or_default()
                .backlog
                .push_back(delivery);
        }
    }

    /// Makes every subscribe to `queue` fail with `reason`.
    pub fn reject_subscriptions(&self, queue: &str, reason: impl Into<String>) {
        self.state
            .lock()
            .queues
            .entry(queue.to_string())
            .or_default()
            .reject = Some(reason.into());
    }

    /// Drops the subscriber of `queue` as if the connection was lost.
    ///
    /// Returns `false` if nothing was subscribed.
    pub fn sever(&self, queue: &str, reason: &str) -> bool {
        let subscriber = self
            .state
            .lock()
            .queues
            .get_mut(queue)
            .and_then(|q| q.subscriber.take());
        match subscriber {
            Some((_, sink)) => {
                sink.fault(format!("connection lost: {reason}"));
                true
            }
            None => false,
        }
    }

    /// Settlements recorded so far, in order.
    pub fn settlements(&self) -> Vec<(ConsumerTag, u64, Settlement)> {
        self.state.lock().settlements.clone()
    }

    pub fn is_subscribed(&self, queue: &str) -> bool {
        self.state
            .lock()
            .queues
            .get(queue)
            .is_some_and(|q| q.subscriber.is_some())
    }

    /// Messages buffered for `queue` while it had no subscriber.
    pub fn backlog_len(&self, queue: &str) -> usize {
        self.state
            .lock()
            .queues
            .get(queue)
            .map_or(0, |q| q.backlog.len())
    }

    fn next_delivery_tag(&self) -> u64 {
        let mut state = self.state.lock();
        state.next_delivery_tag += 1;
        state.next_delivery_tag
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn subscribe(
        &self,
        settings: &ReceiveSettings,
        sink: DeliverySink,
    ) -> Result<ConsumerTag, BrokerError> {
        let (tag, backlog) = {
            let mut state = self.state.lock();
            state.next_consumer += 1;
            let tag = ConsumerTag::from(format!("ctag-{}", state.next_consumer));

            let q = state.queues.entry(settings.queue_name.clone()).or_default();
            if let Some(reason) = &q.reject {
                return Err(BrokerError::SubscribeRejected {
                    queue: settings.queue_name.clone(),
                    reason: reason.clone(),
                });
            }
            if q.subscriber.is_some() {
                return Err(BrokerError::SubscribeRejected {
                    queue: settings.queue_name.clone(),
                    reason: "queue already has an exclusive consumer".to_string(),
                });
            }
            q.subscriber = Some((tag.clone(), sink.clone()));
            (tag, std::mem::take(&mut q.backlog))
        };

        for delivery in backlog {
            sink.deliver(delivery);
        }
        Ok(tag)
    }

    async fn cancel(&self, tag: &ConsumerTag) -> Result<(), BrokerError> {
        if self.state.lock().queue_of(tag).is_none() {
            return Err(BrokerError::UnknownConsumer {
                tag: tag.to_string(),
            });
        }
        if !self.cancel_latency.is_zero() {
            tokio::time::sleep(self.cancel_latency).await;
        }

        let mut state = self.state.lock();
        if let Some(queue) = state.queue_of(tag) {
            if let Some(q) = state.queues.get_mut(&queue) {
                q.subscriber = None;
            }
        }
        Ok(())
    }

    async fn settle(
        &self,
        tag: &ConsumerTag,
        delivery_tag: u64,
        settlement: Settlement,
    ) -> Result<(), BrokerError> {
        self.state
            .lock()
            .settlements
            .push((tag.clone(), delivery_tag, settlement));
        Ok(())
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

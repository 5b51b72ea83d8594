//! # Broker consumer.
//!
//! A [`Consumer`] bridges a broker subscription into the receive pipe.
//!
//! ## Lifecycle
//! ```text
//! start()
//!   ├─► broker.subscribe(settings, sink)
//!   │     └─ Err ─► scope.close(Faulted) ─► Err(BrokerError)      (no Ready, no Completed)
//!   ├─► endpoint observers: ready(event)   (awaited)
//!   ├─► scope.set_ready(); release deliveries held before Ready
//!   └─► spawn lifecycle task
//!
//! sink.deliver(delivery)
//!   ├─► counters.try_begin()          (refused once counters are closed)
//!   └─► scope.spawn_on(process, runtime)   (refused spawn: uncounted, returns false)
//!         ├─► wait for Ready
//!         ├─► pre_receive ─► pipe.send(ctx) ─► settle ─► post_receive | receive_fault
//!         │     (Canceled is rejected with requeue; other faults without)
//!         └─► in-flight guard dropped (counter decremented)
//!
//! lifecycle task
//!   ├─► scope stopped ─► broker.cancel(tag)   (deliveries during cancel still count)
//!   │   or sink.fault(reason)                 (unsolicited; no cancel)
//!   ├─► counters.close(); counters.drained()
//!   ├─► endpoint observers: completed(event)  (exactly once, concurrent == 0)
//!   └─► scope.complete(outcome)
//! ```
//!
//! The lifecycle task is not tracked by the consumer's scope; it is the task
//! that completes it.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock, Weak};

use futures::FutureExt;
use tokio::runtime::Handle;
use url::Url;

use super::broker::Broker;
use super::delivery::{AckMode, ConsumerTag, Delivery, Settlement};
use super::host::HostSettings;
use super::metrics::{DeliveryCounters, DeliveryMetrics, InFlight};
use super::settings::ReceiveSettings;
use crate::context::{PipeContext, ReceiveContext};
use crate::endpoint::{ReceiveEndpointCompleted, ReceiveEndpointReady};
use crate::error::{BrokerError, PipeError};
use crate::observers::{ObserverSet, ReceiveEndpointObserver, ReceiveObserver, panic_info};
use crate::pipe::Pipe;
use crate::supervision::{Scope, ScopeOutcome, Signal};

/// Everything a consumer is bound to at construction.
pub(crate) struct ConsumerParts {
    pub input_address: Url,
    pub scope: Scope,
    pub broker: Arc<dyn Broker>,
    pub host: Arc<HostSettings>,
    pub settings: Arc<ReceiveSettings>,
    pub pipe: Pipe<ReceiveContext>,
    pub endpoint_observers: ObserverSet<dyn ReceiveEndpointObserver>,
    pub receive_observers: ObserverSet<dyn ReceiveObserver>,
}

struct ConsumerShared {
    input_address: Arc<Url>,
    scope: Scope,
    broker: Arc<dyn Broker>,
    host: Arc<HostSettings>,
    settings: Arc<ReceiveSettings>,
    pipe: Pipe<ReceiveContext>,
    endpoint_observers: ObserverSet<dyn ReceiveEndpointObserver>,
    receive_observers: ObserverSet<dyn ReceiveObserver>,
    counters: Arc<DeliveryCounters>,
    consumer_tag: OnceLock<ConsumerTag>,
    /// Runtime deliveries are spawned on; brokers may call back from their own threads.
    runtime: OnceLock<Handle>,
    /// `true` once Ready was emitted, `false` if the subscription failed.
    bound: Signal<bool>,
    fault: Signal<Arc<str>>,
    completion: Signal<ReceiveEndpointCompleted>,
}

/// Transport-bound consumer for one input address.
#[derive(Clone)]
pub(crate) struct Consumer {
    shared: Arc<ConsumerShared>,
}

/// Delivery callback handed to [`Broker::subscribe`].
///
/// Holds only a weak reference: a sink outliving its consumer refuses deliveries.
#[derive(Clone)]
pub struct DeliverySink {
    shared: Weak<ConsumerShared>,
}

impl DeliverySink {
    /// Dispatches one delivery into the receive pipe.
    ///
    /// Returns `false` if the consumer no longer accepts deliveries (its
    /// subscription has been cancelled and drained). The broker should then
    /// requeue the message.
    pub fn deliver(&self, delivery: Delivery) -> bool {
        match self.shared.upgrade() {
            Some(shared) => shared.dispatch(delivery),
            None => false,
        }
    }

    /// Reports an unsolicited cancel or a lost connection.
    ///
    /// The consumer drains in-flight deliveries and completes as faulted.
    pub fn fault(&self, reason: impl Into<Arc<str>>) {
        if let Some(shared) = self.shared.upgrade() {
            let reason = reason.into();
            if shared.fault.set(Arc::clone(&reason)) {
                tracing::warn!(
                    input_address = %shared.input_address,
                    %reason,
                    "consumer faulted by broker"
                );
            }
        }
    }

    /// True while the consumer still accepts deliveries.
    pub fn is_open(&self) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|shared| !shared.counters.is_closed())
    }
}

impl std::fmt::Debug for DeliverySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliverySink")
            .field("open", &self.is_open())
            .finish()
    }
}

impl Consumer {
    pub(crate) fn new(parts: ConsumerParts) -> Self {
        Self {
            shared: Arc::new(ConsumerShared {
                input_address: Arc::new(parts.input_address),
                scope: parts.scope,
                broker: parts.broker,
                host: parts.host,
                settings: parts.settings,
                pipe: parts.pipe,
                endpoint_observers: parts.endpoint_observers,
                receive_observers: parts.receive_observers,
                counters: Arc::new(DeliveryCounters::default()),
                consumer_tag: OnceLock::new(),
                runtime: OnceLock::new(),
                bound: Signal::new(),
                fault: Signal::new(),
                completion: Signal::new(),
            }),
        }
    }

    /// Subscribes and, on success, emits Ready and starts the lifecycle task.
    ///
    /// On failure the scope completes as faulted without ever becoming ready.
    pub(crate) async fn start(&self) -> Result<(), BrokerError> {
        let shared = &self.shared;
        let runtime = shared.runtime.get_or_init(Handle::current).clone();
        let sink = DeliverySink {
            shared: Arc::downgrade(shared),
        };

        let tag = match shared.broker.subscribe(&shared.settings, sink).await {
            Ok(tag) => tag,
            Err(e) => {
                shared.bound.set(false);
                shared.counters.close();
                shared.scope.close(ScopeOutcome::faulted(e.to_string()));
                tracing::debug!(
                    input_address = %shared.input_address,
                    broker = shared.broker.name(),
                    label = e.as_label(),
                    "subscribe failed"
                );
                return Err(e);
            }
        };
        let _ = shared.consumer_tag.set(tag.clone());
        tracing::debug!(
            input_address = %shared.input_address,
            consumer_tag = %tag,
            broker = shared.broker.name(),
            "consumer subscribed"
        );

        let ready = ReceiveEndpointReady {
            input_address: (*shared.input_address).clone(),
        };
        shared.endpoint_observers.ready(&ready).await;
        shared.scope.set_ready();
        shared.bound.set(true);

        runtime.spawn(Arc::clone(shared).run());
        Ok(())
    }

    /// Requests a stop; [`Consumer::completed`] resolves once drained.
    pub(crate) fn stop(&self) {
        self.shared.scope.stop();
    }

    /// Waits for the Completed event and the scope's completion.
    pub(crate) async fn completed(&self) -> ReceiveEndpointCompleted {
        let event = self.shared.completion.wait().await;
        self.shared.scope.completed().await;
        event
    }

    /// The Completed event, if already emitted.
    pub(crate) fn completion(&self) -> Option<&ReceiveEndpointCompleted> {
        self.shared.completion.get()
    }

    /// Live counters.
    pub(crate) fn metrics(&self) -> DeliveryMetrics {
        self.shared.counters.snapshot(self.consumer_tag())
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.shared.counters.in_flight()
    }

    pub(crate) fn input_address(&self) -> &Url {
        &self.shared.input_address
    }

    pub(crate) fn consumer_tag(&self) -> ConsumerTag {
        self.shared.consumer_tag()
    }

    pub(crate) fn scope(&self) -> &Scope {
        &self.shared.scope
    }
}

impl ConsumerShared {
    fn consumer_tag(&self) -> ConsumerTag {
        self.consumer_tag.get().cloned().unwrap_or_default()
    }

    fn dispatch(self: Arc<Self>, delivery: Delivery) -> bool {
        let Some(runtime) = self.runtime.get().cloned() else {
            return false;
        };
        let Some(in_flight) = self.counters.try_begin() else {
            tracing::debug!(
                input_address = %self.input_address,
                delivery_tag = delivery.delivery_tag,
                "delivery refused: consumer closed"
            );
            return false;
        };
        let delivery_tag = delivery.delivery_tag;
        let work = Arc::clone(&self).process(delivery, in_flight);
        match self.scope.spawn_on(work, &runtime) {
            Ok(_) => true,
            Err(e) => {
                self.counters.refund();
                tracing::debug!(
                    input_address = %self.input_address,
                    delivery_tag,
                    error = %e,
                    "delivery refused: scope closed"
                );
                false
            }
        }
    }

    async fn process(self: Arc<Self>, delivery: Delivery, in_flight: InFlight) {
        if !self.bound.wait().await {
            return;
        }

        let tag = self.consumer_tag();
        let mut ctx = ReceiveContext::new(
            delivery,
            Arc::clone(&self.input_address),
            tag.clone(),
            self.scope.stop_token(),
        );
        ctx.payloads_mut().insert(Arc::clone(&self.settings));
        ctx.payloads_mut().insert(Arc::clone(&self.host));

        self.receive_observers.pre_receive(&ctx).await;

        let result = match AssertUnwindSafe(self.pipe.send(&mut ctx)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(PipeError::Panicked {
                info: panic_info(&*panic),
            }),
        };

        let delivery_tag = ctx.delivery().delivery_tag;
        match result {
            Ok(()) => {
                self.settle(&tag, delivery_tag, Settlement::Ack).await;
                self.receive_observers.post_receive(&ctx).await;
            }
            Err(error) => {
                let requeue = matches!(error, PipeError::Canceled);
                self.settle(&tag, delivery_tag, Settlement::Reject { requeue })
                    .await;
                self.receive_observers.receive_fault(&ctx, &error).await;
            }
        }
        drop(in_flight);
    }

    async fn settle(&self, tag: &ConsumerTag, delivery_tag: u64, settlement: Settlement) {
        if self.settings.ack_mode != AckMode::Manual {
            return;
        }
        if let Err(e) = self.broker.settle(tag, delivery_tag, settlement).await {
            tracing::warn!(
                consumer_tag = %tag,
                delivery_tag,
                label = e.as_label(),
                error = %e,
                "settlement failed"
            );
        }
    }

    async fn run(self: Arc<Self>) {
        let tag = self.consumer_tag();

        let faulted = tokio::select! {
            biased;
            reason = self.fault.wait() => {
                self.scope.stop();
                Some(reason)
            }
            () = self.scope.stopped() => match self.broker.cancel(&tag).await {
                Ok(()) => None,
                Err(e) => {
                    tracing::warn!(consumer_tag = %tag, error = %e, "cancel failed");
                    Some(Arc::from(e.to_string()))
                }
            },
        };

        self.counters.close();
        self.counters.drained().await;

        let metrics = self.counters.snapshot(tag.clone());
        tracing::debug!(
            consumer_tag = %tag,
            received = metrics.delivery_count,
            concurrent = metrics.max_concurrent_delivery_count,
            "consumer drained"
        );

        let event = ReceiveEndpointCompleted {
            input_address: (*self.input_address).clone(),
            metrics,
            faulted,
        };
        self.endpoint_observers.completed(&event).await;

        let outcome = event.outcome();
        self.completion.set(event);
        self.scope.complete(outcome).await;
    }
}

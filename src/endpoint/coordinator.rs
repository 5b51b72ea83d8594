//! # Receive endpoint handle.
//!
//! A [`ReceiveEndpoint`] is returned by a successful
//! [`ReceiveEndpointBuilder::start`]. It owns the consumer and exposes its
//! lifecycle:
//!
//! ```text
//! Ready ──stop() / broker fault──► Stopping ──drained──► Completed | Faulted
//! ```
//!
//! `stop()` may be called any number of times; every call resolves to the
//! same Completed event.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use url::Url;

use super::builder::ReceiveEndpointBuilder;
use super::events::ReceiveEndpointCompleted;
use crate::context::ReceiveContext;
use crate::error::EndpointError;
use crate::labels::ComponentId;
use crate::pipe::{Pipe, ProbeScope};
use crate::supervision::Supervisor;
use crate::transport::{
    Broker, Consumer, ConsumerTag, DeliveryMetrics, HostSettings, ReceiveSettings,
};

/// Lifecycle state of a started endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    /// Subscribed and processing deliveries.
    Ready,
    /// A stop was requested (or the broker faulted); draining.
    Stopping,
    /// Drained after a requested stop.
    Completed,
    /// Drained after a broker fault.
    Faulted,
}

struct EndpointInner {
    consumer: Consumer,
    pipe: Pipe<ReceiveContext>,
    stop_timeout: Option<Duration>,
    stop_requested: AtomicBool,
}

/// Handle to a started receive endpoint. Clones share the same endpoint.
#[derive(Clone)]
pub struct ReceiveEndpoint {
    inner: Arc<EndpointInner>,
}

impl ReceiveEndpoint {
    /// Starts configuring an endpoint under `supervisor`.
    pub fn builder(
        supervisor: &Supervisor,
        broker: Arc<dyn Broker>,
        host: HostSettings,
        settings: ReceiveSettings,
    ) -> ReceiveEndpointBuilder {
        ReceiveEndpointBuilder::new(supervisor, broker, host, settings)
    }

    pub(crate) fn new(
        consumer: Consumer,
        pipe: Pipe<ReceiveContext>,
        stop_timeout: Option<Duration>,
    ) -> Self {
        Self {
            inner: Arc::new(EndpointInner {
                consumer,
                pipe,
                stop_timeout,
                stop_requested: AtomicBool::new(false),
            }),
        }
    }

    /// Stops the endpoint and waits for it to drain.
    ///
    /// Idempotent: every call resolves to the same Completed event, which
    /// observers receive once. Fails with [`EndpointError::StopTimeout`] if
    /// deliveries are still in flight when `Config::stop_timeout` expires;
    /// the drain itself continues.
    pub async fn stop(&self) -> Result<ReceiveEndpointCompleted, EndpointError> {
        let consumer = &self.inner.consumer;
        if !self.inner.stop_requested.swap(true, Ordering::AcqRel) {
            tracing::debug!(input_address = %consumer.input_address(), "endpoint stop requested");
        }
        consumer.stop();

        let Some(timeout) = self.inner.stop_timeout else {
            return Ok(consumer.completed().await);
        };
        match tokio::time::timeout(timeout, consumer.completed()).await {
            Ok(completed) => Ok(completed),
            Err(_) => {
                let in_flight = consumer.in_flight();
                tracing::warn!(
                    input_address = %consumer.input_address(),
                    ?timeout,
                    in_flight,
                    "endpoint stop timed out"
                );
                Err(EndpointError::StopTimeout {
                    input_address: consumer.input_address().to_string(),
                    timeout,
                    in_flight,
                })
            }
        }
    }

    /// Waits for completion without requesting a stop.
    pub async fn completed(&self) -> ReceiveEndpointCompleted {
        self.inner.consumer.completed().await
    }

    pub fn state(&self) -> EndpointState {
        let consumer = &self.inner.consumer;
        if consumer.scope().is_completed() {
            match consumer.completion() {
                Some(c) if c.is_faulted() => EndpointState::Faulted,
                _ => EndpointState::Completed,
            }
        } else if consumer.scope().is_stopping() {
            EndpointState::Stopping
        } else {
            EndpointState::Ready
        }
    }

    /// Live delivery counters.
    pub fn metrics(&self) -> DeliveryMetrics {
        self.inner.consumer.metrics()
    }

    /// Deliveries currently inside the pipe.
    pub fn in_flight(&self) -> usize {
        self.inner.consumer.in_flight()
    }

    pub fn input_address(&self) -> &Url {
        self.inner.consumer.input_address()
    }

    pub fn consumer_tag(&self) -> ConsumerTag {
        self.inner.consumer.consumer_tag()
    }

    /// Describes the endpoint and its receive pipe.
    pub fn probe(&self) -> ProbeScope {
        let consumer = &self.inner.consumer;
        let mut scope = ProbeScope::new(ComponentId::ReceiveEndpoint.display_name());
        scope
            .add("inputAddress", consumer.input_address().as_str())
            .add("consumerTag", consumer.consumer_tag().as_str())
            .add("state", format!("{:?}", self.state()));
        self.inner.pipe.probe_into(scope.create_scope("receivePipe"));
        scope
    }
}

impl std::fmt::Debug for ReceiveEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiveEndpoint")
            .field("input_address", &self.input_address().as_str())
            .field("state", &self.state())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

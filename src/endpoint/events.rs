//! # Receive endpoint lifecycle events.
//!
//! Emitted by the consumer and fanned out to every
//! [`ReceiveEndpointObserver`](crate::ReceiveEndpointObserver):
//!
//! ```text
//! start ─┬─ subscribe Ok  ─► Ready ─ ... ─ drain ─► Completed (exactly once)
//!        └─ subscribe Err ─► Faulted             (no Ready, no Completed)
//! ```

use std::sync::Arc;

use serde::Serialize;
use url::Url;

use crate::supervision::ScopeOutcome;
use crate::transport::DeliveryMetrics;

/// The endpoint's subscription is active; deliveries are about to be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiveEndpointReady {
    pub input_address: Url,
}

/// The endpoint has drained; no delivery is in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiveEndpointCompleted {
    pub input_address: Url,
    /// Final counters. `concurrent_delivery_count` is always zero.
    pub metrics: DeliveryMetrics,
    /// Fault reason when the broker ended the subscription (not a requested stop).
    pub faulted: Option<Arc<str>>,
}

impl ReceiveEndpointCompleted {
    /// True if the endpoint completed because of a broker fault.
    pub fn is_faulted(&self) -> bool {
        self.faulted.is_some()
    }

    /// Completion outcome in supervision terms.
    pub fn outcome(&self) -> ScopeOutcome {
        match &self.faulted {
            None => ScopeOutcome::Clean,
            Some(reason) => ScopeOutcome::Faulted(Arc::clone(reason)),
        }
    }
}

/// The endpoint failed to start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiveEndpointFaulted {
    pub input_address: Url,
    pub error: String,
}

/// Any endpoint lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReceiveEndpointEvent {
    Ready(ReceiveEndpointReady),
    Completed(ReceiveEndpointCompleted),
    Faulted(ReceiveEndpointFaulted),
}

impl ReceiveEndpointEvent {
    pub fn input_address(&self) -> &Url {
        match self {
            ReceiveEndpointEvent::Ready(e) => &e.input_address,
            ReceiveEndpointEvent::Completed(e) => &e.input_address,
            ReceiveEndpointEvent::Faulted(e) => &e.input_address,
        }
    }

    /// Short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ReceiveEndpointEvent::Ready(_) => "endpoint_ready",
            ReceiveEndpointEvent::Completed(_) => "endpoint_completed",
            ReceiveEndpointEvent::Faulted(_) => "endpoint_faulted",
        }
    }
}

impl From<ReceiveEndpointReady> for ReceiveEndpointEvent {
    fn from(e: ReceiveEndpointReady) -> Self {
        ReceiveEndpointEvent::Ready(e)
    }
}

impl From<ReceiveEndpointCompleted> for ReceiveEndpointEvent {
    fn from(e: ReceiveEndpointCompleted) -> Self {
        ReceiveEndpointEvent::Completed(e)
    }
}

impl From<ReceiveEndpointFaulted> for ReceiveEndpointEvent {
    fn from(e: ReceiveEndpointFaulted) -> Self {
        ReceiveEndpointEvent::Faulted(e)
    }
}

//! Error types used by the receive runtime.
//!
//! This module defines the error enums raised across the crate:
//!
//! - [`PipeError`] faults raised while a context traverses a pipe.
//! - [`ScopeError`] misuse of the supervision tree.
//! - [`BrokerError`] failures reported by the broker collaborator.
//! - [`AddressError`] host address / connection string parsing failures.
//! - [`EndpointError`] receive endpoint startup and shutdown failures.
//! - [`RuntimeError`] supervisor shutdown exceeding its grace period.
//!
//! All types provide `as_label` for logging/metrics.

use std::borrow::Cow;
use std::time::Duration;

use thiserror::Error;

use crate::supervision::ScopeOutcome;

/// # Errors produced while a context traverses a pipe.
///
/// A filter fault propagates up the call chain to the invoker of
/// [`Pipe::send`](crate::Pipe::send) unless an earlier filter converts it.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipeError {
    /// A filter reported a failure.
    #[error("filter '{filter}' faulted: {error}")]
    Fault {
        /// Name of the faulting filter.
        filter: Cow<'static, str>,
        /// The underlying error message.
        error: String,
    },

    /// Processing stopped because the context's cancellation signal fired.
    #[error("pipe canceled")]
    Canceled,

    /// A filter panicked; the panic was contained at the consumer boundary.
    #[error("filter panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl PipeError {
    /// Builds a [`PipeError::Fault`] from any displayable error.
    ///
    /// # Example
    /// ```
    /// use recvisor::PipeError;
    ///
    /// let err = PipeError::fault("deserialize", "unexpected end of input");
    /// assert_eq!(err.as_label(), "pipe_fault");
    /// assert_eq!(err.to_string(), "filter 'deserialize' faulted: unexpected end of input");
    /// ```
    pub fn fault(filter: impl Into<Cow<'static, str>>, error: impl std::fmt::Display) -> Self {
        PipeError::Fault {
            filter: filter.into(),
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            PipeError::Fault { .. } => "pipe_fault",
            PipeError::Canceled => "pipe_canceled",
            PipeError::Panicked { .. } => "pipe_panicked",
        }
    }
}

/// # Errors produced by the supervision tree.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// A child scope was requested from a parent that has already completed.
    #[error("scope '{parent}' has completed; no new work may attach")]
    ParentCompleted {
        /// Name of the completed parent.
        parent: String,
    },

    /// The scope completed without ever signaling readiness.
    #[error("scope '{scope}' completed before becoming ready ({outcome})")]
    CompletedBeforeReady {
        /// Name of the scope.
        scope: String,
        /// How the scope completed.
        outcome: ScopeOutcome,
    },
}

impl ScopeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ScopeError::ParentCompleted { .. } => "scope_parent_completed",
            ScopeError::CompletedBeforeReady { .. } => "scope_completed_before_ready",
        }
    }
}

/// # Errors reported by a [`Broker`](crate::Broker) implementation.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The broker refused the subscription request.
    #[error("subscription to '{queue}' rejected: {reason}")]
    SubscribeRejected {
        /// Queue the subscription targeted.
        queue: String,
        /// Broker supplied reason.
        reason: String,
    },

    /// The underlying connection or channel was lost.
    #[error("connection lost: {reason}")]
    ConnectionLost {
        /// Broker supplied reason.
        reason: String,
    },

    /// The consumer tag is not known to the broker.
    #[error("unknown consumer tag '{tag}'")]
    UnknownConsumer {
        /// The consumer tag.
        tag: String,
    },

    /// Acknowledging or rejecting a delivery failed.
    #[error("settlement failed: {reason}")]
    Settle {
        /// Broker supplied reason.
        reason: String,
    },
}

impl BrokerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            BrokerError::SubscribeRejected { .. } => "broker_subscribe_rejected",
            BrokerError::ConnectionLost { .. } => "broker_connection_lost",
            BrokerError::UnknownConsumer { .. } => "broker_unknown_consumer",
            BrokerError::Settle { .. } => "broker_settle_failed",
        }
    }
}

/// # Errors produced while resolving a host address.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// The input looks like a URI but is malformed.
    #[error("invalid host address '{input}': {reason}")]
    InvalidUri {
        /// The rejected input.
        input: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// The input is neither a URI nor a well formed connection string.
    #[error("invalid connection string: {reason}")]
    InvalidConnectionString {
        /// Parser diagnostic.
        reason: String,
    },

    /// The address parsed but carries no host.
    #[error("host address '{input}' has no host")]
    MissingHost {
        /// The rejected input.
        input: String,
    },
}

impl AddressError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            AddressError::InvalidUri { .. } => "address_invalid_uri",
            AddressError::InvalidConnectionString { .. } => "address_invalid_connection_string",
            AddressError::MissingHost { .. } => "address_missing_host",
        }
    }
}

/// # Errors surfaced by a [`ReceiveEndpoint`](crate::ReceiveEndpoint).
///
/// Only startup failures and an expired stop timeout surface here; per-delivery
/// faults are reported through [`ReceiveObserver`](crate::ReceiveObserver).
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum EndpointError {
    /// The broker subscription could not be established.
    #[error("endpoint {input_address} failed to bind: {source}")]
    Bind {
        /// Input address of the endpoint.
        input_address: String,
        /// The broker failure.
        #[source]
        source: BrokerError,
    },

    /// The input address could not be derived from host and queue.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// The endpoint scope could not be created or never became ready.
    #[error(transparent)]
    Scope(#[from] ScopeError),

    /// Deliveries were still in flight when the stop timeout expired.
    #[error("endpoint {input_address} did not drain within {timeout:?}; {in_flight} deliveries in flight")]
    StopTimeout {
        /// Input address of the endpoint.
        input_address: String,
        /// The configured stop timeout.
        timeout: Duration,
        /// Deliveries still inside the pipe at expiry.
        in_flight: usize,
    },
}

impl EndpointError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EndpointError::Bind { .. } => "endpoint_bind_failed",
            EndpointError::Address(e) => e.as_label(),
            EndpointError::Scope(e) => e.as_label(),
            EndpointError::StopTimeout { .. } => "endpoint_stop_timeout",
        }
    }
}

/// # Errors produced by the supervisor runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some scopes were still active.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of scopes that had not completed in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use recvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck scopes={stuck:?}")
            }
        }
    }
}

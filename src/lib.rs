//! # recvisor
//!
//! **Recvisor** is the receive-side runtime of a message bus. It accepts
//! deliveries from a broker subscription, routes each one through a
//! composable filter pipeline, and coordinates the ready/drain/complete
//! lifecycle of every receive endpoint.
//!
//! Transports plug in by implementing [`Broker`]; applications plug in by
//! building a [`Pipe`] of filters and registering observers.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   ┌────────────────────┐        ┌────────────────────┐
//!   │ Broker (transport) │        │ Broker (transport) │
//!   └─────────┬──────────┘        └─────────┬──────────┘
//!             │ DeliverySink::deliver       │
//!             ▼                             ▼
//!   ┌────────────────────┐        ┌────────────────────┐
//!   │ Consumer           │        │ Consumer           │
//!   │ - DeliveryCounters │        │ - DeliveryCounters │
//!   │ - ReceiveContext   │        │ - ReceiveContext   │
//!   └────┬──────────┬────┘        └────┬──────────┬────┘
//!        │          ▼                  │          ▼
//!        │   Pipe<ReceiveContext>      │   Pipe<ReceiveContext>
//!        │   filter ─► filter ─► ...   │   filter ─► filter ─► ...
//!        ▼                             ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │ Supervisor (root scope)                                 │
//! │  ├─ Scope "ConsumerFilter - <input address>"            │
//! │  │    └─ tracked in-flight deliveries                   │
//! │  └─ Scope "ConsumerFilter - <input address>"            │
//! └─────────────────────────────────────────────────────────┘
//!        │
//!        ▼
//!  ObserverSet ──► ReceiveEndpointObserver (ready / completed / faulted)
//!              └─► ReceiveObserver          (pre / post / fault per delivery)
//! ```
//!
//! ### Endpoint lifecycle
//! ```text
//! ReceiveEndpoint::builder(..).start()
//!   ├─► create scope under the supervisor
//!   ├─► broker.subscribe
//!   │     ├─ Err ─► scope completes faulted, observers.faulted, Err(Bind)
//!   │     └─ Ok  ─► observers.ready ─► scope Ready ─► deliveries flow
//!   │
//! ReceiveEndpoint::stop()                      (idempotent)
//!   ├─► broker.cancel              (deliveries during cancel are still processed)
//!   ├─► wait until no delivery is in flight
//!   ├─► observers.completed(metrics)           (exactly once)
//!   └─► scope Completed
//! ```
//!
//! ## Features
//! | Area            | Description                                              | Key types / traits                           |
//! |-----------------|----------------------------------------------------------|----------------------------------------------|
//! | **Pipes**       | Immutable filter chains with continuation-style filters. | [`Pipe`], [`PipeBuilder`], [`Filter`], [`Next`] |
//! | **Contexts**    | Per-delivery context with a type-keyed payload map.      | [`ReceiveContext`], [`PayloadMap`]           |
//! | **Supervision** | Scopes with one-shot Ready/Completed signals and drain.  | [`Supervisor`], [`Scope`], [`Signal`]        |
//! | **Transport**   | Broker seam, deliveries, settings and address parsing.   | [`Broker`], [`DeliverySink`], [`HostSettings`] |
//! | **Endpoints**   | Lifecycle coordination and metrics.                      | [`ReceiveEndpoint`], [`DeliveryMetrics`]     |
//! | **Observers**   | Lifecycle and per-delivery listeners.                    | [`ReceiveEndpointObserver`], [`ReceiveObserver`] |
//! | **Errors**      | Typed errors with stable labels.                         | [`PipeError`], [`EndpointError`]             |
//! | **Configuration** | Stop timeout, shutdown grace, default prefetch.        | [`Config`]                                   |
//!
//! ## Optional features
//! - `logging` (default): exports [`LogWriter`], an observer that writes via `tracing`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use recvisor::memory::InMemoryBroker;
//! use recvisor::{Config, HostSettings, Pipe, ReceiveContext, ReceiveEndpoint, ReceiveSettings, Supervisor};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let supervisor = Supervisor::new(Config::default());
//!     let broker = InMemoryBroker::new();
//!     broker.publish("orders", "hello");
//!
//!     let pipe = Pipe::<ReceiveContext>::builder()
//!         .inspect(|ctx: &ReceiveContext| println!("received {} bytes", ctx.delivery().body.len()))
//!         .build();
//!
//!     let endpoint = ReceiveEndpoint::builder(
//!         &supervisor,
//!         Arc::new(broker.clone()),
//!         HostSettings::parse("loopback://localhost/demo")?,
//!         ReceiveSettings::new("orders"),
//!     )
//!     .with_pipe(pipe)
//!     .start()
//!     .await?;
//!
//!     let completed = endpoint.stop().await?;
//!     assert_eq!(completed.metrics.delivery_count, 1);
//!     assert_eq!(completed.metrics.concurrent_delivery_count, 0);
//!
//!     supervisor.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod config;
mod context;
mod endpoint;
mod error;
mod labels;
mod observers;
mod pipe;
mod supervision;
mod transport;

// ---- Public re-exports ----

pub use config::Config;
pub use context::{PayloadMap, PipeContext, ReceiveContext};
pub use endpoint::{
    EndpointState, ReceiveEndpoint, ReceiveEndpointBuilder, ReceiveEndpointCompleted,
    ReceiveEndpointEvent, ReceiveEndpointFaulted, ReceiveEndpointReady,
};
pub use error::{AddressError, BrokerError, EndpointError, PipeError, RuntimeError, ScopeError};
pub use labels::ComponentId;
pub use observers::{ObserverSet, ReceiveEndpointObserver, ReceiveObserver};
pub use pipe::filters;
pub use pipe::{Filter, FilterRef, Next, Pipe, PipeBuilder, ProbeResult, ProbeScope};
pub use supervision::{Scope, ScopeOutcome, ScopeState, Signal, Supervisor};
pub use transport::memory;
pub use transport::{
    AckMode, Broker, ConsumerTag, Delivery, DeliveryMetrics, DeliverySink, HostSettings,
    ReceiveSettings, Settlement,
};

// Optional: expose the built-in tracing observer.
// Enable with: `--features logging` (on by default)
#[cfg(feature = "logging")]
pub use observers::LogWriter;

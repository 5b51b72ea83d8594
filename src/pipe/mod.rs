//! # Pipe/filter engine.
//!
//! A [`Pipe`] is an immutable, ordered chain of [`Filter`]s over one context
//! type. `Pipe::send(ctx)` invokes the first filter with a [`Next`]
//! continuation bound to the rest of the chain; each filter decides whether
//! to forward, short-circuit, or call `next` more than once.
//!
//! ```text
//! Pipe::send(ctx)
//!   └─► filter[0].send(ctx, next=[1..])
//!          └─► next.send(ctx) ─► filter[1].send(ctx, next=[2..])
//!                                  └─► ... ─► end of chain: Ok(())
//! ```
//!
//! ## Rules
//! - Filters are appended with [`PipeBuilder`] and sealed by [`PipeBuilder::build`];
//!   a built pipe has no mutation API.
//! - A pipe is stateless per invocation and shared read-only across concurrent sends.
//! - Faults propagate synchronously to the caller of `send`; the engine never retries.
//! - [`Pipe::probe`] describes the chain without touching any context.

mod builder;
mod filter;
pub mod filters;
mod probe;

pub use builder::{Pipe, PipeBuilder};
pub use filter::{Filter, FilterRef, Next};
pub use probe::{ProbeResult, ProbeScope};

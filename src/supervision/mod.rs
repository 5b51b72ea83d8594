//! # Supervisor/scope tree.
//!
//! Structured tracking of nested units of work so a stop request can wait for
//! a complete drain before the system is declared stopped.
//!
//! ```text
//! Supervisor (root scope, owned by the bus process)
//!   ├─► Scope "ConsumerFilter - rabbitmq://host/vhost/orders"
//!   │     ├─ tracked work: in-flight deliveries
//!   │     └─ child scopes ...
//!   └─► Scope "ConsumerFilter - rabbitmq://host/vhost/billing"
//! ```
//!
//! ## Rules
//! - Each scope owns two one-shot [`Signal`]s: *Ready* and *Completed*.
//! - `Created → Ready → Completed`, or `Created → Completed` on an early fault;
//!   Ready is never signaled retroactively.
//! - Stop propagates top-down and only stops acceptance of new work.
//! - A scope completes only after its tracked work and all children have completed.

mod scope;
mod signal;
mod supervisor;

pub use scope::{Scope, ScopeOutcome, ScopeState};
pub use signal::Signal;
pub use supervisor::Supervisor;

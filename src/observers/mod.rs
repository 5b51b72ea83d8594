//! # Observers: lifecycle and per-delivery listeners.
//!
//! Two extension points, both plain trait objects registered at construction:
//!
//! - [`ReceiveEndpointObserver`] endpoint lifecycle (`ready`, `completed`, `faulted`)
//! - [`ReceiveObserver`] per-delivery (`pre_receive`, `post_receive`, `receive_fault`)
//!
//! ```text
//! Consumer ──► ObserverSet::ready(&event)
//!                  ├──► observer 1 ─┐
//!                  ├──► observer 2 ─┼── joined; panics caught and logged
//!                  └──► observer N ─┘
//! ```
//!
//! Ordering across observers is unspecified. A panicking observer is logged
//! via `tracing` and does not affect the others or the endpoint.

#[cfg(feature = "logging")]
mod log;
mod observer;
mod set;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use observer::{ReceiveEndpointObserver, ReceiveObserver};
pub(crate) use set::panic_info;
pub use set::ObserverSet;

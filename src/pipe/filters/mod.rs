//! # Stock filters.
//!
//! - [`InspectFilter`] observes the context and forwards it
//! - [`MapFilter`] transforms the context and forwards it
//! - [`WhereFilter`] short-circuits when a predicate rejects the context
//! - [`TeeFilter`] sends the context through connected sub-pipes, then forwards
//! - [`HandlerFilter`] runs an async [`Handler`], then forwards

mod handler;
mod inspect;
mod map;
mod predicate;
mod tee;

pub use handler::{Handler, HandlerFilter};
pub use inspect::InspectFilter;
pub use map::MapFilter;
pub use predicate::WhereFilter;
pub use tee::TeeFilter;

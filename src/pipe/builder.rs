//! # Pipe construction.
//!
//! [`PipeBuilder`] appends filters in registration order; [`PipeBuilder::build`]
//! seals them into an immutable [`Pipe`].
//!
//! ## Example
//! ```rust
//! use recvisor::{Pipe, PipeError};
//!
//! # tokio_test::block_on(async {
//! let pipe: Pipe<Vec<&'static str>> = Pipe::builder()
//!     .map(|ctx: &mut Vec<&'static str>| { ctx.push("first"); Ok(()) })
//!     .map(|ctx: &mut Vec<&'static str>| { ctx.push("second"); Ok(()) })
//!     .build();
//!
//! let mut ctx = Vec::new();
//! pipe.send(&mut ctx).await?;
//! assert_eq!(ctx, ["first", "second"]);
//! # Ok::<(), PipeError>(())
//! # });
//! ```

use std::fmt;
use std::sync::Arc;

use super::filter::{Filter, FilterRef, Next};
use super::filters::{HandlerFilter, InspectFilter, MapFilter, TeeFilter, WhereFilter};
use super::probe::{ProbeResult, ProbeScope};
use crate::error::PipeError;
use crate::pipe::filters::Handler;

/// Immutable, ordered chain of filters over `C`.
///
/// Cloning is cheap: clones share the same sealed chain.
pub struct Pipe<C> {
    filters: Arc<[FilterRef<C>]>,
}

impl<C> Clone for Pipe<C> {
    fn clone(&self) -> Self {
        Self {
            filters: Arc::clone(&self.filters),
        }
    }
}

impl<C> fmt::Debug for Pipe<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipe")
            .field("filters", &self.filters.len())
            .finish()
    }
}

impl<C: Send + 'static> Pipe<C> {
    /// Starts building a pipe.
    #[must_use]
    pub fn builder() -> PipeBuilder<C> {
        PipeBuilder::new()
    }

    /// A pipe with no filters; every send completes immediately.
    #[must_use]
    pub fn empty() -> Self {
        PipeBuilder::new().build()
    }

    /// Sends `ctx` through the chain.
    ///
    /// Returns the first fault that no filter converted.
    pub async fn send(&self, ctx: &mut C) -> Result<(), PipeError> {
        Next::new(&self.filters).send(ctx).await
    }

    /// Describes every filter of the chain in order.
    pub fn probe(&self) -> ProbeResult {
        let mut result = ProbeResult::default();
        for filter in self.filters.iter() {
            result.filters.push(probe_filter(filter.as_ref()));
        }
        result
    }

    /// Appends one probe scope per filter under `scope`.
    pub fn probe_into(&self, scope: &mut ProbeScope) {
        for filter in self.filters.iter() {
            scope.children.push(probe_filter(filter.as_ref()));
        }
    }

    /// Number of filters in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// True if the chain has no filters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

fn probe_filter<C: Send + 'static>(filter: &dyn Filter<C>) -> ProbeScope {
    let mut scope = ProbeScope::new(filter.name());
    filter.probe(&mut scope);
    scope
}

/// Ordered builder for [`Pipe`].
pub struct PipeBuilder<C> {
    filters: Vec<FilterRef<C>>,
}

impl<C: Send + 'static> Default for PipeBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Send + 'static> PipeBuilder<C> {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    /// Appends a filter.
    #[must_use]
    pub fn filter<F: Filter<C>>(mut self, filter: F) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    /// Appends an already shared filter.
    #[must_use]
    pub fn filter_ref(mut self, filter: FilterRef<C>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Appends an [`InspectFilter`] that observes the context and forwards it.
    #[must_use]
    pub fn inspect<F>(self, f: F) -> Self
    where
        F: Fn(&C) + Send + Sync + 'static,
    {
        self.filter(InspectFilter::new(f))
    }

    /// Appends a [`MapFilter`] that transforms the context before forwarding.
    #[must_use]
    pub fn map<F>(self, f: F) -> Self
    where
        F: Fn(&mut C) -> Result<(), PipeError> + Send + Sync + 'static,
    {
        self.filter(MapFilter::new(f))
    }

    /// Appends a [`WhereFilter`] that stops processing when `predicate` is false.
    #[must_use]
    pub fn when<P>(self, predicate: P) -> Self
    where
        P: Fn(&C) -> bool + Send + Sync + 'static,
    {
        self.filter(WhereFilter::new(predicate))
    }

    /// Appends a [`TeeFilter`] that sends the context to each pipe before forwarding.
    #[must_use]
    pub fn tee(self, pipes: Vec<Pipe<C>>) -> Self {
        self.filter(TeeFilter::new(pipes))
    }

    /// Appends a [`HandlerFilter`].
    #[must_use]
    pub fn handler<H: Handler<C>>(self, handler: H) -> Self {
        self.filter(HandlerFilter::new(handler))
    }

    /// Number of filters registered so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// True if no filters are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Seals the chain.
    #[must_use]
    pub fn build(self) -> Pipe<C> {
        Pipe {
            filters: self.filters.into(),
        }
    }
}

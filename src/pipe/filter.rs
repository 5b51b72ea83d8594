//! # Filter contract and continuation.
//!
//! A [`Filter`] receives the context by mutable reference plus a [`Next`]
//! continuation. The continuation is `Copy`: calling it twice fans the same
//! context out twice, not calling it terminates processing for this context.

use std::sync::Arc;

use async_trait::async_trait;

use super::probe::ProbeScope;
use crate::error::PipeError;

/// Shared handle to a filter.
pub type FilterRef<C> = Arc<dyn Filter<C>>;

/// # One processing stage of a pipe.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use recvisor::{Filter, Next, PipeError};
///
/// struct Uppercase;
///
/// #[async_trait]
/// impl Filter<String> for Uppercase {
///     async fn send(&self, ctx: &mut String, next: Next<'_, String>) -> Result<(), PipeError> {
///         *ctx = ctx.to_uppercase();
///         next.send(ctx).await
///     }
///
///     fn name(&self) -> &str { "uppercase" }
/// }
/// ```
#[async_trait]
pub trait Filter<C: Send + 'static>: Send + Sync + 'static {
    /// Processes `ctx`, optionally forwarding it to `next`.
    async fn send(&self, ctx: &mut C, next: Next<'_, C>) -> Result<(), PipeError>;

    /// Stable diagnostic name.
    fn name(&self) -> &str;

    /// Describes this filter for diagnostics. Must not affect processing.
    fn probe(&self, scope: &mut ProbeScope) {
        let _ = scope;
    }
}

/// Continuation over the remaining filters of a pipe.
pub struct Next<'a, C> {
    rest: &'a [FilterRef<C>],
}

impl<C> Clone for Next<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Next<'_, C> {}

impl<'a, C: Send + 'static> Next<'a, C> {
    pub(crate) fn new(rest: &'a [FilterRef<C>]) -> Self {
        Self { rest }
    }

    /// Sends `ctx` through the remaining filters.
    ///
    /// Reaching the end of the chain completes successfully.
    pub async fn send(self, ctx: &mut C) -> Result<(), PipeError> {
        match self.rest.split_first() {
            Some((filter, rest)) => filter.send(ctx, Next { rest }).await,
            None => Ok(()),
        }
    }

    /// True if no filters remain.
    pub fn is_end(&self) -> bool {
        self.rest.is_empty()
    }

    /// Number of filters remaining.
    pub fn remaining(&self) -> usize {
        self.rest.len()
    }
}

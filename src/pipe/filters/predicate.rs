use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::error::PipeError;
use crate::labels::ComponentId;
use crate::pipe::{Filter, Next, ProbeScope};

/// Forwards only contexts accepted by the predicate.
///
/// Rejected contexts complete successfully without reaching the rest of the chain.
pub struct WhereFilter<P> {
    predicate: P,
    rejected: AtomicU64,
}

impl<P> WhereFilter<P> {
    pub fn new(predicate: P) -> Self {
        Self {
            predicate,
            rejected: AtomicU64::new(0),
        }
    }

    /// Number of contexts rejected so far.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<C, P> Filter<C> for WhereFilter<P>
where
    C: Send + 'static,
    P: Fn(&C) -> bool + Send + Sync + 'static,
{
    async fn send(&self, ctx: &mut C, next: Next<'_, C>) -> Result<(), PipeError> {
        if !(self.predicate)(ctx) {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }
        next.send(ctx).await
    }

    fn name(&self) -> &str {
        ComponentId::WhereFilter.display_name()
    }

    fn probe(&self, scope: &mut ProbeScope) {
        scope.add("rejected", self.rejected());
    }
}

use async_trait::async_trait;

use crate::error::PipeError;
use crate::labels::ComponentId;
use crate::pipe::{Filter, Next};

/// Calls a closure with a shared view of the context, then forwards it.
pub struct InspectFilter<F> {
    f: F,
}

impl<F> InspectFilter<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<C, F> Filter<C> for InspectFilter<F>
where
    C: Send + 'static,
    F: Fn(&C) + Send + Sync + 'static,
{
    async fn send(&self, ctx: &mut C, next: Next<'_, C>) -> Result<(), PipeError> {
        (self.f)(ctx);
        next.send(ctx).await
    }

    fn name(&self) -> &str {
        ComponentId::InspectFilter.display_name()
    }
}

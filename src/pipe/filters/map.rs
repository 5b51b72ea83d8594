use async_trait::async_trait;

use crate::error::PipeError;
use crate::labels::ComponentId;
use crate::pipe::{Filter, Next};

/// Transforms the context in place; an `Err` stops the chain.
pub struct MapFilter<F> {
    f: F,
}

impl<F> MapFilter<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<C, F> Filter<C> for MapFilter<F>
where
    C: Send + 'static,
    F: Fn(&mut C) -> Result<(), PipeError> + Send + Sync + 'static,
{
    async fn send(&self, ctx: &mut C, next: Next<'_, C>) -> Result<(), PipeError> {
        (self.f)(ctx)?;
        next.send(ctx).await
    }

    fn name(&self) -> &str {
        ComponentId::MapFilter.display_name()
    }
}

use async_trait::async_trait;

use crate::error::PipeError;
use crate::labels::ComponentId;
use crate::pipe::{Filter, Next};

/// # Application handler at the end of (or inside) a pipe.
///
/// A handler is a filter that does not see the continuation; wrapping it in
/// [`HandlerFilter`] forwards the context after `handle` succeeds.
#[async_trait]
pub trait Handler<C: Send + 'static>: Send + Sync + 'static {
    /// Handles one context.
    async fn handle(&self, ctx: &mut C) -> Result<(), PipeError>;
}

/// Runs a [`Handler`], then forwards the context.
pub struct HandlerFilter<H> {
    handler: H,
}

impl<H> HandlerFilter<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<C, H> Filter<C> for HandlerFilter<H>
where
    C: Send + 'static,
    H: Handler<C>,
{
    async fn send(&self, ctx: &mut C, next: Next<'_, C>) -> Result<(), PipeError> {
        self.handler.handle(ctx).await?;
        next.send(ctx).await
    }

    fn name(&self) -> &str {
        ComponentId::HandlerFilter.display_name()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::pipe::Pipe;

    struct SlowDouble;

    #[async_trait]
    impl Handler<u64> for SlowDouble {
        async fn handle(&self, ctx: &mut u64) -> Result<(), PipeError> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            *ctx *= 2;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_handler_then_next() {
        let pipe = Pipe::builder()
            .handler(SlowDouble)
            .when(|ctx: &u64| *ctx > 10)
            .handler(SlowDouble)
            .build();

        let mut small = 2;
        pipe.send(&mut small).await.unwrap();
        assert_eq!(small, 4);

        let mut large = 6;
        pipe.send(&mut large).await.unwrap();
        assert_eq!(large, 24);

        assert_eq!(
            pipe.probe().find("where").and_then(|s| s.get("rejected")),
            Some(&serde_json::json!(1))
        );
    }
}

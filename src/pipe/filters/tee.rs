use async_trait::async_trait;

use crate::error::PipeError;
use crate::labels::ComponentId;
use crate::pipe::{Filter, Next, Pipe, ProbeScope};

/// Sends the context through each connected pipe in order, then forwards it.
///
/// The first fault from a connected pipe stops the fan-out and propagates.
pub struct TeeFilter<C> {
    pipes: Vec<Pipe<C>>,
}

impl<C> TeeFilter<C> {
    pub fn new(pipes: Vec<Pipe<C>>) -> Self {
        Self { pipes }
    }
}

#[async_trait]
impl<C: Send + 'static> Filter<C> for TeeFilter<C> {
    async fn send(&self, ctx: &mut C, next: Next<'_, C>) -> Result<(), PipeError> {
        for pipe in &self.pipes {
            pipe.send(ctx).await?;
        }
        next.send(ctx).await
    }

    fn name(&self) -> &str {
        ComponentId::TeeFilter.display_name()
    }

    fn probe(&self, scope: &mut ProbeScope) {
        scope.add("pipes", self.pipes.len());
        for pipe in &self.pipes {
            pipe.probe_into(scope.create_scope("pipe"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_each_connected_pipe_sees_the_context_before_next() {
        let left = Pipe::builder()
            .map(|ctx: &mut Vec<&'static str>| {
                ctx.push("left");
                Ok(())
            })
            .build();
        let right = Pipe::builder()
            .map(|ctx: &mut Vec<&'static str>| {
                ctx.push("right");
                Ok(())
            })
            .build();

        let pipe = Pipe::builder()
            .tee(vec![left, right])
            .map(|ctx: &mut Vec<&'static str>| {
                ctx.push("main");
                Ok(())
            })
            .build();

        let mut ctx = Vec::new();
        pipe.send(&mut ctx).await.unwrap();
        assert_eq!(ctx, ["left", "right", "main"]);

        let probe = pipe.probe();
        let tee = probe.find("tee").unwrap();
        assert_eq!(tee.children.len(), 2);
        assert_eq!(tee.children[0].children[0].name, "map");
    }

    #[tokio::test]
    async fn test_connected_fault_propagates() {
        let broken = Pipe::builder()
            .map(|_: &mut Vec<&'static str>| Err(PipeError::fault("broken", "nope")))
            .build();
        let pipe = Pipe::builder()
            .tee(vec![broken])
            .map(|ctx: &mut Vec<&'static str>| {
                ctx.push("main");
                Ok(())
            })
            .build();

        let mut ctx = Vec::new();
        assert!(pipe.send(&mut ctx).await.is_err());
        assert!(ctx.is_empty());
    }
}

use async_trait::async_trait;

use crate::context::ReceiveContext;
use crate::endpoint::{ReceiveEndpointCompleted, ReceiveEndpointFaulted, ReceiveEndpointReady};
use crate::error::PipeError;

/// Listener for endpoint lifecycle events.
///
/// Event methods default to no-ops; implement the ones you need. `name` is required.
///
/// # Example
/// ```rust
/// use async_trait::async_trait;
/// use recvisor::{ReceiveEndpointCompleted, ReceiveEndpointObserver};
///
/// struct Audit;
///
/// #[async_trait]
/// impl ReceiveEndpointObserver for Audit {
///     async fn completed(&self, event: &ReceiveEndpointCompleted) {
///         println!("{} drained after {} deliveries", event.input_address, event.metrics.delivery_count);
///     }
///
///     fn name(&self) -> &str { "audit" }
/// }
/// ```
#[async_trait]
pub trait ReceiveEndpointObserver: Send + Sync + 'static {
    /// The subscription is active. Awaited before any delivery is processed.
    async fn ready(&self, event: &ReceiveEndpointReady) {
        let _ = event;
    }

    /// The endpoint drained and completed. Emitted exactly once.
    async fn completed(&self, event: &ReceiveEndpointCompleted) {
        let _ = event;
    }

    /// The endpoint failed to start.
    async fn faulted(&self, event: &ReceiveEndpointFaulted) {
        let _ = event;
    }

    /// Short fixed name used in logs.
    fn name(&self) -> &str;
}

/// Listener for individual deliveries.
#[async_trait]
pub trait ReceiveObserver: Send + Sync + 'static {
    /// Called before the delivery enters the receive pipe.
    async fn pre_receive(&self, ctx: &ReceiveContext) {
        let _ = ctx;
    }

    /// Called after the receive pipe returned successfully.
    async fn post_receive(&self, ctx: &ReceiveContext) {
        let _ = ctx;
    }

    /// Called exactly once for a delivery whose pipe faulted.
    async fn receive_fault(&self, ctx: &ReceiveContext, error: &PipeError) {
        let _ = (ctx, error);
    }

    /// Short fixed name used in logs.
    fn name(&self) -> &str;
}

//! # Logging observer.
//!
//! [`LogWriter`] writes endpoint lifecycle and delivery faults as `tracing`
//! events. Register it like any other observer:
//!
//! ```text
//! INFO  endpoint ready         input_address=rabbitmq://localhost/orders
//! WARN  receive fault          input_address=... delivery_tag=7 label=pipe_fault error="..."
//! INFO  endpoint completed     input_address=... deliveries=3 peak=2
//! WARN  endpoint completed     input_address=... faulted="connection lost: ..."
//! ERROR endpoint faulted       input_address=... error="..."
//! ```

use async_trait::async_trait;

use super::observer::{ReceiveEndpointObserver, ReceiveObserver};
use crate::context::ReceiveContext;
use crate::endpoint::{ReceiveEndpointCompleted, ReceiveEndpointFaulted, ReceiveEndpointReady};
use crate::error::PipeError;

/// Observer that logs via `tracing`. Enabled via the `logging` feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogWriter;

#[async_trait]
impl ReceiveEndpointObserver for LogWriter {
    async fn ready(&self, e: &ReceiveEndpointReady) {
        tracing::info!(input_address = %e.input_address, "endpoint ready");
    }

    async fn completed(&self, e: &ReceiveEndpointCompleted) {
        match &e.faulted {
            None => tracing::info!(
                input_address = %e.input_address,
                consumer_tag = %e.metrics.consumer_tag,
                deliveries = e.metrics.delivery_count,
                peak = e.metrics.max_concurrent_delivery_count,
                "endpoint completed"
            ),
            Some(reason) => tracing::warn!(
                input_address = %e.input_address,
                consumer_tag = %e.metrics.consumer_tag,
                deliveries = e.metrics.delivery_count,
                faulted = %reason,
                "endpoint completed"
            ),
        }
    }

    async fn faulted(&self, e: &ReceiveEndpointFaulted) {
        tracing::error!(input_address = %e.input_address, error = %e.error, "endpoint faulted");
    }

    fn name(&self) -> &str {
        "log-writer"
    }
}

#[async_trait]
impl ReceiveObserver for LogWriter {
    async fn receive_fault(&self, ctx: &ReceiveContext, error: &PipeError) {
        tracing::warn!(
            input_address = %ctx.input_address(),
            delivery_tag = ctx.delivery().delivery_tag,
            label = error.as_label(),
            %error,
            "receive fault"
        );
    }

    fn name(&self) -> &str {
        "log-writer"
    }
}

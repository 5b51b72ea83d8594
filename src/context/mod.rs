//! # Contexts flowing through pipes.
//!
//! - [`PipeContext`] the capability every pipe context exposes (payloads, cancellation)
//! - [`PayloadMap`] type-keyed bag of ambient values
//! - [`ReceiveContext`] the context built for each broker delivery

mod payload;
mod receive;

pub use payload::PayloadMap;
pub use receive::ReceiveContext;

use tokio_util::sync::CancellationToken;

use crate::error::PipeError;

/// Ambient capabilities shared by all contexts that traverse a [`Pipe`](crate::Pipe).
///
/// Filters that need ambient values (settings, connection info) or
/// cooperative cancellation bound their context type on this trait.
pub trait PipeContext: Send + 'static {
    /// Type-keyed payloads attached to this context.
    fn payloads(&self) -> &PayloadMap;

    /// Mutable access to the payloads.
    fn payloads_mut(&mut self) -> &mut PayloadMap;

    /// Signal that fires when the owner stops accepting new work.
    fn cancellation(&self) -> &CancellationToken;

    /// Fails with [`PipeError::Canceled`] once the cancellation signal has fired.
    ///
    /// The runtime never aborts a delivery in flight; filters about to start
    /// long work may opt out early with this check.
    fn check_canceled(&self) -> Result<(), PipeError> {
        if self.cancellation().is_cancelled() {
            Err(PipeError::Canceled)
        } else {
            Ok(())
        }
    }
}

//! # Global runtime configuration.
//!
//! Provides [`Config`], the centralized settings shared by the supervisor and
//! every receive endpoint it hosts.
//!
//! Config is used in three ways:
//! 1. **Supervisor creation**: `Supervisor::new(config)`
//! 2. **Endpoint shutdown**: `ReceiveEndpoint::stop` waits at most [`Config::stop_timeout`]
//! 3. **Receive defaults**: `ReceiveSettings::with_defaults(queue, &config)`
//!
//! ## Sentinel values
//! - `grace = 0s` → supervisor shutdown does not wait for drain
//! - `stop_timeout = 0s` → endpoint stop waits for drain without a deadline

use std::time::Duration;

/// Global configuration for the receive runtime.
///
/// ## Field semantics
/// - `grace`: Maximum wait for all scopes to complete on supervisor shutdown
/// - `stop_timeout`: Maximum wait for one endpoint to drain on stop (`0s` = unbounded)
/// - `prefetch_count`: Default broker credit for new receive settings (min 1)
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time the supervisor waits for its scopes to complete.
    ///
    /// When exceeded, `Supervisor::shutdown` returns `RuntimeError::GraceExceeded`
    /// listing the scopes that were still active.
    pub grace: Duration,

    /// Maximum time an endpoint stop waits for in-flight deliveries.
    ///
    /// Expiry is escalated as `EndpointError::StopTimeout`; in-flight deliveries
    /// are never aborted.
    pub stop_timeout: Duration,

    /// Default number of unacknowledged deliveries the broker may push.
    pub prefetch_count: u16,
}

impl Config {
    /// Returns the endpoint stop timeout as an `Option`.
    ///
    /// - `None` → wait for drain indefinitely
    /// - `Some(d)` → escalate after `d`
    #[inline]
    pub fn stop_timeout(&self) -> Option<Duration> {
        if self.stop_timeout == Duration::ZERO {
            None
        } else {
            Some(self.stop_timeout)
        }
    }

    /// Returns the prefetch count clamped to a minimum of 1.
    #[inline]
    pub fn prefetch_count_clamped(&self) -> u16 {
        self.prefetch_count.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `grace = 60s`
    /// - `stop_timeout = 30s`
    /// - `prefetch_count = 16`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(60),
            stop_timeout: Duration::from_secs(30),
            prefetch_count: 16,
        }
    }
}

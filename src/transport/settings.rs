//! # Receive settings.
//!
//! [`ReceiveSettings`] is produced by the configuration layer and consumed
//! only by [`Broker::subscribe`](crate::Broker::subscribe); the runtime reads
//! nothing but the queue name (for the input address) and the ack mode.

use std::time::Duration;

use url::Url;
use uuid::Uuid;

use super::delivery::AckMode;
use super::host::HostSettings;
use crate::config::Config;
use crate::error::AddressError;

/// Idle period after which a temporary queue is deleted.
const TEMPORARY_IDLE: Duration = Duration::from_secs(5 * 60);

/// Subscription settings for one receive endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveSettings {
    /// Queue (or subscription) to consume from.
    pub queue_name: String,
    /// Acknowledgement mode.
    pub ack_mode: AckMode,
    /// Broker credit: maximum unacknowledged deliveries in flight.
    pub prefetch_count: u16,
    /// Queue survives broker restarts.
    pub durable: bool,
    /// Only this consumer may consume from the queue.
    pub exclusive: bool,
    /// Queue is deleted once its last consumer leaves.
    pub auto_delete: bool,
    /// Queue is deleted after this long without consumers.
    pub auto_delete_on_idle: Option<Duration>,
}

impl ReceiveSettings {
    /// Durable, manually acknowledged settings for `queue_name`.
    pub fn new(queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            ack_mode: AckMode::Manual,
            prefetch_count: Config::default().prefetch_count,
            durable: true,
            exclusive: false,
            auto_delete: false,
            auto_delete_on_idle: None,
        }
    }

    /// Like [`ReceiveSettings::new`] with the prefetch count taken from `cfg`.
    pub fn with_defaults(queue_name: impl Into<String>, cfg: &Config) -> Self {
        Self {
            prefetch_count: cfg.prefetch_count_clamped(),
            ..Self::new(queue_name)
        }
    }

    /// Uniquely named, non-durable, auto-deleting queue for a bus instance.
    pub fn temporary(prefix: &str, cfg: &Config) -> Self {
        let name = format!("{prefix}-{}", Uuid::new_v4().simple());
        Self {
            durable: false,
            auto_delete: true,
            auto_delete_on_idle: Some(TEMPORARY_IDLE),
            ..Self::with_defaults(name, cfg)
        }
    }

    #[must_use]
    pub fn with_ack_mode(mut self, mode: AckMode) -> Self {
        self.ack_mode = mode;
        self
    }

    #[must_use]
    pub fn with_prefetch(mut self, prefetch_count: u16) -> Self {
        self.prefetch_count = prefetch_count.max(1);
        self
    }

    #[must_use]
    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    /// Input address of this queue on `host`.
    pub fn input_address(&self, host: &HostSettings) -> Result<Url, AddressError> {
        host.queue_address(&self.queue_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporary_queues_are_unique_and_auto_delete() {
        let cfg = Config::default();
        let a = ReceiveSettings::temporary("endpoint", &cfg);
        let b = ReceiveSettings::temporary("endpoint", &cfg);

        assert_ne!(a.queue_name, b.queue_name);
        assert!(a.queue_name.starts_with("endpoint-"));
        assert!(a.auto_delete);
        assert!(!a.durable);
        assert_eq!(a.auto_delete_on_idle, Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_input_address() {
        let host = HostSettings::parse("rabbitmq://broker/prod").unwrap();
        let settings = ReceiveSettings::new("orders");
        assert_eq!(
            settings.input_address(&host).unwrap().as_str(),
            "rabbitmq://broker/prod/orders"
        );
    }
}

//! # Raw deliveries and subscription identifiers.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;

/// Broker-assigned identifier of a subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ConsumerTag(Arc<str>);

impl ConsumerTag {
    pub fn new(tag: impl Into<Arc<str>>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConsumerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConsumerTag {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ConsumerTag {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Acknowledgement mode requested on subscribe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AckMode {
    /// The broker considers a delivery settled once pushed.
    Auto,
    /// The consumer settles each delivery after its pipe returns.
    #[default]
    Manual,
}

/// How a delivery is settled with the broker in [`AckMode::Manual`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// The pipe completed successfully.
    Ack,
    /// The pipe faulted.
    Reject {
        /// Whether the broker should requeue the message.
        requeue: bool,
    },
}

/// One message pushed by the broker, with its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Broker sequence number used for settlement.
    pub delivery_tag: u64,
    /// True if the broker delivered this message before.
    pub redelivered: bool,
    /// Exchange or topic the message was published to.
    pub exchange: String,
    /// Routing key or subject.
    pub routing_key: String,
    /// Transport headers.
    pub headers: BTreeMap<String, String>,
    /// MIME type of the body, if declared.
    pub content_type: Option<String>,
    /// Message identifier, if declared.
    pub message_id: Option<String>,
    /// Raw body. Never decoded by the runtime.
    pub body: Bytes,
}

impl Delivery {
    /// Creates a delivery with empty metadata.
    pub fn new(delivery_tag: u64, body: impl Into<Bytes>) -> Self {
        Self {
            delivery_tag,
            redelivered: false,
            exchange: String::new(),
            routing_key: String::new(),
            headers: BTreeMap::new(),
            content_type: None,
            message_id: None,
            body: body.into(),
        }
    }

    #[inline]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    #[inline]
    pub fn with_routing_key(mut self, key: impl Into<String>) -> Self {
        self.routing_key = key.into();
        self
    }

    #[inline]
    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = exchange.into();
        self
    }

    #[inline]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    #[inline]
    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    #[inline]
    pub fn redelivered(mut self, redelivered: bool) -> Self {
        self.redelivered = redelivered;
        self
    }

    /// Returns a header value.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }
}

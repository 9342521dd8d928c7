//! Channel traits shared by every transport.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Result of handing a message to a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendOutcome {
    /// Accepted by the channel.
    Sent,
    /// The channel is at capacity; the message was not accepted.
    Full,
    /// The channel no longer accepts messages.
    Closed,
}

impl SendOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

impl fmt::Display for SendOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Sent => "sent",
            Self::Full => "full",
            Self::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

/// A named destination for messages.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Channel name (e.g. "orders", "errors").
    fn name(&self) -> &str;

    /// Offer a message without waiting for capacity.
    async fn send(&self, message: Message) -> SendOutcome;
}

/// A channel consumers pull messages from.
#[async_trait]
pub trait PollableChannel: MessageChannel {
    /// Wait up to `timeout` for a message.
    ///
    /// Returns `None` when nothing arrived in time, or when the channel is
    /// closed and drained.
    async fn receive(&self, timeout: Duration) -> Option<Message>;
}

//! Recipient list router: fans each message out to a fixed set of channels.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::channels::{MessageChannel, SendOutcome};
use crate::error::RouterError;
use crate::message::Message;

/// Sends every message to each channel of a static, non-empty list.
pub struct RecipientListRouter {
    name: String,
    recipients: Vec<Arc<dyn MessageChannel>>,
    ignore_send_failures: bool,
}

impl RecipientListRouter {
    pub fn new(
        name: impl Into<String>,
        recipients: Vec<Arc<dyn MessageChannel>>,
    ) -> Result<Self, RouterError> {
        if recipients.is_empty() {
            return Err(RouterError::NoRecipients);
        }
        Ok(Self {
            name: name.into(),
            recipients,
            ignore_send_failures: false,
        })
    }

    /// Skip recipients that reject a message instead of failing the route.
    pub fn with_ignore_send_failures(mut self, ignore: bool) -> Self {
        self.ignore_send_failures = ignore;
        self
    }

    /// Recipient channel names, in delivery order.
    pub fn recipients(&self) -> Vec<&str> {
        self.recipients.iter().map(|c| c.name()).collect()
    }

    /// Deliver `message` to every recipient in order.
    ///
    /// Returns the number of recipients that accepted the message.
    pub async fn route(&self, message: &Message) -> Result<usize, RouterError> {
        let mut delivered = 0;

        for recipient in &self.recipients {
            match recipient.send(message.clone()).await {
                SendOutcome::Sent => delivered += 1,
                outcome if self.ignore_send_failures => {
                    warn!(
                        router = %self.name,
                        channel = %recipient.name(),
                        outcome = %outcome,
                        message_id = %message.id(),
                        "Recipient rejected message, skipping"
                    );
                }
                outcome => {
                    return Err(RouterError::SendFailed {
                        channel: recipient.name().to_string(),
                        outcome,
                    });
                }
            }
        }

        debug!(
            router = %self.name,
            message_id = %message.id(),
            delivered,
            "Message routed"
        );
        Ok(delivered)
    }
}

#[async_trait]
impl MessageChannel for RecipientListRouter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: Message) -> SendOutcome {
        match self.route(&message).await {
            Ok(_) => SendOutcome::Sent,
            Err(RouterError::SendFailed { outcome, .. }) => outcome,
            Err(RouterError::NoRecipients) => SendOutcome::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::channels::{PollableChannel, QueueChannel};

    #[test]
    fn empty_recipient_list_is_rejected() {
        assert!(matches!(
            RecipientListRouter::new("r", Vec::new()),
            Err(RouterError::NoRecipients)
        ));
    }

    #[tokio::test]
    async fn routes_to_every_recipient() {
        let a = QueueChannel::new("a", 2).unwrap();
        let b = QueueChannel::new("b", 2).unwrap();
        let recipients: Vec<Arc<dyn MessageChannel>> = vec![a.clone(), b.clone()];
        let router = RecipientListRouter::new("fanout", recipients).unwrap();
        assert_eq!(router.recipients(), vec!["a", "b"]);

        let message = Message::new("hello").unwrap();
        assert_eq!(router.route(&message).await.unwrap(), 2);

        for channel in [&a, &b] {
            let received = channel.receive(Duration::from_millis(10)).await.unwrap();
            assert_eq!(received.id(), message.id());
        }
    }

    #[tokio::test]
    async fn rejected_send_fails_the_route() {
        let open = QueueChannel::new("open", 2).unwrap();
        let closed = QueueChannel::new("closed", 2).unwrap();
        closed.close();

        let recipients: Vec<Arc<dyn MessageChannel>> = vec![closed, open];
        let router = RecipientListRouter::new("fanout", recipients).unwrap();
        let err = router.route(&Message::new(1).unwrap()).await.unwrap_err();
        assert!(matches!(
            err,
            RouterError::SendFailed { ref channel, outcome: SendOutcome::Closed } if channel == "closed"
        ));
    }

    #[tokio::test]
    async fn ignore_send_failures_skips_rejecting_recipient() {
        let open = QueueChannel::new("open", 2).unwrap();
        let closed = QueueChannel::new("closed", 2).unwrap();
        closed.close();

        let recipients: Vec<Arc<dyn MessageChannel>> = vec![closed, open.clone()];
        let router = RecipientListRouter::new("fanout", recipients)
            .unwrap()
            .with_ignore_send_failures(true);
        assert_eq!(router.route(&Message::new(1).unwrap()).await.unwrap(), 1);
        assert_eq!(open.len(), 1);
    }

    #[tokio::test]
    async fn router_acts_as_a_channel() {
        let full = QueueChannel::new("full", 1).unwrap();
        full.send(Message::new("occupied").unwrap()).await;
        let recipients: Vec<Arc<dyn MessageChannel>> = vec![full];
        let router = RecipientListRouter::new("fanout", recipients).unwrap();
        assert_eq!(router.send(Message::new(1).unwrap()).await, SendOutcome::Full);
    }
}

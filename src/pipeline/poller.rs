//! Polling consumer: pulls messages from a queue and feeds an endpoint.
//!
//! Each poll cycle receives up to `max_messages_per_poll` messages and hands
//! them to the endpoint one by one. Failures never stop the loop: they are
//! logged and, if an error channel is configured, forwarded there.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::channels::{MessageChannel, PollableChannel};
use crate::config::PollerConfig;
use crate::error::EndpointError;
use crate::message::{Message, MessageBuilder};
use crate::pipeline::endpoint::ServiceActivator;

/// Header set on error messages, pointing at the message that failed.
pub const FAILED_MESSAGE_ID_HEADER: &str = "failed_message_id";

/// Consumer bound to one input channel and one endpoint.
pub struct PollingConsumer {
    input: Arc<dyn PollableChannel>,
    endpoint: Arc<ServiceActivator>,
    config: PollerConfig,
    error_channel: Option<Arc<dyn MessageChannel>>,
}

impl PollingConsumer {
    pub fn new(
        input: Arc<dyn PollableChannel>,
        endpoint: Arc<ServiceActivator>,
        config: PollerConfig,
    ) -> Self {
        Self {
            input,
            endpoint,
            config,
            error_channel: None,
        }
    }

    /// Forward endpoint failures to `channel` as error messages.
    pub fn with_error_channel(mut self, channel: Arc<dyn MessageChannel>) -> Self {
        self.error_channel = Some(channel);
        self
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Run a single poll cycle. Returns the number of messages received.
    pub async fn poll_once(&self) -> usize {
        let mut received = 0;

        loop {
            if let Some(max) = self.config.max_messages_per_poll
                && received >= max
            {
                break;
            }

            let Some(message) = self.input.receive(self.config.receive_timeout).await else {
                break;
            };
            received += 1;

            match self.endpoint.handle(&message).await {
                Ok(reply) => {
                    debug!(
                        endpoint = %self.endpoint.name(),
                        message_id = %message.id(),
                        replied = reply.is_some(),
                        "Message handled"
                    );
                }
                Err(e) => {
                    error!(
                        endpoint = %self.endpoint.name(),
                        message_id = %message.id(),
                        error = %e,
                        "Message handling failed"
                    );
                    self.forward_error(&message, &e).await;
                }
            }
        }

        if received > 0 {
            debug!(
                channel = %self.input.name(),
                received,
                "Poll cycle complete"
            );
        }
        received
    }

    async fn forward_error(&self, failed: &Message, failure: &EndpointError) {
        let Some(channel) = &self.error_channel else {
            return;
        };

        let error_message = MessageBuilder::with_payload(json!({
            "error": failure.to_string(),
            "handler": self.endpoint.name(),
        }))
        .copy_headers(failed.headers().iter().map(|(k, v)| (k.clone(), v.clone())))
        .set_header(FAILED_MESSAGE_ID_HEADER, failed.id().to_string())
        .build();

        match error_message {
            Ok(error_message) => {
                let outcome = channel.send(error_message).await;
                if !outcome.is_sent() {
                    warn!(
                        channel = %channel.name(),
                        outcome = %outcome,
                        "Failed to forward error message"
                    );
                }
            }
            Err(e) => warn!(error = %e, "Failed to build error message"),
        }
    }
}

/// Spawn a background task that polls on the consumer's schedule.
///
/// Returns a `JoinHandle` and a shutdown flag. Set the flag to stop polling.
pub fn spawn_polling_consumer(consumer: PollingConsumer) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        let config = consumer.config.clone();
        info!(
            channel = %consumer.input.name(),
            endpoint = %consumer.endpoint.name(),
            interval_ms = config.interval.as_millis() as u64,
            fixed_rate = config.fixed_rate,
            "Polling consumer started"
        );

        if !config.initial_delay.is_zero() {
            tokio::time::sleep(config.initial_delay).await;
        }

        if config.fixed_rate {
            let mut tick = tokio::time::interval(config.interval);
            loop {
                tick.tick().await;
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                consumer.poll_once().await;
            }
        } else {
            loop {
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                consumer.poll_once().await;
                tokio::time::sleep(config.interval).await;
            }
        }

        info!(channel = %consumer.input.name(), "Polling consumer shutting down");
    });

    (handle, shutdown_flag)
}

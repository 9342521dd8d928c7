//! Service activator: invokes a handler for each message through its binder.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::binding::{Argument, Binder, HandlerSignature, Outbound};
use crate::channels::MessageChannel;
use crate::error::{BindingError, EndpointError, SignatureError};
use crate::message::Message;

/// Business logic invoked with bound arguments.
///
/// Returning `Ok(None)` means the handler produces no reply.
pub trait Handler: Send + Sync {
    fn invoke(&self, arguments: Vec<Argument>) -> anyhow::Result<Option<Outbound>>;
}

impl<F> Handler for F
where
    F: Fn(Vec<Argument>) -> anyhow::Result<Option<Outbound>> + Send + Sync,
{
    fn invoke(&self, arguments: Vec<Argument>) -> anyhow::Result<Option<Outbound>> {
        self(arguments)
    }
}

/// A handler registered together with its binder.
pub struct ServiceActivator {
    binder: Binder,
    handler: Arc<dyn Handler>,
    output: Option<Arc<dyn MessageChannel>>,
    order: i32,
}

impl ServiceActivator {
    /// Register a handler. Fails if its signature cannot be bound.
    pub fn new(
        signature: &HandlerSignature,
        handler: impl Handler + 'static,
    ) -> Result<Self, SignatureError> {
        let binder = Binder::new(signature).inspect_err(|e| {
            warn!(handler = %signature.name, error = %e, "Rejected handler registration");
        })?;

        info!(
            handler = %signature.name,
            parameters = binder.parameter_count(),
            "Registered handler"
        );

        Ok(Self {
            binder,
            handler: Arc::new(handler),
            output: None,
            order: 0,
        })
    }

    /// Send replies to `channel`.
    pub fn with_output_channel(mut self, channel: Arc<dyn MessageChannel>) -> Self {
        self.output = Some(channel);
        self
    }

    /// Position among endpoints sharing an input; lower runs first.
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn name(&self) -> &str {
        self.binder.handler()
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn binder(&self) -> &Binder {
        &self.binder
    }

    /// Bind, invoke, and route the reply (if any).
    pub async fn handle(&self, message: &Message) -> Result<Option<Message>, EndpointError> {
        let handler = self.name();
        let binding_failed = |source: BindingError| EndpointError::Binding {
            handler: handler.to_string(),
            source,
        };

        let arguments = self.binder.to_arguments(message).map_err(binding_failed)?;

        let returned = self
            .handler
            .invoke(arguments)
            .map_err(|e| EndpointError::Handler {
                handler: handler.to_string(),
                reason: format!("{e:#}"),
            })?;

        let Some(returned) = returned else {
            debug!(handler = %handler, message_id = %message.id(), "Handler produced no reply");
            return Ok(None);
        };

        let reply = self
            .binder
            .reply_message(Some(returned), message)
            .map_err(binding_failed)?;

        if let Some(output) = &self.output {
            let outcome = output.send(reply.clone()).await;
            if !outcome.is_sent() {
                return Err(EndpointError::ReplyNotSent {
                    handler: handler.to_string(),
                    channel: output.name().to_string(),
                    outcome,
                });
            }
            debug!(
                handler = %handler,
                channel = %output.name(),
                reply_id = %reply.id(),
                "Reply sent"
            );
        }

        Ok(Some(reply))
    }
}

/// Sort endpoints by their order, keeping registration order for ties.
pub fn sort_by_order(endpoints: &mut [Arc<ServiceActivator>]) {
    endpoints.sort_by_key(|e| e.order());
}

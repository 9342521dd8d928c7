use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use serde_json::json;

use conduit::binding::{Argument, HandlerSignature, Outbound, ParameterSpec};
use conduit::channels::{MessageChannel, PollableChannel, QueueChannel};
use conduit::config::{ChannelConfig, PollerConfig};
use conduit::message::MessageBuilder;
use conduit::pipeline::{
    PollingConsumer, RecipientListRouter, ServiceActivator, spawn_polling_consumer,
};

/// How long the demo lets the consumer run before shutting down.
const DEMO_RUN_TIME: Duration = Duration::from_millis(500);

/// Demo handler: `(headers map, order payload, customer header, priority header?)`.
fn enrich_order(arguments: Vec<Argument>) -> anyhow::Result<Option<Outbound>> {
    let header_count = arguments[0].as_headers().map(|h| h.len()).unwrap_or(0);
    let order = arguments[1]
        .as_payload()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("order payload not bound"))?;
    let customer = arguments[2].as_header().cloned().unwrap_or_default();
    let priority = arguments[3]
        .as_header()
        .cloned()
        .unwrap_or_else(|| json!("normal"));

    Ok(Some(Outbound::Payload(json!({
        "order": order,
        "customer": customer,
        "priority": priority,
        "header_count": header_count,
    }))))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let poller_config = PollerConfig::try_from_env()?;
    let channel_config = ChannelConfig::try_from_env()?;

    eprintln!("conduit v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Poll interval: {:?}", poller_config.interval);
    eprintln!("   Queue capacity: {}", channel_config.queue_capacity);

    // ── Channels ─────────────────────────────────────────────────────────
    let capacity = channel_config.queue_capacity;
    let orders = QueueChannel::new("orders", capacity)?;
    let audit = QueueChannel::new("audit", capacity)?;
    let fulfillment = QueueChannel::new("fulfillment", capacity)?;
    let errors = QueueChannel::new("errors", capacity)?;

    let recipients: Vec<Arc<dyn MessageChannel>> = vec![audit.clone(), fulfillment.clone()];
    let router = Arc::new(RecipientListRouter::new("order-fanout", recipients)?);

    // ── Endpoint ─────────────────────────────────────────────────────────
    let signature = HandlerSignature::new("enrichOrder")
        .param(ParameterSpec::map("headers"))
        .param(ParameterSpec::value("order"))
        .param(ParameterSpec::value("customer").header_by_name())
        .param(ParameterSpec::value("priority").optional_header("priority"));
    let endpoint = Arc::new(
        ServiceActivator::new(&signature, enrich_order)?.with_output_channel(router),
    );

    // ── Traffic ──────────────────────────────────────────────────────────
    let inbound = [
        MessageBuilder::with_payload("order-42")
            .set_header("customer", "alice")
            .set_header("priority", "high")
            .build()?,
        MessageBuilder::with_payload(json!({"sku": "X-1", "qty": 3}))
            .set_header("customer", "bob")
            .build()?,
        // No customer header: ends up on the error channel.
        MessageBuilder::with_payload("order-43").build()?,
    ];
    for message in inbound {
        let outcome = orders.send(message).await;
        tracing::info!(channel = "orders", outcome = %outcome, "Submitted message");
    }

    let consumer = PollingConsumer::new(orders.clone(), endpoint, poller_config)
        .with_error_channel(errors.clone());
    let (handle, shutdown) = spawn_polling_consumer(consumer);

    tokio::time::sleep(DEMO_RUN_TIME).await;
    shutdown.store(true, Ordering::Relaxed);
    orders.close();
    handle.await?;

    for channel in [&audit, &fulfillment, &errors] {
        while let Some(message) = channel.receive(Duration::from_millis(10)).await {
            eprintln!("[{}] {}", channel.name(), message.payload());
        }
    }

    Ok(())
}

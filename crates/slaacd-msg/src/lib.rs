pub mod channel;
pub mod events;
pub mod nats;
pub mod noop;

use async_trait::async_trait;
use events::{Inbound, Outbound};

/// Transport between the engine and its collaborators.
/// Implementations can use NATS, an in-process channel, or be a no-op.
#[async_trait]
pub trait MessageBus: Send + Sync + 'static {
    /// Publish an engine output to whoever consumes it.
    async fn publish(&self, event: &Outbound) -> anyhow::Result<()>;

    /// Subscribe to the engine's input stream.
    /// Messages are yielded in arrival order.
    async fn subscribe(&self) -> anyhow::Result<tokio::sync::mpsc::Receiver<Inbound>>;

    /// Gracefully shut down the message bus.
    async fn shutdown(&self) -> anyhow::Result<()>;
}

/// Create a message bus from configuration.
pub async fn create_message_bus(
    backend: &str,
    instance_id: &str,
    topic_prefix: &str,
    url: Option<&str>,
    capacity: usize,
) -> anyhow::Result<Box<dyn MessageBus>> {
    match backend {
        "nats" => {
            let url = url.ok_or_else(|| anyhow::anyhow!("nats backend requires a url"))?;
            Ok(Box::new(
                nats::NatsMessageBus::new(instance_id, topic_prefix, url, capacity).await?,
            ))
        }
        _ => Ok(Box::new(noop::NoopMessageBus::new(instance_id))),
    }
}

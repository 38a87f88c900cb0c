use crate::events::{Inbound, Outbound};
use crate::MessageBus;
use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

/// No-op message bus for standalone mode. Output is logged but not transmitted
/// and no input is ever delivered.
pub struct NoopMessageBus {
    instance_id: String,
    // Held so the receiver handed out by subscribe() stays open.
    idle_tx: Mutex<Option<mpsc::Sender<Inbound>>>,
}

impl NoopMessageBus {
    pub fn new(instance_id: &str) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            idle_tx: Mutex::new(None),
        }
    }
}

#[async_trait]
impl MessageBus for NoopMessageBus {
    async fn publish(&self, event: &Outbound) -> anyhow::Result<()> {
        debug!(
            instance_id = %self.instance_id,
            event_type = event.topic_suffix(),
            "noop: event published (discarded)"
        );
        Ok(())
    }

    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<Inbound>> {
        debug!(
            instance_id = %self.instance_id,
            "noop: subscribe (no events will be received)"
        );
        let (tx, rx) = mpsc::channel(1);
        if let Ok(mut idle) = self.idle_tx.lock() {
            *idle = Some(tx);
        }
        Ok(rx)
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        debug!(instance_id = %self.instance_id, "noop: message bus shutdown");
        if let Ok(mut idle) = self.idle_tx.lock() {
            idle.take();
        }
        Ok(())
    }
}

use crate::events::{Inbound, Outbound};
use crate::MessageBus;
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// In-process message bus for embedding the engine in a hosting process.
///
/// The host keeps the [`ChannelHandle`] and feeds engine input through it;
/// engine output arrives on the handle's receiver.
pub struct ChannelMessageBus {
    inbound_rx: Mutex<Option<mpsc::Receiver<Inbound>>>,
    outbound_tx: mpsc::Sender<Outbound>,
}

/// Host side of a [`ChannelMessageBus`].
pub struct ChannelHandle {
    pub inbound: mpsc::Sender<Inbound>,
    pub outbound: mpsc::Receiver<Outbound>,
}

impl ChannelMessageBus {
    pub fn new(capacity: usize) -> (Self, ChannelHandle) {
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);

        let bus = Self {
            inbound_rx: Mutex::new(Some(inbound_rx)),
            outbound_tx,
        };
        let handle = ChannelHandle {
            inbound: inbound_tx,
            outbound: outbound_rx,
        };
        (bus, handle)
    }
}

#[async_trait]
impl MessageBus for ChannelMessageBus {
    async fn publish(&self, event: &Outbound) -> anyhow::Result<()> {
        self.outbound_tx
            .send(event.clone())
            .await
            .map_err(|_| anyhow::anyhow!("channel: host dropped the output receiver"))
    }

    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<Inbound>> {
        self.inbound_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| anyhow::anyhow!("channel: input stream already taken"))
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        debug!("channel: message bus shutdown");
        Ok(())
    }
}

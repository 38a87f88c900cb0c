use crate::events::{Inbound, Outbound};
use crate::MessageBus;
use async_nats::{Client, Subscriber};
use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Subject names for one engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Subjects {
    input: String,
    solicit: String,
    info: String,
    error: String,
}

impl Subjects {
    fn new(prefix: &str, instance_id: &str) -> Self {
        let base = format!("{prefix}.{instance_id}");
        Self {
            input: format!("{base}.in"),
            solicit: format!("{base}.solicit"),
            info: format!("{base}.info"),
            error: format!("{base}.error"),
        }
    }

    fn for_output(&self, event: &Outbound) -> &str {
        match event {
            Outbound::SendSolicitation { .. } => &self.solicit,
            Outbound::InterfaceInfo { .. } | Outbound::InterfaceInfoEnd => &self.info,
            Outbound::ControlError { .. } => &self.error,
        }
    }
}

/// NATS-backed message bus.
///
/// Engine input is read from `{prefix}.{instance}.in` as JSON `Inbound`
/// events; output goes to `{prefix}.{instance}.{solicit|info|error}`.
pub struct NatsMessageBus {
    client: Client,
    instance_id: String,
    subjects: Subjects,
    capacity: usize,
}

impl NatsMessageBus {
    pub async fn new(
        instance_id: &str,
        topic_prefix: &str,
        url: &str,
        capacity: usize,
    ) -> anyhow::Result<Self> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| anyhow::anyhow!("failed to connect to NATS at {url}: {e}"))?;

        let subjects = Subjects::new(topic_prefix, instance_id);
        info!(
            instance_id,
            url,
            input = %subjects.input,
            "NATS connection established"
        );

        Ok(Self {
            client,
            instance_id: instance_id.to_string(),
            subjects,
            capacity,
        })
    }
}

/// Pump decoded input into the engine queue until either side goes away.
/// Undecodable payloads are logged and skipped.
async fn forward_inbound(mut subscriber: Subscriber, tx: mpsc::Sender<Inbound>) {
    let mut skipped = 0u64;

    while let Some(msg) = subscriber.next().await {
        let event = match serde_json::from_slice::<Inbound>(&msg.payload) {
            Ok(event) => event,
            Err(e) => {
                skipped += 1;
                warn!(subject = %msg.subject, skipped, "nats: undecodable engine input: {e}");
                continue;
            }
        };

        if tx.send(event).await.is_err() {
            debug!("nats: engine input queue closed");
            return;
        }
    }

    debug!(skipped, "nats: input subscription ended");
}

#[async_trait]
impl MessageBus for NatsMessageBus {
    async fn publish(&self, event: &Outbound) -> anyhow::Result<()> {
        let subject = self.subjects.for_output(event).to_string();
        let payload = serde_json::to_vec(event)?;

        debug!(%subject, bytes = payload.len(), "nats: engine output");

        if let Err(e) = self.client.publish(subject.clone(), payload.into()).await {
            anyhow::bail!("nats publish to {subject}: {e}");
        }
        Ok(())
    }

    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<Inbound>> {
        let subject = self.subjects.input.clone();
        let subscriber = match self.client.subscribe(subject.clone()).await {
            Ok(subscriber) => subscriber,
            Err(e) => anyhow::bail!("nats subscribe to {subject}: {e}"),
        };
        info!(instance_id = %self.instance_id, %subject, "nats: listening for engine input");

        let (tx, rx) = mpsc::channel(self.capacity);
        tokio::spawn(forward_inbound(subscriber, tx));
        Ok(rx)
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        info!(instance_id = %self.instance_id, "nats: draining connection");
        self.client
            .drain()
            .await
            .map_err(|e| anyhow::anyhow!("nats drain: {e}"))
    }
}

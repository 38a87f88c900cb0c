use crate::engine::Engine;
use slaacd_msg::events::Outbound;
use slaacd_msg::MessageBus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Longest the loop sleeps without a timer due.
const MAX_IDLE: Duration = Duration::from_secs(3600);

/// Event loop feeding the engine from a message bus.
///
/// Inbound messages are handled strictly in arrival order; timers fire at
/// their deadlines. All engine state lives on this one task.
pub struct EngineServer {
    engine: Engine,
    bus: Arc<dyn MessageBus>,
}

impl EngineServer {
    pub fn new(engine: Engine, bus: Arc<dyn MessageBus>) -> Self {
        Self { engine, bus }
    }

    pub async fn run(mut self, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let mut inbound = self.bus.subscribe().await?;
        let mut shutdown = shutdown;

        info!("engine started");

        loop {
            let wakeup = self.next_wakeup();

            tokio::select! {
                msg = inbound.recv() => {
                    let Some(msg) = msg else {
                        warn!("engine input closed, stopping");
                        break;
                    };
                    debug!(kind = msg.kind(), if_index = ?msg.if_index(), "engine input");
                    let out = self.engine.handle(msg, Instant::now().into_std());
                    self.publish_all(out).await;
                }
                _ = tokio::time::sleep_until(wakeup) => {
                    let out = self.engine.on_timers_expired(Instant::now().into_std());
                    self.publish_all(out).await;
                }
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        info!("engine shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    fn next_wakeup(&self) -> Instant {
        let cap = Instant::now() + MAX_IDLE;
        match self.engine.next_deadline() {
            Some(deadline) => Instant::from_std(deadline).min(cap),
            None => cap,
        }
    }

    async fn publish_all(&self, events: Vec<Outbound>) {
        for event in events {
            if let Err(e) = self.bus.publish(&event).await {
                error!(topic = event.topic_suffix(), "failed to publish engine output: {e}");
            }
        }
    }
}

//! Fire-and-forget usage recording
//!
//! Request handlers hand events to a bounded mpsc channel and return
//! immediately. A single actor task drains the channel and writes each event
//! through the `UsageLogger` on the blocking pool, preserving arrival order.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use super::logger::UsageLogger;
use super::models::UsageEvent;
use super::UsageSink;

/// Message types for the RecorderActor
enum ActorMessage {
    Record(UsageEvent),
    /// Persist everything queued so far, then acknowledge and stop
    Shutdown(oneshot::Sender<()>),
}

struct RecorderActor {
    receiver: mpsc::Receiver<ActorMessage>,
    logger: Arc<UsageLogger>,
}

impl RecorderActor {
    async fn run(mut self) {
        while let Some(msg) = self.receiver.recv().await {
            match msg {
                ActorMessage::Record(event) => self.persist(event).await,
                ActorMessage::Shutdown(done) => {
                    info!("Usage recorder received shutdown signal, flushing...");
                    self.receiver.close();
                    while let Some(msg) = self.receiver.recv().await {
                        if let ActorMessage::Record(event) = msg {
                            self.persist(event).await;
                        }
                    }
                    let _ = done.send(());
                    return;
                }
            }
        }
        warn!("Usage recorder channel closed without shutdown");
    }

    async fn persist(&self, event: UsageEvent) {
        let logger = Arc::clone(&self.logger);
        if let Err(err) = tokio::task::spawn_blocking(move || logger.log(event)).await {
            error!(error = %err, "usage log task failed");
        }
    }
}

/// Channel-backed `UsageSink` that never blocks the caller
pub struct AnalyticsRecorder {
    actor_tx: mpsc::Sender<ActorMessage>,
}

impl AnalyticsRecorder {
    /// Spawn the recorder actor. Must be called inside a tokio runtime.
    pub fn new(logger: Arc<UsageLogger>, buffer_size: usize) -> Self {
        let (actor_tx, receiver) = mpsc::channel(buffer_size.max(1));

        let actor = RecorderActor { receiver, logger };
        tokio::spawn(async move {
            actor.run().await;
        });

        Self { actor_tx }
    }

    /// Flush queued events and stop the actor
    pub async fn shutdown(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.actor_tx.send(ActorMessage::Shutdown(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }
}

impl UsageSink for AnalyticsRecorder {
    fn record(&self, event: UsageEvent) {
        if let Err(err) = self.actor_tx.try_send(ActorMessage::Record(event)) {
            warn!(error = %err, "usage event buffer unavailable, dropping event");
        }
    }
}

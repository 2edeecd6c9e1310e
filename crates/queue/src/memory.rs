//! In-process broker on `tokio::sync::broadcast`.
//!
//! Every published envelope fans out to all consumers; each consumer keeps
//! only the queue it asked for. Used by tests and single-process setups.

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::envelope::Envelope;
use crate::error::QueueError;
use crate::notification::Notification;
use crate::traits::{NotificationConsumer, NotificationPublisher, NotificationStream, STREAM_CAPACITY};

#[derive(Clone)]
pub struct MemoryBroker {
    tx: broadcast::Sender<Envelope>,
}

impl MemoryBroker {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publisher bound to `queue`.
    pub fn publisher(&self, queue: impl Into<String>) -> MemoryPublisher {
        MemoryPublisher {
            tx: self.tx.clone(),
            queue: queue.into(),
        }
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl NotificationConsumer for MemoryBroker {
    async fn consume(&self, queue: &str) -> Result<NotificationStream, QueueError> {
        let mut rx = self.tx.subscribe();
        let (tx, out) = mpsc::channel(STREAM_CAPACITY);
        let queue = queue.to_string();

        tokio::spawn(async move {
            loop {
                let item = match rx.recv().await {
                    Ok(envelope) if envelope.queue != queue => continue,
                    Ok(envelope) => envelope.notification(),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(queue = %queue, skipped, "consumer lagged, notifications dropped");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                if tx.send(item).await.is_err() {
                    break;
                }
            }
        });

        Ok(out)
    }
}

pub struct MemoryPublisher {
    tx: broadcast::Sender<Envelope>,
    queue: String,
}

#[async_trait]
impl NotificationPublisher for MemoryPublisher {
    async fn publish(&self, notification: &Notification) -> Result<(), QueueError> {
        let envelope = Envelope::wrap(self.queue.as_str(), notification)?;
        // No subscriber is not an error: PUB/SUB drops unheard messages.
        match self.tx.send(envelope) {
            Ok(receivers) => debug!(queue = %self.queue, receivers, "published notification"),
            Err(_) => debug!(queue = %self.queue, "published notification with no consumers"),
        }
        Ok(())
    }
}

//! ZeroMQ PUB/SUB transport.
//!
//! Messages travel as two frames: the queue name (used by SUB sockets for
//! prefix filtering) followed by the MessagePack [`Envelope`]. The
//! publisher binds and consumers connect, so no broker process is needed.

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, instrument, warn};
use zeromq::prelude::*;
use zeromq::{PubSocket, SubSocket, ZmqMessage};

use crate::envelope::Envelope;
use crate::error::QueueError;
use crate::notification::Notification;
use crate::traits::{NotificationConsumer, NotificationPublisher, NotificationStream, STREAM_CAPACITY};

pub struct ZmqPublisher {
    socket: Mutex<PubSocket>,
    queue: String,
}

impl ZmqPublisher {
    /// Bind a PUB socket on `endpoint`; every notification goes to `queue`.
    #[instrument(skip_all, fields(endpoint = %endpoint))]
    pub async fn bind(endpoint: &str, queue: impl Into<String>) -> Result<Self, QueueError> {
        let mut socket = PubSocket::new();
        socket
            .bind(endpoint)
            .await
            .map_err(|e| QueueError::Connection(format!("bind {endpoint}: {e}")))?;
        let queue = queue.into();
        info!(endpoint = %endpoint, queue = %queue, "PUB socket bound");
        Ok(Self {
            socket: Mutex::new(socket),
            queue,
        })
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }
}

#[async_trait]
impl NotificationPublisher for ZmqPublisher {
    async fn publish(&self, notification: &Notification) -> Result<(), QueueError> {
        let envelope = Envelope::wrap(self.queue.as_str(), notification)?;

        let mut zmq_msg = ZmqMessage::from(self.queue.as_str());
        zmq_msg.push_back(envelope.to_bytes()?.into());

        let mut socket = self.socket.lock().await;
        socket.send(zmq_msg).await?;

        debug!(queue = %self.queue, id = %notification.id, "published notification");
        Ok(())
    }
}

/// Extract the envelope from a `[queue, envelope]` message.
fn decode_frames(zmq_msg: &ZmqMessage) -> Result<Envelope, QueueError> {
    let frames: Vec<_> = zmq_msg.iter().collect();
    match frames.as_slice() {
        [_, envelope, ..] => Envelope::from_bytes(envelope.as_ref()),
        [single] => Envelope::from_bytes(single.as_ref()),
        [] => Err(QueueError::Transport("empty ZMQ message".into())),
    }
}

/// Connects a SUB socket per `consume` call.
pub struct ZmqConsumer {
    endpoint: String,
}

impl ZmqConsumer {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl NotificationConsumer for ZmqConsumer {
    #[instrument(skip_all, fields(endpoint = %self.endpoint, queue = %queue))]
    async fn consume(&self, queue: &str) -> Result<NotificationStream, QueueError> {
        let mut socket = SubSocket::new();
        socket
            .connect(&self.endpoint)
            .await
            .map_err(|e| QueueError::Connection(format!("connect {}: {e}", self.endpoint)))?;
        socket.subscribe(queue).await?;
        info!("SUB socket subscribed");

        let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
        let queue = queue.to_string();

        tokio::spawn(async move {
            loop {
                let item = match socket.recv().await {
                    Ok(zmq_msg) => match decode_frames(&zmq_msg) {
                        // Subscriptions match by prefix; drop neighbouring queues.
                        Ok(envelope) if envelope.queue != queue => continue,
                        Ok(envelope) => envelope.notification(),
                        Err(e) => Err(e),
                    },
                    Err(e) => {
                        warn!(error = %e, "SUB socket receive failed, closing stream");
                        let _ = tx.send(Err(e.into())).await;
                        break;
                    }
                };
                if tx.send(item).await.is_err() {
                    debug!(queue = %queue, "consumer dropped, closing SUB socket");
                    break;
                }
            }
        });

        Ok(rx)
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::QueueError;
use crate::notification::Notification;

/// Notifications delivered to a consumer, in arrival order. Closes when the
/// transport shuts down.
pub type NotificationStream = mpsc::Receiver<Result<Notification, QueueError>>;

/// Buffer between a transport's receive task and its consumer.
pub(crate) const STREAM_CAPACITY: usize = 64;

/// Hands notifications to the broker.
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    async fn publish(&self, notification: &Notification) -> Result<(), QueueError>;
}

/// Blanket implementation so `Arc<dyn NotificationPublisher>` can be used directly.
#[async_trait]
impl<T: NotificationPublisher + ?Sized> NotificationPublisher for Arc<T> {
    async fn publish(&self, notification: &Notification) -> Result<(), QueueError> {
        (**self).publish(notification).await
    }
}

/// Receives notifications published to a named queue.
#[async_trait]
pub trait NotificationConsumer: Send + Sync {
    async fn consume(&self, queue: &str) -> Result<NotificationStream, QueueError>;
}

pub mod envelope;
pub mod error;
pub mod memory;
pub mod notification;
pub mod traits;
pub mod zmq;

pub use envelope::Envelope;
pub use error::QueueError;
pub use memory::{MemoryBroker, MemoryPublisher};
pub use notification::Notification;
pub use traits::{NotificationConsumer, NotificationPublisher, NotificationStream};
pub use zmq::{ZmqConsumer, ZmqPublisher};

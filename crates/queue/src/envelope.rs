use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::QueueError;
use crate::notification::Notification;

/// Wire-format envelope carried by every broker transport.
///
/// Serialized with MessagePack. `queue` doubles as the PUB/SUB routing
/// topic; `payload` holds the MessagePack-encoded [`Notification`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub queue: String,

    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,

    pub timestamp: DateTime<Utc>,

    pub correlation_id: Uuid,

    /// Payload schema version. Consumers reject versions newer than they know.
    #[serde(default = "default_version")]
    pub version: u16,
}

fn default_version() -> u16 {
    Envelope::VERSION
}

impl Envelope {
    pub const VERSION: u16 = 1;

    pub fn wrap(queue: impl Into<String>, notification: &Notification) -> Result<Self, QueueError> {
        Ok(Self {
            queue: queue.into(),
            payload: rmp_serde::to_vec(notification)?,
            timestamp: Utc::now(),
            correlation_id: Uuid::new_v4(),
            version: Self::VERSION,
        })
    }

    pub fn notification(&self) -> Result<Notification, QueueError> {
        if self.version > Self::VERSION {
            return Err(QueueError::UnsupportedVersion(self.version));
        }
        Ok(rmp_serde::from_slice(&self.payload)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, QueueError> {
        Ok(rmp_serde::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, QueueError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

/// `Vec<u8>` as a MessagePack bin field.
mod serde_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let bytes: &[u8] = Deserialize::deserialize(d)?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agenda_core::time::parse_timestamp;
    use agenda_core::EventId;

    fn sample() -> Notification {
        Notification {
            id: EventId::generate(),
            title: "Standup".to_string(),
            date_start: parse_timestamp("2022-10-10 00:02:15").unwrap(),
            recipient: Uuid::new_v4(),
        }
    }

    #[test]
    fn envelope_carries_the_notification() {
        let notification = sample();
        let envelope = Envelope::wrap("notifications", &notification).unwrap();

        let decoded = Envelope::from_bytes(&envelope.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.queue, "notifications");
        assert_eq!(decoded.correlation_id, envelope.correlation_id);
        assert_eq!(decoded.notification().unwrap(), notification);
    }

    #[test]
    fn newer_version_is_rejected() {
        let mut envelope = Envelope::wrap("notifications", &sample()).unwrap();
        envelope.version = Envelope::VERSION + 1;
        assert!(matches!(
            envelope.notification(),
            Err(QueueError::UnsupportedVersion(v)) if v == Envelope::VERSION + 1
        ));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(matches!(
            Envelope::from_bytes(b"\xc1not msgpack"),
            Err(QueueError::Decode(_))
        ));
    }
}

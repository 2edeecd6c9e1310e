use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use agenda_core::time::timestamp_format;
use agenda_core::{Event, EventId};

/// Reminder sent for an event that is about to start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: EventId,
    pub title: String,
    #[serde(with = "timestamp_format")]
    pub date_start: DateTime<Utc>,
    /// Who should receive the reminder: the event's owner.
    pub recipient: Uuid,
}

impl From<&Event> for Notification {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id,
            title: event.data.title.clone(),
            date_start: event.data.date_start,
            recipient: event.data.user_id,
        }
    }
}

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::time::{self, timestamp_format};

/// Store-assigned event identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Fresh random (v4) identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for EventId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<EventId> for Uuid {
    fn from(id: EventId) -> Self {
        id.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for EventId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Everything about an event except its identity.
///
/// This is what callers hand to `create`/`update`; the store owns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventData {
    pub title: String,
    #[serde(with = "timestamp_format")]
    pub date_start: DateTime<Utc>,
    #[serde(with = "timestamp_format")]
    pub date_end: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
    pub user_id: Uuid,
    #[serde(with = "timestamp_format")]
    pub date_post: DateTime<Utc>,
}

impl EventData {
    /// Build event data posted now, with an empty description.
    pub fn new(
        title: impl Into<String>,
        date_start: DateTime<Utc>,
        date_end: DateTime<Utc>,
        user_id: Uuid,
    ) -> Self {
        Self {
            title: title.into(),
            date_start,
            date_end,
            description: String::new(),
            user_id,
            date_post: Utc::now(),
        }
        .normalized()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Truncate every timestamp to whole seconds.
    pub fn normalized(mut self) -> Self {
        self.date_start = time::truncate_to_second(self.date_start);
        self.date_end = time::truncate_to_second(self.date_end);
        self.date_post = time::truncate_to_second(self.date_post);
        self
    }

    /// UTC calendar day containing `date_start`.
    pub fn day_bucket(&self) -> NaiveDate {
        self.date_start.date_naive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    #[serde(flatten)]
    pub data: EventData,
}

impl Event {
    pub fn new(id: EventId, data: EventData) -> Self {
        Self { id, data }
    }

    pub fn date_start(&self) -> DateTime<Utc> {
        self.data.date_start
    }

    pub fn day_bucket(&self) -> NaiveDate {
        self.data.day_bucket()
    }

    /// `date_start` as Unix seconds, the sort key for listings.
    pub fn start_ts(&self) -> i64 {
        self.data.date_start.timestamp()
    }
}

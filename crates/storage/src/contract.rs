use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use agenda_core::time::{self, Period};
use agenda_core::{Event, EventData, EventId};

use crate::error::StoreError;

/// Persistent calendar event store.
///
/// Implementations guarantee that no two stored events share an id or a
/// `date_start`, and that a failed operation leaves the stored set
/// unchanged. Listings are ordered by `date_start` ascending.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Store a new event and return its freshly assigned id.
    async fn create(&self, data: EventData) -> Result<EventId, StoreError>;

    /// Replace every field of an existing event; the id is kept.
    async fn update(&self, id: EventId, data: EventData) -> Result<(), StoreError>;

    async fn delete(&self, id: EventId) -> Result<(), StoreError>;

    async fn get(&self, id: EventId) -> Result<Event, StoreError>;

    /// Events whose start falls in the period beginning at midnight UTC of `start`.
    async fn list_period(&self, period: Period, start: NaiveDate) -> Result<Vec<Event>, StoreError>;

    /// Events due for a reminder at `now`.
    async fn list_due_for_notification(&self, now: DateTime<Utc>) -> Result<Vec<Event>, StoreError>;

    /// Remove every event that started strictly before `cutoff`. Returns how many were removed.
    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Release backend resources. Safe to call more than once.
    async fn close(&self) {}

    async fn list_day(&self, date: &str) -> Result<Vec<Event>, StoreError> {
        let start = time::parse_day(date)?;
        self.list_period(Period::Day, start).await
    }

    async fn list_week(&self, date: &str) -> Result<Vec<Event>, StoreError> {
        let start = time::parse_day(date)?;
        self.list_period(Period::Week, start).await
    }

    async fn list_month(&self, date: &str) -> Result<Vec<Event>, StoreError> {
        let start = time::parse_day(date)?;
        self.list_period(Period::Month, start).await
    }
}

#[async_trait]
impl<T: EventStore + ?Sized> EventStore for Arc<T> {
    async fn create(&self, data: EventData) -> Result<EventId, StoreError> {
        (**self).create(data).await
    }

    async fn update(&self, id: EventId, data: EventData) -> Result<(), StoreError> {
        (**self).update(id, data).await
    }

    async fn delete(&self, id: EventId) -> Result<(), StoreError> {
        (**self).delete(id).await
    }

    async fn get(&self, id: EventId) -> Result<Event, StoreError> {
        (**self).get(id).await
    }

    async fn list_period(&self, period: Period, start: NaiveDate) -> Result<Vec<Event>, StoreError> {
        (**self).list_period(period, start).await
    }

    async fn list_due_for_notification(&self, now: DateTime<Utc>) -> Result<Vec<Event>, StoreError> {
        (**self).list_due_for_notification(now).await
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        (**self).delete_before(cutoff).await
    }

    async fn close(&self) {
        (**self).close().await
    }
}

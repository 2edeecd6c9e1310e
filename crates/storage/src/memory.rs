//! In-process event store.
//!
//! Three indices are kept in lockstep under a single `RwLock`:
//! id -> event, start instant -> id, and UTC day -> events starting that day.
//! The id index and the day buckets share one `Arc<Event>` per event, so an
//! update is always visible through both. Every mutation validates first and
//! only then touches the indices, so a rejected call changes nothing.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

use agenda_core::time::Period;
use agenda_core::{Event, EventData, EventId};

use crate::contract::EventStore;
use crate::error::StoreError;
use crate::policy::NotifyPolicy;

#[derive(Debug, Default)]
struct Indices {
    by_id: HashMap<EventId, Arc<Event>>,
    by_start: HashMap<DateTime<Utc>, EventId>,
    by_day: BTreeMap<NaiveDate, Vec<Arc<Event>>>,
}

impl Indices {
    fn insert(&mut self, event: Event) {
        let event = Arc::new(event);
        self.by_start.insert(event.date_start(), event.id);
        self.by_day
            .entry(event.day_bucket())
            .or_default()
            .push(Arc::clone(&event));
        self.by_id.insert(event.id, event);
    }

    fn remove(&mut self, id: EventId) -> Option<Arc<Event>> {
        let event = self.by_id.remove(&id)?;
        self.by_start.remove(&event.date_start());

        let day = event.day_bucket();
        if let Some(bucket) = self.by_day.get_mut(&day) {
            bucket.retain(|e| e.id != id);
            if bucket.is_empty() {
                self.by_day.remove(&day);
            }
        }
        Some(event)
    }

    /// Whether `start` is held by an event other than `except`.
    fn start_taken(&self, start: DateTime<Utc>, except: Option<EventId>) -> bool {
        match self.by_start.get(&start) {
            Some(owner) => Some(*owner) != except,
            None => false,
        }
    }

    fn collect_days(&self, from: NaiveDate, to: NaiveDate) -> Vec<Event> {
        if from >= to {
            return Vec::new();
        }
        let mut events: Vec<Event> = self
            .by_day
            .range(from..to)
            .flat_map(|(_, bucket)| bucket.iter().map(|e| Event::clone(e)))
            .collect();
        events.sort_by_key(|e| e.date_start());
        events
    }

    fn check(&self) -> Result<(), String> {
        if self.by_id.len() != self.by_start.len() {
            return Err(format!(
                "id index holds {} events but start index holds {}",
                self.by_id.len(),
                self.by_start.len()
            ));
        }

        let mut bucketed = 0;
        for (day, bucket) in &self.by_day {
            if bucket.is_empty() {
                return Err(format!("empty day bucket left behind for {day}"));
            }
            for event in bucket {
                if event.day_bucket() != *day {
                    return Err(format!("event {} filed under {day}", event.id));
                }
                match self.by_id.get(&event.id) {
                    Some(indexed) if Arc::ptr_eq(indexed, event) => {}
                    Some(_) => return Err(format!("event {} diverged between indices", event.id)),
                    None => return Err(format!("event {} bucketed but not indexed", event.id)),
                }
            }
            bucketed += bucket.len();
        }
        if bucketed != self.by_id.len() {
            return Err(format!(
                "{} events bucketed, {} indexed by id",
                bucketed,
                self.by_id.len()
            ));
        }

        for (id, event) in &self.by_id {
            if event.id != *id {
                return Err(format!("event {} indexed under {id}", event.id));
            }
            if self.by_start.get(&event.date_start()) != Some(id) {
                return Err(format!("start index does not point back to {id}"));
            }
        }
        Ok(())
    }
}

/// Event store that lives entirely in memory. Safe to share across tasks.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Indices>,
    policy: NotifyPolicy,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: NotifyPolicy) -> Self {
        Self {
            inner: RwLock::default(),
            policy,
        }
    }

    pub fn len(&self) -> usize {
        self.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Verify the indices agree with each other. Returns a description of
    /// the first disagreement found.
    pub fn check_consistency(&self) -> Result<(), String> {
        self.read().check()
    }

    // A panic while holding the lock cannot leave the indices half-updated:
    // all validation happens before the first write.
    fn read(&self) -> RwLockReadGuard<'_, Indices> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Indices> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert_new(&self, id: EventId, data: EventData) -> Result<EventId, StoreError> {
        let data = data.normalized();
        let mut idx = self.write();

        if idx.by_id.contains_key(&id) {
            return Err(StoreError::DuplicateId(id));
        }
        if idx.start_taken(data.date_start, None) {
            return Err(StoreError::DateBusy(data.date_start));
        }

        idx.insert(Event::new(id, data));
        debug!(id = %id, "event created");
        Ok(id)
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn create(&self, data: EventData) -> Result<EventId, StoreError> {
        self.insert_new(EventId::generate(), data)
    }

    async fn update(&self, id: EventId, data: EventData) -> Result<(), StoreError> {
        let data = data.normalized();
        let mut idx = self.write();

        if !idx.by_id.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        if idx.start_taken(data.date_start, Some(id)) {
            return Err(StoreError::DateBusy(data.date_start));
        }

        idx.remove(id);
        idx.insert(Event::new(id, data));
        debug!(id = %id, "event updated");
        Ok(())
    }

    async fn delete(&self, id: EventId) -> Result<(), StoreError> {
        match self.write().remove(id) {
            Some(_) => {
                debug!(id = %id, "event deleted");
                Ok(())
            }
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn get(&self, id: EventId) -> Result<Event, StoreError> {
        self.read()
            .by_id
            .get(&id)
            .map(|e| Event::clone(e))
            .ok_or(StoreError::NotFound(id))
    }

    async fn list_period(&self, period: Period, start: NaiveDate) -> Result<Vec<Event>, StoreError> {
        let (from, to) = period.window(start);
        Ok(self.read().collect_days(from, to))
    }

    async fn list_due_for_notification(&self, now: DateTime<Utc>) -> Result<Vec<Event>, StoreError> {
        let (after, until) = self.policy.due_window(now);
        let idx = self.read();

        let mut due: Vec<Event> = idx
            .by_day
            .range(after.date_naive()..=until.date_naive())
            .flat_map(|(_, bucket)| bucket.iter())
            .filter(|e| self.policy.is_due(e.date_start(), now))
            .map(|e| Event::clone(e))
            .collect();
        due.sort_by_key(|e| e.date_start());
        Ok(due)
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut idx = self.write();

        let expired: Vec<EventId> = idx
            .by_day
            .range(..=cutoff.date_naive())
            .flat_map(|(_, bucket)| bucket.iter())
            .filter(|e| e.date_start() < cutoff)
            .map(|e| e.id)
            .collect();

        for id in &expired {
            idx.remove(*id);
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), cutoff = %cutoff, "outdated events removed");
        }
        Ok(expired.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agenda_core::time::{parse_day, parse_timestamp};
    use chrono::Duration;
    use uuid::Uuid;

    fn ts(s: &str) -> DateTime<Utc> {
        parse_timestamp(s).unwrap()
    }

    fn event_at(start: &str) -> EventData {
        let start = ts(start);
        EventData {
            title: format!("event at {start}"),
            date_start: start,
            date_end: start + Duration::minutes(15),
            description: String::new(),
            user_id: Uuid::nil(),
            date_post: ts("2022-10-01 00:00:00"),
        }
    }

    fn starts(events: &[Event]) -> Vec<i64> {
        events.iter().map(Event::start_ts).collect()
    }

    // ── CRUD ────────────────────────────────────────────────────

    #[tokio::test]
    async fn create_then_get_returns_same_fields() {
        let store = MemoryStore::new();
        let data = event_at("2022-10-10 00:02:15").with_description("quarterly review");

        let id = store.create(data.clone()).await.unwrap();
        let stored = store.get(id).await.unwrap();

        assert_eq!(stored.id, id);
        assert_eq!(stored.data, data);
        store.check_consistency().unwrap();
    }

    #[tokio::test]
    async fn create_rejects_busy_start() {
        let store = MemoryStore::new();
        let first = store.create(event_at("2022-10-10 00:02:15")).await.unwrap();

        let mut clash = event_at("2022-10-10 00:02:15");
        clash.title = "other".to_string();
        let err = store.create(clash).await.unwrap_err();

        assert!(matches!(err, StoreError::DateBusy(t) if t == ts("2022-10-10 00:02:15")));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(first).await.unwrap().data.title, "event at 2022-10-10 00:02:15 UTC");
    }

    #[tokio::test]
    async fn sub_second_starts_collide() {
        let store = MemoryStore::new();
        store.create(event_at("2022-10-10 00:02:15")).await.unwrap();

        let mut noisy = event_at("2022-10-10 00:02:15");
        noisy.date_start += Duration::milliseconds(400);
        assert!(matches!(store.create(noisy).await, Err(StoreError::DateBusy(_))));
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected_without_change() {
        let store = MemoryStore::new();
        let id = EventId::generate();
        store.insert_new(id, event_at("2022-10-10 00:02:15")).unwrap();

        let err = store.insert_new(id, event_at("2022-10-11 00:00:00")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(dup) if dup == id));
        assert_eq!(store.len(), 1);
        assert!(store.list_day("2022-10-11").await.unwrap().is_empty());
        store.check_consistency().unwrap();
    }

    #[tokio::test]
    async fn update_replaces_fields_and_keeps_id() {
        let store = MemoryStore::new();
        let id = store.create(event_at("2022-10-10 00:02:15")).await.unwrap();

        let moved = event_at("2022-10-12 09:00:00").with_description("moved");
        store.update(id, moved.clone()).await.unwrap();

        let stored = store.get(id).await.unwrap();
        assert_eq!(stored.data, moved);
        assert!(store.list_day("2022-10-10").await.unwrap().is_empty());
        assert_eq!(store.list_day("2022-10-12").await.unwrap().len(), 1);

        // the old start is free again
        store.create(event_at("2022-10-10 00:02:15")).await.unwrap();
        store.check_consistency().unwrap();
    }

    #[tokio::test]
    async fn update_keeping_own_start_is_allowed() {
        let store = MemoryStore::new();
        let id = store.create(event_at("2022-10-10 00:02:15")).await.unwrap();

        let mut renamed = event_at("2022-10-10 00:02:15");
        renamed.title = "renamed".to_string();
        store.update(id, renamed).await.unwrap();

        assert_eq!(store.get(id).await.unwrap().data.title, "renamed");
    }

    #[tokio::test]
    async fn update_onto_other_start_is_busy() {
        let store = MemoryStore::new();
        let a = store.create(event_at("2022-10-10 00:02:15")).await.unwrap();
        let b = store.create(event_at("2022-10-10 01:00:00")).await.unwrap();
        let before = store.get(b).await.unwrap();

        let err = store.update(b, event_at("2022-10-10 00:02:15")).await.unwrap_err();
        assert!(matches!(err, StoreError::DateBusy(_)));
        assert_eq!(store.get(b).await.unwrap(), before);
        assert_eq!(store.get(a).await.unwrap().date_start(), ts("2022-10-10 00:02:15"));
        store.check_consistency().unwrap();
    }

    #[tokio::test]
    async fn update_missing_is_not_found_even_when_start_is_busy() {
        let store = MemoryStore::new();
        store.create(event_at("2022-10-10 00:02:15")).await.unwrap();

        let missing = EventId::generate();
        let err = store.update(missing, event_at("2022-10-10 00:02:15")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn delete_twice_is_not_found() {
        let store = MemoryStore::new();
        let id = store.create(event_at("2022-10-10 00:02:15")).await.unwrap();

        store.delete(id).await.unwrap();
        assert!(matches!(store.delete(id).await, Err(StoreError::NotFound(_))));
        assert!(matches!(store.get(id).await, Err(StoreError::NotFound(_))));
        assert!(store.is_empty());
        store.check_consistency().unwrap();
    }

    // ── Listings ────────────────────────────────────────────────

    #[tokio::test]
    async fn day_week_month_scenarios() {
        let store = MemoryStore::new();
        for start in [
            "2022-10-10 00:02:15",
            "2022-10-10 23:59:59",
            "2022-10-16 12:00:00",
            "2022-10-17 00:00:00",
            "2022-11-09 08:00:00",
            "2022-11-10 00:00:00",
            "2022-10-09 23:59:59",
        ] {
            store.create(event_at(start)).await.unwrap();
        }

        let day = store.list_day("2022-10-10").await.unwrap();
        assert_eq!(
            starts(&day),
            vec![ts("2022-10-10 00:02:15").timestamp(), ts("2022-10-10 23:59:59").timestamp()]
        );

        let week = store.list_week("2022-10-10").await.unwrap();
        assert_eq!(week.len(), 3);
        assert_eq!(week.last().unwrap().date_start(), ts("2022-10-16 12:00:00"));

        let month = store.list_month("2022-10-10").await.unwrap();
        assert_eq!(month.len(), 5);
        assert_eq!(month.last().unwrap().date_start(), ts("2022-11-09 08:00:00"));
    }

    #[tokio::test]
    async fn october_listing_scenario() {
        let store = MemoryStore::new();
        store.create(event_at("2022-10-12 00:02:15")).await.unwrap();
        store.create(event_at("2022-10-10 00:04:15")).await.unwrap();
        store.create(event_at("2022-10-10 00:02:15")).await.unwrap();

        let day = store.list_day("2022-10-10").await.unwrap();
        assert_eq!(
            starts(&day),
            vec![ts("2022-10-10 00:02:15").timestamp(), ts("2022-10-10 00:04:15").timestamp()]
        );
        assert_eq!(store.list_week("2022-10-10").await.unwrap().len(), 3);
        assert!(store.list_month("2022-12-10").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn listings_are_sorted_by_start() {
        let store = MemoryStore::new();
        for start in ["2022-10-10 18:00:00", "2022-10-10 06:00:00", "2022-10-10 12:00:00"] {
            store.create(event_at(start)).await.unwrap();
        }

        let day = store.list_day("2022-10-10").await.unwrap();
        let mut sorted = starts(&day);
        sorted.sort();
        assert_eq!(starts(&day), sorted);
    }

    #[tokio::test]
    async fn list_rejects_malformed_date() {
        let store = MemoryStore::new();
        for date in ["10-10-2022", "2022-10-32", ""] {
            let err = store.list_day(date).await.unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::InvalidArgument);
        }
        assert!(store.list_week("bogus").await.is_err());
        assert!(store.list_month("bogus").await.is_err());
    }

    #[tokio::test]
    async fn empty_listing_is_empty_not_error() {
        let store = MemoryStore::new();
        assert!(store.list_month("2022-10-01").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn month_from_jan_31_clamps_to_feb_end() {
        let store = MemoryStore::new();
        store.create(event_at("2023-02-27 10:00:00")).await.unwrap();
        store.create(event_at("2023-02-28 10:00:00")).await.unwrap();

        let month = store
            .list_period(Period::Month, parse_day("2023-01-31").unwrap())
            .await
            .unwrap();
        assert_eq!(month.len(), 1);
        assert_eq!(month[0].date_start(), ts("2023-02-27 10:00:00"));
    }

    // ── Notifications & retention ───────────────────────────────

    #[tokio::test]
    async fn due_events_fall_inside_the_lead_window() {
        let store = MemoryStore::with_policy(NotifyPolicy::from_minutes(15));
        let now = ts("2022-10-10 23:50:00");

        store.create(event_at("2022-10-10 23:49:59")).await.unwrap(); // started
        store.create(event_at("2022-10-10 23:50:00")).await.unwrap(); // starting now
        store.create(event_at("2022-10-10 23:55:00")).await.unwrap();
        store.create(event_at("2022-10-11 00:05:00")).await.unwrap(); // next day, at the edge
        store.create(event_at("2022-10-11 00:05:01")).await.unwrap(); // too far

        let due = store.list_due_for_notification(now).await.unwrap();
        assert_eq!(
            starts(&due),
            vec![ts("2022-10-10 23:55:00").timestamp(), ts("2022-10-11 00:05:00").timestamp()]
        );
    }

    #[tokio::test]
    async fn delete_before_removes_strictly_older() {
        let store = MemoryStore::new();
        let cutoff = ts("2022-10-10 12:00:00");

        store.create(event_at("2021-01-01 00:00:00")).await.unwrap();
        store.create(event_at("2022-10-10 11:59:59")).await.unwrap();
        let kept_at_cutoff = store.create(event_at("2022-10-10 12:00:00")).await.unwrap();
        let kept_later = store.create(event_at("2022-10-11 00:00:00")).await.unwrap();

        assert_eq!(store.delete_before(cutoff).await.unwrap(), 2);
        assert_eq!(store.len(), 2);
        assert!(store.get(kept_at_cutoff).await.is_ok());
        assert!(store.get(kept_later).await.is_ok());
        store.check_consistency().unwrap();

        assert_eq!(store.delete_before(cutoff).await.unwrap(), 0);
    }

    // ── Concurrency ─────────────────────────────────────────────

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_on_distinct_starts_all_succeed() {
        let store = Arc::new(MemoryStore::new());
        let base = ts("2022-10-10 00:00:00");

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    let mut data = event_at("2022-10-10 00:00:00");
                    data.date_start = base + Duration::minutes(i);
                    store.create(data).await
                })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap());
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 10);
        assert_eq!(store.list_day("2022-10-10").await.unwrap().len(), 10);
        store.check_consistency().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_on_same_start_admit_exactly_one() {
        let store = Arc::new(MemoryStore::new());

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.create(event_at("2022-10-10 00:02:15")).await })
            })
            .collect();

        let mut ok = 0;
        let mut busy = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(StoreError::DateBusy(_)) => busy += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!((ok, busy), (1, 9));
        store.check_consistency().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_deletes_of_same_id_succeed_once() {
        let store = Arc::new(MemoryStore::new());
        let id = store.create(event_at("2022-10-10 00:02:15")).await.unwrap();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.delete(id).await })
            })
            .collect();

        let mut ok = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
        assert!(store.is_empty());
        store.check_consistency().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_deletes_over_two_ids_succeed_twice() {
        let store = Arc::new(MemoryStore::new());
        let a = store.create(event_at("2022-10-10 00:02:15")).await.unwrap();
        let b = store.create(event_at("2022-10-10 00:04:15")).await.unwrap();
        let kept = store.create(event_at("2022-10-12 00:02:15")).await.unwrap();

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let store = Arc::clone(&store);
                let id = if i % 2 == 0 { a } else { b };
                tokio::spawn(async move { store.delete(id).await })
            })
            .collect();

        let mut ok = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => ok += 1,
                Err(StoreError::NotFound(_)) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(ok, 2);
        assert_eq!(store.len(), 1);
        assert!(store.get(kept).await.is_ok());
        store.check_consistency().unwrap();
    }
}

//! PostgreSQL-backed event store.
//!
//! Uniqueness of `id` and `date_start` is enforced by the table constraints
//! in `sql/events.sql`, which must be applied before the store is opened.
//! Violations are mapped back to the store's error kinds by constraint name.
//! Every operation runs under a per-query deadline.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use agenda_core::config::{PostgresConfig, StorageConfig};
use agenda_core::time::Period;
use agenda_core::{Event, EventData, EventId};

use crate::contract::EventStore;
use crate::error::StoreError;
use crate::policy::NotifyPolicy;

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(3);

const PRIMARY_KEY: &str = "events_pkey";
const DATE_START_KEY: &str = "events_date_start_key";

const SELECT_FIELDS: &str =
    "SELECT id, title, date_start, date_end, description, user_id, date_post FROM events";

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    title: String,
    date_start: DateTime<Utc>,
    date_end: DateTime<Utc>,
    description: String,
    user_id: Uuid,
    date_post: DateTime<Utc>,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Event::new(
            row.id.into(),
            EventData {
                title: row.title,
                date_start: row.date_start,
                date_end: row.date_end,
                description: row.description,
                user_id: row.user_id,
                date_post: row.date_post,
            },
        )
    }
}

/// Map a unique-constraint violation to the matching store error.
fn map_write_error(err: sqlx::Error, id: EventId, date_start: DateTime<Utc>) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            match db.constraint() {
                Some(DATE_START_KEY) => return StoreError::DateBusy(date_start),
                Some(PRIMARY_KEY) => return StoreError::DuplicateId(id),
                _ => {}
            }
        }
    }
    StoreError::Backend(err)
}

pub struct PgStore {
    pool: PgPool,
    query_timeout: Duration,
    policy: NotifyPolicy,
}

impl PgStore {
    /// Open a pool and check that it answers.
    pub async fn connect(pg: &PostgresConfig, storage: &StorageConfig) -> Result<Self, StoreError> {
        let query_timeout = Duration::from_secs(storage.query_timeout_secs);
        let pool = PgPoolOptions::new()
            .max_connections(pg.max_connections)
            .acquire_timeout(query_timeout)
            .connect(&pg.connection_string())
            .await?;
        sqlx::query("SELECT 1").execute(&pool).await?;
        info!("PostgreSQL connected: {}", pg.host);

        Ok(Self::from_pool(pool)
            .with_query_timeout(query_timeout)
            .with_policy(NotifyPolicy::from_minutes(storage.notify_lead_minutes)))
    }

    /// Wrap an existing pool. Schema is assumed to be in place.
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            policy: NotifyPolicy::default(),
        }
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn with_policy(mut self, policy: NotifyPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn deadline<F: Future>(&self, op: F) -> Result<F::Output, StoreError> {
        tokio::time::timeout(self.query_timeout, op)
            .await
            .map_err(|_| StoreError::Timeout(self.query_timeout))
    }

    async fn fetch_range(
        &self,
        sql: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Event>, StoreError> {
        let query = sqlx::query_as::<_, EventRow>(sql).bind(from).bind(to);
        let rows = self.deadline(query.fetch_all(&self.pool)).await??;
        Ok(rows.into_iter().map(Event::from).collect())
    }
}

#[async_trait]
impl EventStore for PgStore {
    async fn create(&self, data: EventData) -> Result<EventId, StoreError> {
        let data = data.normalized();
        let id = EventId::generate();

        let query = sqlx::query(
            "INSERT INTO events (id, title, date_start, date_end, description, user_id, date_post) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(id.as_uuid())
        .bind(&data.title)
        .bind(data.date_start)
        .bind(data.date_end)
        .bind(&data.description)
        .bind(data.user_id)
        .bind(data.date_post);

        self.deadline(query.execute(&self.pool))
            .await?
            .map_err(|e| map_write_error(e, id, data.date_start))?;

        debug!(id = %id, "event created");
        Ok(id)
    }

    async fn update(&self, id: EventId, data: EventData) -> Result<(), StoreError> {
        let data = data.normalized();

        let query = sqlx::query(
            "UPDATE events SET title = $2, date_start = $3, date_end = $4, \
             description = $5, user_id = $6, date_post = $7 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(&data.title)
        .bind(data.date_start)
        .bind(data.date_end)
        .bind(&data.description)
        .bind(data.user_id)
        .bind(data.date_post);

        let result = self
            .deadline(query.execute(&self.pool))
            .await?
            .map_err(|e| map_write_error(e, id, data.date_start))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        debug!(id = %id, "event updated");
        Ok(())
    }

    async fn delete(&self, id: EventId) -> Result<(), StoreError> {
        let query = sqlx::query("DELETE FROM events WHERE id = $1").bind(id.as_uuid());
        let result = self.deadline(query.execute(&self.pool)).await??;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        debug!(id = %id, "event deleted");
        Ok(())
    }

    async fn get(&self, id: EventId) -> Result<Event, StoreError> {
        let sql = format!("{SELECT_FIELDS} WHERE id = $1");
        let query = sqlx::query_as::<_, EventRow>(&sql).bind(id.as_uuid());
        let row = self.deadline(query.fetch_optional(&self.pool)).await??;

        row.map(Event::from).ok_or(StoreError::NotFound(id))
    }

    async fn list_period(&self, period: Period, start: NaiveDate) -> Result<Vec<Event>, StoreError> {
        let (from, to) = period.instant_window(start);
        let sql = format!("{SELECT_FIELDS} WHERE date_start >= $1 AND date_start < $2 ORDER BY date_start");
        self.fetch_range(&sql, from, to).await
    }

    async fn list_due_for_notification(&self, now: DateTime<Utc>) -> Result<Vec<Event>, StoreError> {
        let (after, until) = self.policy.due_window(now);
        let sql = format!("{SELECT_FIELDS} WHERE date_start > $1 AND date_start <= $2 ORDER BY date_start");
        self.fetch_range(&sql, after, until).await
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let query = sqlx::query("DELETE FROM events WHERE date_start < $1").bind(cutoff);
        let removed = self.deadline(query.execute(&self.pool)).await??.rows_affected();

        if removed > 0 {
            debug!(count = removed, cutoff = %cutoff, "outdated events removed");
        }
        Ok(removed)
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("PostgreSQL pool closed");
    }
}

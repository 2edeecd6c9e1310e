//! Periodic notification and retention loop.
//!
//! Every poll interval the scheduler publishes a reminder for each event the
//! store reports as due, then deletes events older than the retention period.
//! The two steps are independent: a failure in one is logged and the other
//! still runs. Nothing a tick does can stop the loop; only the shutdown
//! signal can.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info};

use agenda_core::config::SchedulerSettings;
use agenda_core::{ConfigError, Event};
use agenda_queue::{Notification, NotificationPublisher, QueueError};
use agenda_storage::EventStore;

use crate::error::SchedulerError;

/// Default deadline shared by all publishes of one tick.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    /// Events that started longer ago than this are deleted.
    pub retention: chrono::Duration,
    pub publish_timeout: Duration,
}

impl SchedulerConfig {
    pub fn new(poll_secs: u64, retention_days: u32) -> Result<Self, ConfigError> {
        if poll_secs == 0 {
            return Err(ConfigError::NotPositive {
                key: "POLL_TIME_SECONDS",
                value: 0,
            });
        }
        if retention_days == 0 {
            return Err(ConfigError::NotPositive {
                key: "OUTDATED_EVENT_DAYS",
                value: 0,
            });
        }
        Ok(Self {
            poll_interval: Duration::from_secs(poll_secs),
            retention: chrono::Duration::days(i64::from(retention_days)),
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
        })
    }

    pub fn from_settings(settings: &SchedulerSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self::new(settings.poll_time_seconds, settings.outdated_event_days)?
            .with_publish_timeout(Duration::from_millis(settings.publish_timeout_ms)))
    }

    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }
}

/// Outcome of a single tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Notifications handed to the broker.
    pub notified: usize,
    /// Outdated events deleted.
    pub removed: u64,
}

pub struct Scheduler {
    store: Arc<dyn EventStore>,
    publisher: Arc<dyn NotificationPublisher>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn EventStore>,
        publisher: Arc<dyn NotificationPublisher>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            publisher,
            config,
        }
    }

    /// Tick every poll interval until `shutdown` turns `true` or its sender
    /// is dropped. The first tick fires one interval after start.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_secs = self.config.poll_interval.as_secs(),
            retention_days = self.config.retention.num_days(),
            "scheduler started"
        );
        if *shutdown.borrow() {
            info!("scheduler stopped before first tick");
            return;
        }

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        // Skip the immediate first tick
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick(Utc::now()).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("scheduler stopped");
    }

    /// Run both steps once, as of `now`. Errors are logged, not returned.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();

        match self.send_notifications(now).await {
            Ok(sent) => report.notified = sent,
            Err(e) => error!(error = %e, "failed to send notifications"),
        }

        match self.remove_outdated(now).await {
            Ok(removed) => report.removed = removed,
            Err(e) => error!(error = %e, "failed to remove outdated events"),
        }

        report
    }

    async fn send_notifications(&self, now: DateTime<Utc>) -> Result<usize, SchedulerError> {
        let due = self.store.list_due_for_notification(now).await?;
        if due.is_empty() {
            return Ok(0);
        }
        info!(count = due.len(), "notifications to send");

        let mut sent = 0;
        let deadline = self.config.publish_timeout;
        let outcome = tokio::time::timeout(deadline, self.publish_batch(&due, &mut sent)).await;
        match outcome {
            Ok(Ok(())) => Ok(sent),
            Ok(Err(e)) => {
                error!(sent, pending = due.len() - sent, "publish failed, batch aborted");
                Err(e.into())
            }
            Err(_) => {
                error!(sent, pending = due.len() - sent, "publish deadline exceeded, batch aborted");
                Err(QueueError::Timeout(deadline.as_millis() as u64).into())
            }
        }
    }

    async fn publish_batch(&self, due: &[Event], sent: &mut usize) -> Result<(), QueueError> {
        for event in due {
            let notification = Notification::from(event);
            self.publisher.publish(&notification).await?;
            debug!(id = %notification.id, "notification published");
            *sent += 1;
        }
        Ok(())
    }

    async fn remove_outdated(&self, now: DateTime<Utc>) -> Result<u64, SchedulerError> {
        let cutoff = now - self.config.retention;
        let removed = self.store.delete_before(cutoff).await?;
        if removed > 0 {
            info!(count = removed, cutoff = %cutoff, "outdated events removed");
        }
        Ok(removed)
    }
}

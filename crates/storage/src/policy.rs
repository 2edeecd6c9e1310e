use chrono::{DateTime, Duration, Utc};

/// Decides which events are due for a reminder.
///
/// An event is due at `now` when its start lies within the lead window
/// ahead of `now`: `date_start - lead <= now < date_start`. Events that
/// already started are never due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifyPolicy {
    lead: Duration,
}

impl NotifyPolicy {
    pub const DEFAULT_LEAD_MINUTES: u32 = 15;

    pub fn new(lead: Duration) -> Self {
        Self { lead }
    }

    pub fn from_minutes(minutes: u32) -> Self {
        Self::new(Duration::minutes(i64::from(minutes)))
    }

    pub fn lead(&self) -> Duration {
        self.lead
    }

    pub fn is_due(&self, date_start: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let (after, until) = self.due_window(now);
        date_start > after && date_start <= until
    }

    /// Start instants due at `now`, as the interval `(now, now + lead]`.
    pub fn due_window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (now, now + self.lead)
    }
}

impl Default for NotifyPolicy {
    fn default() -> Self {
        Self::from_minutes(Self::DEFAULT_LEAD_MINUTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agenda_core::time::parse_timestamp;

    #[test]
    fn due_window_boundaries() {
        let policy = NotifyPolicy::default();
        let now = parse_timestamp("2022-10-10 00:00:00").unwrap();

        assert!(!policy.is_due(now, now), "starting now is no longer due");
        assert!(policy.is_due(now + Duration::seconds(1), now));
        assert!(policy.is_due(now + Duration::minutes(15), now));
        assert!(!policy.is_due(now + Duration::minutes(15) + Duration::seconds(1), now));
        assert!(!policy.is_due(now - Duration::minutes(1), now));
    }

    #[test]
    fn zero_lead_is_never_due() {
        let policy = NotifyPolicy::from_minutes(0);
        let now = parse_timestamp("2022-10-10 00:00:00").unwrap();
        assert!(!policy.is_due(now, now));
        assert!(!policy.is_due(now + Duration::seconds(1), now));
    }
}

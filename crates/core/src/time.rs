//! Calendar arithmetic shared by every store backend.
//!
//! Events are keyed by their UTC start instant. Range queries work on
//! half-open `[start, end)` windows of calendar days, so the day/week/month
//! boundaries live here rather than in each backend.

use std::fmt;

use chrono::{DateTime, Days, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};

use crate::error::TimeError;

/// Text layout for timestamps, second precision.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Text layout for calendar days.
pub const DAY_FORMAT: &str = "%Y-%m-%d";

pub fn parse_day(input: &str) -> Result<NaiveDate, TimeError> {
    NaiveDate::parse_from_str(input.trim(), DAY_FORMAT).map_err(|_| TimeError::InvalidDay {
        input: input.to_string(),
    })
}

/// Parse a `YYYY-MM-DD HH:MM:SS` timestamp, interpreted as UTC.
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, TimeError> {
    NaiveDateTime::parse_from_str(input.trim(), TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| TimeError::InvalidTimestamp {
            input: input.to_string(),
        })
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Drop sub-second precision. Stored timestamps are always whole seconds,
/// so two starts within the same second collide.
pub fn truncate_to_second(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_nanosecond(0).unwrap_or(ts)
}

/// Midnight UTC at the beginning of `day`.
pub fn day_start(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

/// Add one calendar month.
///
/// Month-end dates clamp to the last day of the following month
/// (Jan 31 -> Feb 28/29), never overflowing into the month after.
pub fn add_month(day: NaiveDate) -> NaiveDate {
    day.checked_add_months(Months::new(1))
        .unwrap_or(NaiveDate::MAX)
}

/// Listing granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    Day,
    Week,
    Month,
}

impl Period {
    /// Half-open window of calendar days `[start, end)` covered by this period.
    pub fn window(self, start: NaiveDate) -> (NaiveDate, NaiveDate) {
        let end = match self {
            Period::Day => start.checked_add_days(Days::new(1)),
            Period::Week => start.checked_add_days(Days::new(7)),
            Period::Month => Some(add_month(start)),
        };
        (start, end.unwrap_or(NaiveDate::MAX))
    }

    /// Same window expressed as UTC instants.
    pub fn instant_window(self, start: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let (from, to) = self.window(start);
        (day_start(from), day_start(to))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Day => write!(f, "day"),
            Period::Week => write!(f, "week"),
            Period::Month => write!(f, "month"),
        }
    }
}

/// Serde adapter for `DateTime<Utc>` in [`TIMESTAMP_FORMAT`].
pub mod timestamp_format {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use agenda_core::time::format_timestamp;
use agenda_core::{EventId, TimeError};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("duplicate event id in storage: {0}")]
    DuplicateId(EventId),

    #[error("event not found in storage: {0}")]
    NotFound(EventId),

    #[error("event date start is busy: {}", format_timestamp(.0))]
    DateBusy(DateTime<Utc>),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("storage operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("database error: {0}")]
    Backend(#[from] sqlx::Error),
}

impl From<TimeError> for StoreError {
    fn from(e: TimeError) -> Self {
        StoreError::InvalidArgument(e.to_string())
    }
}

/// Backend-independent classification of a [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    DuplicateId,
    NotFound,
    DateBusy,
    InvalidArgument,
    Timeout,
    Backend,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::DuplicateId(_) => ErrorKind::DuplicateId,
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::DateBusy(_) => ErrorKind::DateBusy,
            StoreError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            StoreError::Timeout(_) => ErrorKind::Timeout,
            StoreError::Backend(_) => ErrorKind::Backend,
        }
    }
}

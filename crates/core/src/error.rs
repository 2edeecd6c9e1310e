use thiserror::Error;

/// Failure to read a calendar day or timestamp from text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeError {
    #[error("invalid date '{input}': expected YYYY-MM-DD")]
    InvalidDay { input: String },

    #[error("invalid timestamp '{input}': expected YYYY-MM-DD HH:MM:SS")]
    InvalidTimestamp { input: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be > 0 (got {value})")]
    NotPositive { key: &'static str, value: u64 },

    #[error("unknown storage mode '{0}': expected 'in-memory' or 'sql'")]
    UnknownStorageMode(String),

    #[error("{key} must not be empty")]
    Empty { key: &'static str },
}

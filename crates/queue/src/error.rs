//! Queue error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("envelope encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("envelope decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u16),

    #[error("queue closed")]
    Closed,

    #[error("timeout after {0}ms")]
    Timeout(u64),

    #[error("zeromq error: {0}")]
    Zmq(#[from] zeromq::ZmqError),

    #[error("transport error: {0}")]
    Transport(String),
}

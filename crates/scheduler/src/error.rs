use thiserror::Error;

use agenda_queue::QueueError;
use agenda_storage::StoreError;

/// Failure of one scheduler step. Logged by the loop, never fatal.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
}

pub mod error;
pub mod scheduler;

pub use error::SchedulerError;
pub use scheduler::{Scheduler, SchedulerConfig, TickReport};

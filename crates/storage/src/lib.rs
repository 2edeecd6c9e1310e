pub mod backend;
pub mod contract;
pub mod error;
pub mod memory;
pub mod policy;
pub mod postgres;

pub use backend::open_store;
pub use contract::EventStore;
pub use error::{ErrorKind, StoreError};
pub use memory::MemoryStore;
pub use policy::NotifyPolicy;
pub use postgres::PgStore;

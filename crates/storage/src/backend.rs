use std::sync::Arc;

use tracing::info;

use agenda_core::config::{PostgresConfig, StorageConfig, StorageMode};

use crate::contract::EventStore;
use crate::error::StoreError;
use crate::memory::MemoryStore;
use crate::policy::NotifyPolicy;
use crate::postgres::PgStore;

/// Open the event store selected by `mode`.
///
/// Callers only see the [`EventStore`] abstraction; which backend sits
/// behind it is a startup decision.
pub async fn open_store(
    mode: StorageMode,
    storage: &StorageConfig,
    postgres: &PostgresConfig,
) -> Result<Arc<dyn EventStore>, StoreError> {
    let policy = NotifyPolicy::from_minutes(storage.notify_lead_minutes);
    match mode {
        StorageMode::Memory => {
            info!("Storage: in-memory event store");
            Ok(Arc::new(MemoryStore::with_policy(policy)))
        }
        StorageMode::Sql => {
            let store = PgStore::connect(postgres, storage).await?;
            info!("Storage: PostgreSQL event store at {}/{}", postgres.host, postgres.database);
            Ok(Arc::new(store))
        }
    }
}

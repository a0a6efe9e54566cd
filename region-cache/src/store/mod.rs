//! Store backends implementing `RemoteStore`
//!
//! - [`InMemoryStore`]: process-local store with TTL, for tests and development
//! - [`RedisStore`]: Redis server over the synchronous `redis` client

pub mod memory;
pub mod redis;

pub use self::memory::InMemoryStore;
pub use self::redis::RedisStore;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{StoreBackend, StoreConfig};
use crate::core::RemoteStore;
use crate::core::error::StoreError;

/// Build the store described by `config`
pub fn build_store(config: &StoreConfig) -> Result<Arc<dyn RemoteStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryStore::new())),
        StoreBackend::Redis => {
            let store = RedisStore::open(
                &config.url,
                Duration::from_millis(config.connect_timeout_ms),
                Duration::from_millis(config.io_timeout_ms),
            )?
            .with_scan_count(config.scan_count)
            .with_max_idle(config.max_idle_connections);
            Ok(Arc::new(store))
        }
    }
}

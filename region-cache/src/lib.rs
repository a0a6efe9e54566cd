//! Region-scoped second-level cache for query results.
//!
//! A [`RegionCache`] sits between a query-execution framework and a remote
//! key-value store. It implements the framework-facing [`QueryCache`]
//! capability, guards reads and removals with a per-region [`RegionLock`]
//! taken without waiting, and keeps every store failure away from the query
//! path.

pub mod config;
pub mod core;
pub mod logging;
pub mod store;

// Re-export commonly used types
pub use crate::config::{CacheConfig, LoggingConfig, RegionConfig, StoreBackend, StoreConfig};
pub use crate::core::{
    CacheError, CacheStats, ENTRY_TTL_SECS, LockError, LockMode, LockStats, Lookup, NoopCache,
    QueryCache, RegionCache, RegionCacheFactory, RegionLock, RegionReadGuard, RegionWriteGuard,
    RemoteStore, Result, SizeScope, StoreError, StoreResult, WriteOutcome,
};
pub use logging::init_logging;
pub use store::{InMemoryStore, RedisStore, build_store};

pub mod adapter;
pub mod cache;
pub mod error;
pub mod factory;
pub mod region_lock;
pub mod store;
pub mod types;

pub use adapter::RegionCache;
pub use cache::{NoopCache, QueryCache};
pub use error::{CacheError, LockError, LockMode, Result, StoreError};
pub use factory::RegionCacheFactory;
pub use region_lock::{LockStats, RegionLock, RegionReadGuard, RegionWriteGuard};
pub use store::{RemoteStore, StoreResult, escape_pattern};
pub use types::{CacheStats, ENTRY_TTL_SECS, Lookup, SizeScope, WriteOutcome};

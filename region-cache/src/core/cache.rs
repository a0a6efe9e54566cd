use serde_json::Value;
use std::sync::Arc;

use super::error::{CacheError, Result};
use super::region_lock::RegionLock;

/// Cache capability consumed by the query framework
///
/// Implementations never surface store failures: reads degrade to a miss and
/// writes to a no-op.
pub trait QueryCache: Send + Sync {
    /// Region id of this cache
    fn identifier(&self) -> &str;

    /// Store a query result. `None` (or JSON `null`) leaves the cache untouched.
    fn put(&self, key: &str, value: Option<Value>);

    /// Cached result for `key`, `None` on a miss
    fn get(&self, key: &str) -> Option<Value>;

    fn remove(&self, key: &str);

    /// Drop every entry of the region
    fn clear(&self);

    fn size(&self) -> u64;

    /// Region lock, for callers that coordinate with cache operations
    fn lock_handle(&self) -> Arc<RegionLock>;
}

/// Reject region ids that cannot name a region
pub(crate) fn validate_region_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(CacheError::InvalidArgument(
            "Cache instances require an ID".to_string(),
        ));
    }
    Ok(())
}

/// Cache that stores nothing: every read misses and writes are ignored
#[derive(Debug)]
pub struct NoopCache {
    id: String,
    lock: Arc<RegionLock>,
}

impl NoopCache {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        validate_region_id(&id)?;
        Ok(Self {
            id,
            lock: Arc::new(RegionLock::new()),
        })
    }
}

impl QueryCache for NoopCache {
    fn identifier(&self) -> &str {
        &self.id
    }

    fn put(&self, _key: &str, _value: Option<Value>) {}

    fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    fn remove(&self, _key: &str) {}

    fn clear(&self) {}

    fn size(&self) -> u64 {
        0
    }

    fn lock_handle(&self) -> Arc<RegionLock> {
        Arc::clone(&self.lock)
    }
}

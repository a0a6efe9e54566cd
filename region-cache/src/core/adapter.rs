use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::cache::{QueryCache, validate_region_id};
use super::error::{Result, StoreError};
use super::region_lock::RegionLock;
use super::store::{RemoteStore, StoreResult, escape_pattern};
use super::types::{CacheStats, ENTRY_TTL_SECS, Lookup, SizeScope, WriteOutcome};

/// Second-level cache region backed by a remote key-value store
///
/// Entries live under `"{id}:{key}"` in the store, with `%` and `:` in the
/// id percent-encoded so the first `:` of a stored key always ends the region
/// id. Reads take the region
/// lock in read mode and removals take it in write mode, both without
/// waiting: a contended operation is skipped rather than stalled. Store
/// failures are logged and contained, so a broken store only turns the cache
/// off.
pub struct RegionCache {
    id: String,
    prefix: String,
    pattern: String,
    lock: Arc<RegionLock>,
    store: Arc<dyn RemoteStore>,
    size_scope: SizeScope,
    stats: RwLock<CacheStats>,
}

impl RegionCache {
    /// Create a cache for region `id` on top of `store`
    ///
    /// Fails with `CacheError::InvalidArgument` when `id` is empty.
    pub fn new(id: impl Into<String>, store: Arc<dyn RemoteStore>) -> Result<Self> {
        let id = id.into();
        validate_region_id(&id)?;

        info!("Initializing cache region '{}'", id);

        let namespace = encode_region_id(&id);
        Ok(Self {
            prefix: format!("{}:", namespace),
            pattern: format!("{}:*", escape_pattern(&namespace)),
            id,
            lock: Arc::new(RegionLock::new()),
            store,
            size_scope: SizeScope::default(),
            stats: RwLock::new(CacheStats::default()),
        })
    }

    pub fn with_size_scope(mut self, size_scope: SizeScope) -> Self {
        self.size_scope = size_scope;
        self
    }

    /// Store key of a framework key
    pub fn entry_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Store glob matching every entry of this region
    pub fn region_pattern(&self) -> &str {
        &self.pattern
    }

    pub fn size_scope(&self) -> SizeScope {
        self.size_scope
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.read().clone()
    }

    /// Write `value` with the fixed entry TTL. Takes no lock.
    pub fn try_put(&self, key: &str, value: Option<Value>) -> WriteOutcome {
        let value = match value {
            None | Some(Value::Null) => {
                debug!("PUT region={} key={} skipped: no value", self.id, key);
                return WriteOutcome::Unchanged;
            }
            Some(value) => value,
        };

        let entry_key = self.entry_key(key);
        match self.store.set_with_ttl(&entry_key, &value, ENTRY_TTL_SECS) {
            Ok(()) => {
                debug!("PUT region={} key={} ttl={}", self.id, key, ENTRY_TTL_SECS);
                self.stats.write().puts += 1;
                WriteOutcome::Applied { keys: 1 }
            }
            Err(err) => WriteOutcome::Failed(self.contain("put", key, err)),
        }
    }

    /// Read `key` under a non-blocking read lock
    pub fn lookup(&self, key: &str) -> Lookup {
        let Some(_guard) = self.lock.try_read() else {
            self.lock_busy("get", key);
            return Lookup::LockBusy;
        };

        match self.store.get(&self.entry_key(key)) {
            Ok(Some(value)) => {
                debug!("GET region={} key={} hit", self.id, key);
                self.stats.write().hits += 1;
                Lookup::Hit(value)
            }
            Ok(None) => {
                debug!("GET region={} key={} miss", self.id, key);
                self.stats.write().misses += 1;
                Lookup::Miss
            }
            Err(err) => Lookup::Failed(self.contain("get", key, err)),
        }
    }

    /// Delete `key` under a non-blocking write lock
    pub fn try_remove(&self, key: &str) -> WriteOutcome {
        let Some(_guard) = self.lock.try_write() else {
            self.lock_busy("remove", key);
            return WriteOutcome::LockBusy;
        };

        match self.store.delete(&self.entry_key(key)) {
            Ok(()) => {
                debug!("REMOVE region={} key={}", self.id, key);
                self.stats.write().removes += 1;
                WriteOutcome::Applied { keys: 1 }
            }
            Err(err) => WriteOutcome::Failed(self.contain("remove", key, err)),
        }
    }

    /// Delete every key of the region
    ///
    /// Keys are listed first; the write lock is only attempted when there is
    /// something to delete.
    pub fn try_clear(&self) -> WriteOutcome {
        let keys = match self.store.keys_matching(&self.pattern) {
            Ok(keys) => keys,
            Err(err) => return WriteOutcome::Failed(self.contain("clear", &self.pattern, err)),
        };

        if keys.is_empty() {
            debug!("CLEAR region={} skipped: no keys", self.id);
            return WriteOutcome::Unchanged;
        }

        let Some(_guard) = self.lock.try_write() else {
            self.lock_busy("clear", &self.pattern);
            return WriteOutcome::LockBusy;
        };

        match self.store.delete_many(&keys) {
            Ok(()) => {
                debug!("CLEAR region={} deleted={}", self.id, keys.len());
                self.stats.write().clears += 1;
                WriteOutcome::Applied { keys: keys.len() }
            }
            Err(err) => WriteOutcome::Failed(self.contain("clear", &self.pattern, err)),
        }
    }

    /// Entry count according to the configured `SizeScope`
    pub fn try_size(&self) -> StoreResult<u64> {
        match self.size_scope {
            SizeScope::Store => self.store.approximate_count(),
            SizeScope::Region => self
                .store
                .keys_matching(&self.pattern)
                .map(|keys| keys.len() as u64),
        }
    }

    fn lock_busy(&self, op: &str, key: &str) {
        debug!("{} region={} key={} skipped: lock busy", op, self.id, key);
        self.stats.write().lock_busy += 1;
    }

    fn contain(&self, op: &str, key: &str, err: StoreError) -> StoreError {
        warn!("Cache {} failed for region={} key={}: {}", op, self.id, key, err);
        self.stats.write().store_errors += 1;
        err
    }
}

/// Region id as it appears in store keys: `%` and `:` are percent-encoded
fn encode_region_id(id: &str) -> String {
    let mut encoded = String::with_capacity(id.len());
    for c in id.chars() {
        match c {
            '%' => encoded.push_str("%25"),
            ':' => encoded.push_str("%3A"),
            _ => encoded.push(c),
        }
    }
    encoded
}

impl fmt::Debug for RegionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionCache")
            .field("id", &self.id)
            .field("pattern", &self.pattern)
            .field("size_scope", &self.size_scope)
            .finish_non_exhaustive()
    }
}

impl QueryCache for RegionCache {
    fn identifier(&self) -> &str {
        &self.id
    }

    fn put(&self, key: &str, value: Option<Value>) {
        let _ = self.try_put(key, value);
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.lookup(key).into_value()
    }

    fn remove(&self, key: &str) {
        let _ = self.try_remove(key);
    }

    fn clear(&self) {
        let _ = self.try_clear();
    }

    fn size(&self) -> u64 {
        self.try_size().unwrap_or_else(|err| {
            self.contain("size", &self.pattern, err);
            0
        })
    }

    fn lock_handle(&self) -> Arc<RegionLock> {
        Arc::clone(&self.lock)
    }
}

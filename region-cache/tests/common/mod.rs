// Shared test stores: fault injection and latency simulation

#![allow(dead_code)]

use parking_lot::Mutex;
use region_cache::{InMemoryStore, RemoteStore, StoreError, StoreResult};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Store that fails every call while `failing` is set
#[derive(Default)]
pub struct FaultyStore {
    inner: InMemoryStore,
    failing: AtomicBool,
    calls: Mutex<Vec<&'static str>>,
}

impl FaultyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    fn check(&self, op: &'static str) -> StoreResult<()> {
        self.calls.lock().push(op);
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Connection(format!("injected failure in {}", op)))
        } else {
            Ok(())
        }
    }
}

impl RemoteStore for FaultyStore {
    fn set_with_ttl(&self, key: &str, value: &Value, ttl_secs: u64) -> StoreResult<()> {
        self.check("set_with_ttl")?;
        self.inner.set_with_ttl(key, value, ttl_secs)
    }

    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        self.check("get")?;
        self.inner.get(key)
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.check("delete")?;
        self.inner.delete(key)
    }

    fn delete_many(&self, keys: &[String]) -> StoreResult<()> {
        self.check("delete_many")?;
        self.inner.delete_many(keys)
    }

    fn keys_matching(&self, pattern: &str) -> StoreResult<Vec<String>> {
        self.check("keys_matching")?;
        self.inner.keys_matching(pattern)
    }

    fn approximate_count(&self) -> StoreResult<u64> {
        self.check("approximate_count")?;
        self.inner.approximate_count()
    }
}

/// Store that sleeps before every call
pub struct SlowStore {
    inner: InMemoryStore,
    latency: Duration,
}

impl SlowStore {
    pub fn new(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryStore::new(),
            latency,
        })
    }

    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }
}

impl RemoteStore for SlowStore {
    fn set_with_ttl(&self, key: &str, value: &Value, ttl_secs: u64) -> StoreResult<()> {
        std::thread::sleep(self.latency);
        self.inner.set_with_ttl(key, value, ttl_secs)
    }

    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        std::thread::sleep(self.latency);
        self.inner.get(key)
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        std::thread::sleep(self.latency);
        self.inner.delete(key)
    }

    fn delete_many(&self, keys: &[String]) -> StoreResult<()> {
        std::thread::sleep(self.latency);
        self.inner.delete_many(keys)
    }

    fn keys_matching(&self, pattern: &str) -> StoreResult<Vec<String>> {
        std::thread::sleep(self.latency);
        self.inner.keys_matching(pattern)
    }

    fn approximate_count(&self) -> StoreResult<u64> {
        std::thread::sleep(self.latency);
        self.inner.approximate_count()
    }
}

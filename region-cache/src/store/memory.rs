use parking_lot::RwLock;
use radix_trie::{Trie, TrieCommon};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::core::error::StoreError;
use crate::core::store::{RemoteStore, StoreResult};

/// Stored value with its expiry instant
#[derive(Debug, Clone)]
struct StoredValue {
    value: Value,
    expires_at: Instant,
}

impl StoredValue {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Process-local store using a radix trie keyed by entry key
///
/// Expired entries are hidden from every read and dropped lazily, or in bulk
/// by `purge_expired()`. Clones share the same data.
#[derive(Clone)]
pub struct InMemoryStore {
    data: Arc<RwLock<Trie<String, StoredValue>>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(Trie::new())),
        }
    }

    /// Remaining time-to-live of a live key
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.data
            .read()
            .get(key)
            .filter(|stored| !stored.is_expired(now))
            .map(|stored| stored.expires_at - now)
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut data = self.data.write();

        let expired: Vec<String> = data
            .iter()
            .filter(|(_, stored)| stored.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            data.remove(key);
        }
        if !expired.is_empty() {
            debug!("Purged {} expired keys", expired.len());
        }
        expired.len()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.data
            .read()
            .values()
            .filter(|stored| !stored.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RemoteStore for InMemoryStore {
    fn set_with_ttl(&self, key: &str, value: &Value, ttl_secs: u64) -> StoreResult<()> {
        if ttl_secs == 0 {
            return Err(StoreError::Command(
                "invalid expire time in 'set' command".to_string(),
            ));
        }

        let stored = StoredValue {
            value: value.clone(),
            expires_at: Instant::now() + Duration::from_secs(ttl_secs),
        };
        self.data.write().insert(key.to_string(), stored);
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let now = Instant::now();
        {
            let data = self.data.read();
            match data.get(key) {
                None => return Ok(None),
                Some(stored) if !stored.is_expired(now) => return Ok(Some(stored.value.clone())),
                Some(_) => {}
            }
        }

        let mut data = self.data.write();
        if data.get(key).is_some_and(|stored| stored.is_expired(now)) {
            debug!("Key expired: {}", key);
            data.remove(key);
        }
        Ok(None)
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.data.write().remove(key);
        Ok(())
    }

    fn delete_many(&self, keys: &[String]) -> StoreResult<()> {
        let mut data = self.data.write();
        for key in keys {
            data.remove(key);
        }
        Ok(())
    }

    fn keys_matching(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let matcher = compile_pattern(pattern)?;
        let prefix = literal_prefix(pattern);
        let now = Instant::now();

        let data = self.data.read();
        let mut keys = Vec::new();
        let mut collect = |key: &String, stored: &StoredValue| {
            if !stored.is_expired(now) && matcher.matches(key) {
                keys.push(key.clone());
            }
        };

        if prefix.is_empty() {
            data.iter().for_each(|(key, stored)| collect(key, stored));
        } else if let Some(subtrie) = data.get_raw_descendant(prefix) {
            subtrie.iter().for_each(|(key, stored)| collect(key, stored));
        }

        Ok(keys)
    }

    fn approximate_count(&self) -> StoreResult<u64> {
        Ok(self.len() as u64)
    }
}

/// Translate store glob syntax into a `glob::Pattern`
fn compile_pattern(pattern: &str) -> StoreResult<glob::Pattern> {
    let mut translated = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => translated.push_str(&glob::Pattern::escape(&escaped.to_string())),
                None => translated.push_str(&glob::Pattern::escape("\\")),
            },
            '[' => {
                translated.push('[');
                if chars.peek() == Some(&'^') {
                    chars.next();
                    translated.push('!');
                }
            }
            _ => translated.push(c),
        }
    }

    glob::Pattern::new(&translated)
        .map_err(|err| StoreError::Command(format!("invalid pattern '{}': {}", pattern, err)))
}

/// Leading part of a pattern without metacharacters
fn literal_prefix(pattern: &str) -> &str {
    let end = pattern
        .find(['*', '?', '[', '\\'])
        .unwrap_or(pattern.len());
    &pattern[..end]
}

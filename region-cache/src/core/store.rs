use serde_json::Value;

use super::error::StoreError;

/// Result type for store calls
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Narrow client contract of the remote key-value store
///
/// All calls are synchronous from the caller's point of view. Timeouts are
/// the implementation's concern. Patterns use the store glob syntax:
/// `*`, `?`, `[...]` and `\` to escape a metacharacter.
pub trait RemoteStore: Send + Sync {
    /// Write `value` under `key`, expiring after `ttl_secs`
    fn set_with_ttl(&self, key: &str, value: &Value, ttl_secs: u64) -> StoreResult<()>;

    /// Read the value under `key`, `None` if absent or expired
    fn get(&self, key: &str) -> StoreResult<Option<Value>>;

    fn delete(&self, key: &str) -> StoreResult<()>;

    fn delete_many(&self, keys: &[String]) -> StoreResult<()>;

    /// List the keys matching a glob pattern
    fn keys_matching(&self, pattern: &str) -> StoreResult<Vec<String>>;

    /// Approximate number of keys in the whole store
    fn approximate_count(&self) -> StoreResult<u64>;
}

/// Escape store glob metacharacters so `raw` matches only itself
pub fn escape_pattern(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

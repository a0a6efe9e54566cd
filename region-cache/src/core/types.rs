use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::StoreError;

/// Time-to-live applied to every cached entry (12 hours)
pub const ENTRY_TTL_SECS: u64 = 43_200;

/// What `size()` counts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SizeScope {
    /// Approximate number of keys in the whole store
    #[default]
    Store,
    /// Number of keys matching the region pattern
    Region,
}

/// Outcome of a cache read
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// The store returned a value
    Hit(Value),
    /// The store has no entry for the key
    Miss,
    /// The read lock was not available
    LockBusy,
    /// The store call failed and the error was contained
    Failed(StoreError),
}

impl Lookup {
    /// Collapse into the framework-facing result (anything but a hit is a miss)
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Hit(value) => Some(value),
            _ => None,
        }
    }
}

/// Outcome of a cache mutation (put/remove/clear)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The store was updated; `keys` is the number of keys written or deleted
    Applied { keys: usize },
    /// Nothing to do (absent value, or no keys in the region)
    Unchanged,
    /// The write lock was not available
    LockBusy,
    /// The store call failed and the error was contained
    Failed(StoreError),
}

/// Per-region cache statistics
#[derive(Debug, Default, Clone, Serialize)]
pub struct CacheStats {
    /// Number of reads answered from the store
    pub hits: u64,
    /// Number of reads that found nothing in the store
    pub misses: u64,
    /// Number of entries written
    pub puts: u64,
    /// Number of single-key removals applied
    pub removes: u64,
    /// Number of bulk clears applied
    pub clears: u64,
    /// Operations skipped because the lock was held elsewhere
    pub lock_busy: u64,
    /// Store failures that were contained
    pub store_errors: u64,
}

impl CacheStats {
    /// Hits over all reads that reached the store
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_into_value() {
        assert_eq!(Lookup::Hit(json!(1)).into_value(), Some(json!(1)));
        assert_eq!(Lookup::Miss.into_value(), None);
        assert_eq!(Lookup::LockBusy.into_value(), None);
        assert_eq!(Lookup::Failed(StoreError::Timeout).into_value(), None);
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_size_scope_serde() {
        let scope: SizeScope = serde_yaml::from_str("region").unwrap();
        assert_eq!(scope, SizeScope::Region);
        assert_eq!(SizeScope::default(), SizeScope::Store);
    }
}

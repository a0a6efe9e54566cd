use std::sync::Arc;

use super::adapter::RegionCache;
use super::error::{CacheError, Result};
use super::store::RemoteStore;
use super::types::SizeScope;
use crate::config::CacheConfig;
use crate::store::build_store;

/// Creates region caches that share one store handle
///
/// The query framework owns the factory and the caches it hands out; there is
/// no process-wide registry. Every call to `create` yields an adapter with its
/// own region lock, even for an id that was seen before.
#[derive(Clone)]
pub struct RegionCacheFactory {
    store: Arc<dyn RemoteStore>,
    size_scope: SizeScope,
}

impl RegionCacheFactory {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            size_scope: SizeScope::default(),
        }
    }

    /// Build the configured store and wrap it in a factory
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let store = build_store(&config.store).map_err(|err| {
            CacheError::Config(format!("cannot build {:?} store: {}", config.store.backend, err))
        })?;
        Ok(Self::new(store).with_size_scope(config.cache.size_scope))
    }

    pub fn with_size_scope(mut self, size_scope: SizeScope) -> Self {
        self.size_scope = size_scope;
        self
    }

    /// Cache for region `id`
    pub fn create(&self, id: impl Into<String>) -> Result<RegionCache> {
        Ok(RegionCache::new(id, Arc::clone(&self.store))?.with_size_scope(self.size_scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::QueryCache;
    use crate::store::InMemoryStore;
    use serde_json::json;

    #[test]
    fn test_regions_share_store() {
        let factory = RegionCacheFactory::new(Arc::new(InMemoryStore::new()));
        let orders = factory.create("orders").unwrap();
        let customers = factory.create("customers").unwrap();

        orders.put("q1", Some(json!("o")));
        customers.put("q1", Some(json!("c")));

        assert_eq!(orders.get("q1"), Some(json!("o")));
        assert_eq!(customers.get("q1"), Some(json!("c")));
        assert_eq!(orders.size(), 2);
    }

    #[test]
    fn test_same_id_gets_separate_locks() {
        let factory = RegionCacheFactory::new(Arc::new(InMemoryStore::new()));
        let first = factory.create("orders").unwrap();
        let second = factory.create("orders").unwrap();

        assert!(!Arc::ptr_eq(&first.lock_handle(), &second.lock_handle()));
    }

    #[test]
    fn test_from_memory_config() {
        let mut config = CacheConfig::in_memory();
        config.cache.size_scope = SizeScope::Region;

        let factory = RegionCacheFactory::from_config(&config).unwrap();
        let cache = factory.create("orders").unwrap();
        assert_eq!(cache.size_scope(), SizeScope::Region);
    }

    #[test]
    fn test_from_config_bad_url() {
        let mut config = CacheConfig::default();
        config.store.url = "not-a-url".to_string();

        let err = factory_error(&config);
        assert!(matches!(err, CacheError::Config(_)));
    }

    fn factory_error(config: &CacheConfig) -> CacheError {
        match RegionCacheFactory::from_config(config) {
            Ok(_) => panic!("expected configuration error"),
            Err(err) => err,
        }
    }

    #[test]
    fn test_empty_id_rejected() {
        let factory = RegionCacheFactory::new(Arc::new(InMemoryStore::new()));
        assert!(matches!(
            factory.create(""),
            Err(CacheError::InvalidArgument(_))
        ));
    }
}

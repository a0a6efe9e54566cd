use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::SizeScope;
use crate::store::redis::{DEFAULT_MAX_IDLE, DEFAULT_SCAN_COUNT};

/// Region cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub store: StoreConfig,
    pub cache: RegionConfig,
    pub logging: LoggingConfig,
}

/// Store backend selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    #[default]
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub url: String,
    pub connect_timeout_ms: u64,
    pub io_timeout_ms: u64,
    pub scan_count: usize,
    pub max_idle_connections: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Redis,
            url: "redis://127.0.0.1:6379/0".to_string(),
            connect_timeout_ms: 2000,
            io_timeout_ms: 1000,
            scan_count: DEFAULT_SCAN_COUNT,
            max_idle_connections: DEFAULT_MAX_IDLE,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    pub size_scope: SizeScope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl CacheConfig {
    /// Load configuration from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: CacheConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Configuration with the in-memory backend
    pub fn in_memory() -> Self {
        let mut config = Self::default();
        config.store.backend = StoreBackend::Memory;
        config
    }
}

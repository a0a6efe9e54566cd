use parking_lot::Mutex;
use redis::{Commands, Connection, RedisError, RedisResult};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::error::StoreError;
use crate::core::store::{RemoteStore, StoreResult};

/// Keys requested per SCAN round-trip
pub const DEFAULT_SCAN_COUNT: usize = 500;

/// Idle connections kept for reuse
pub const DEFAULT_MAX_IDLE: usize = 8;

/// Store backed by a Redis server
///
/// Values are stored as JSON text. Connections are opened on demand and
/// returned to a small idle pool after each command, so concurrent callers
/// never wait behind another caller's round trip. A connection that fails at
/// the transport level is discarded. There is no retry.
pub struct RedisStore {
    client: redis::Client,
    idle: Mutex<Vec<Connection>>,
    max_idle: usize,
    connect_timeout: Duration,
    io_timeout: Duration,
    scan_count: usize,
}

impl RedisStore {
    /// Prepare a store for `url` (`redis://host:port/db`). No connection is made yet.
    pub fn open(url: &str, connect_timeout: Duration, io_timeout: Duration) -> StoreResult<Self> {
        let client = redis::Client::open(url)?;
        info!(
            "Redis store configured for {} (connect_timeout={:?}, io_timeout={:?})",
            redact(url),
            connect_timeout,
            io_timeout
        );

        Ok(Self {
            client,
            idle: Mutex::new(Vec::new()),
            max_idle: DEFAULT_MAX_IDLE,
            connect_timeout,
            io_timeout,
            scan_count: DEFAULT_SCAN_COUNT,
        })
    }

    pub fn with_scan_count(mut self, scan_count: usize) -> Self {
        self.scan_count = scan_count.max(1);
        self
    }

    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle.max(1);
        self
    }

    /// Open a connection now instead of on first use
    pub fn connect(&self) -> StoreResult<()> {
        self.with_connection(|_| Ok(()))
    }

    /// Connections currently parked in the pool
    pub fn idle_connections(&self) -> usize {
        self.idle.lock().len()
    }

    fn open_connection(&self) -> StoreResult<Connection> {
        let conn = self.client.get_connection_with_timeout(self.connect_timeout)?;
        conn.set_read_timeout(Some(self.io_timeout))?;
        conn.set_write_timeout(Some(self.io_timeout))?;
        debug!("Redis connection established");
        Ok(conn)
    }

    fn with_connection<T>(
        &self,
        op: impl FnOnce(&mut Connection) -> RedisResult<T>,
    ) -> StoreResult<T> {
        // The pool lock is only held to take or return a connection
        let pooled = self.idle.lock().pop();
        let mut conn = match pooled {
            Some(conn) => conn,
            None => self.open_connection()?,
        };

        match op(&mut conn) {
            Ok(value) => {
                self.checkin(conn);
                Ok(value)
            }
            Err(err) if is_transport_error(&err) => {
                warn!("Dropping Redis connection after error: {}", err);
                Err(StoreError::from(err))
            }
            Err(err) => {
                self.checkin(conn);
                Err(StoreError::from(err))
            }
        }
    }

    fn checkin(&self, conn: Connection) {
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(conn);
        }
    }
}

impl RemoteStore for RedisStore {
    fn set_with_ttl(&self, key: &str, value: &Value, ttl_secs: u64) -> StoreResult<()> {
        let payload = serde_json::to_string(value)?;
        self.with_connection(|conn| conn.set_ex::<_, _, ()>(key, payload, ttl_secs))
    }

    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let payload: Option<String> = self.with_connection(|conn| conn.get(key))?;
        match payload {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.with_connection(|conn| conn.del::<_, ()>(key))
    }

    fn delete_many(&self, keys: &[String]) -> StoreResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        self.with_connection(|conn| conn.del::<_, ()>(keys))
    }

    fn keys_matching(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let count = self.scan_count;
        self.with_connection(|conn| {
            let mut keys = Vec::new();
            let mut cursor: u64 = 0;
            loop {
                let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(pattern)
                    .arg("COUNT")
                    .arg(count)
                    .query(conn)?;
                keys.extend(batch);
                if next == 0 {
                    break;
                }
                cursor = next;
            }
            // SCAN may return a key more than once
            keys.sort_unstable();
            keys.dedup();
            Ok(keys)
        })
    }

    fn approximate_count(&self) -> StoreResult<u64> {
        self.with_connection(|conn| redis::cmd("DBSIZE").query(conn))
    }
}

fn is_transport_error(err: &RedisError) -> bool {
    err.is_io_error()
        || err.is_timeout()
        || err.is_connection_dropped()
        || err.is_connection_refusal()
        || err.is_unrecoverable_error()
}

/// Hide credentials from a connection URL before logging it
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme), Some(at)) if at > scheme => {
            format!("{}://***{}", &url[..scheme], &url[at..])
        }
        _ => url.to_string(),
    }
}

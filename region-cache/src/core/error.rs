use std::fmt;
use thiserror::Error;

/// Lock mode of a region lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Read,
    Write,
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}

/// Illegal lock state transitions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    #[error("{0} lock is not held by the current thread")]
    NotHeld(LockMode),

    #[error("read lock cannot be upgraded to a write lock")]
    UpgradeNotSupported,
}

/// Failures reported by a remote store backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Store operation timed out")]
    Timeout,

    #[error("Command failed: {0}")]
    Command(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error()
        {
            Self::Connection(err.to_string())
        } else {
            Self::Command(err.to_string())
        }
    }
}

/// Main error type for region cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Illegal state: {0}")]
    IllegalState(#[from] LockError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for region cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

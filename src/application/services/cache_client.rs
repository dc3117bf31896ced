use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::application::error::ApplicationError;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache connection error: {0}")]
    Connection(String),

    #[error("Cache command failed: {0}")]
    Command(String),

    #[error("Cache serialization error: {0}")]
    Serialization(String),
}

impl From<CacheError> for ApplicationError {
    fn from(error: CacheError) -> Self {
        ApplicationError::CacheError(error.to_string())
    }
}

/// A write queued for the commit phase of a watched transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheWrite {
    Set {
        key: String,
        value: String,
        ttl: Option<Duration>,
    },
    Delete {
        key: String,
    },
}

/// One optimistic-concurrency attempt: the watched keys are pinned when the
/// session is opened, and `exec` reports whether the writes were applied.
#[async_trait]
pub trait WatchSession: Send {
    async fn get(&mut self, key: &str) -> Result<Option<String>, CacheError>;
    async fn ttl(&mut self, key: &str) -> Result<Option<Duration>, CacheError>;

    /// `Ok(false)` when a watched key changed after `watch`; nothing was written.
    async fn exec(self: Box<Self>, writes: Vec<CacheWrite>) -> Result<bool, CacheError>;
}

/// Networked key-value store with per-key TTL and atomic increment.
#[async_trait]
pub trait CacheClient: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
    async fn del(&self, key: &str) -> Result<(), CacheError>;
    async fn incr(&self, key: &str) -> Result<i64, CacheError>;

    /// `Ok(false)` when the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError>;

    /// `None` when the key is missing or has no expiration.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError>;

    /// One page of a cursor scan. A returned cursor of 0 ends the iteration.
    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), CacheError>;

    async fn watch(&self, keys: &[String]) -> Result<Box<dyn WatchSession>, CacheError>;

    async fn ping(&self) -> Result<(), CacheError>;
}

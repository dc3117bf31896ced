use std::{any::Any, collections::HashMap, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::{future::BoxFuture, FutureExt};
use tracing::{debug, error, warn};

use crate::application::{
    error::ApplicationError,
    services::cache_client::{CacheClient, CacheWrite},
};

/// An open relational transaction. Repositories recover the concrete handle
/// through `as_any_mut`; a handle from a different store is rejected.
#[async_trait]
pub trait Transaction: Send {
    async fn commit(&mut self) -> Result<(), ApplicationError>;

    /// Must be safe to call after a failed commit.
    async fn rollback(&mut self) -> Result<(), ApplicationError>;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

#[async_trait]
pub trait TransactionManager: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn Transaction>, ApplicationError>;
    async fn ping(&self) -> Result<(), ApplicationError>;
}

/// Value and remaining TTL of a watched key, read after `WATCH`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatchedValue {
    pub value: Option<String>,
    pub ttl: Option<Duration>,
}

pub type CacheSnapshot = HashMap<String, WatchedValue>;

/// Runs units of work against the relational store and, separately, against
/// the cache. The two are never combined into one atomic operation.
pub struct TransactionCoordinator {
    manager: Arc<dyn TransactionManager>,
    cache: Arc<dyn CacheClient>,
    timeout: Duration,
    cache_max_retries: u32,
}

impl TransactionCoordinator {
    pub fn new(
        manager: Arc<dyn TransactionManager>,
        cache: Arc<dyn CacheClient>,
        timeout: Duration,
        cache_max_retries: u32,
    ) -> Self {
        Self {
            manager,
            cache,
            timeout,
            cache_max_retries: cache_max_retries.max(1),
        }
    }

    /// Runs `work` inside a relational transaction and resolves it to exactly
    /// one of commit or rollback, including when `work` panics or overruns the
    /// store timeout. All writes in `work` must go through the supplied handle.
    pub async fn execute_in_transaction<T, F>(&self, work: F) -> Result<T, ApplicationError>
    where
        T: Send,
        F: for<'tx> FnOnce(&'tx mut dyn Transaction) -> BoxFuture<'tx, Result<T, ApplicationError>>
            + Send,
    {
        let mut tx = self.manager.begin().await?;

        let outcome = tokio::time::timeout(
            self.timeout,
            AssertUnwindSafe(async { work(&mut *tx).await }).catch_unwind(),
        )
        .await;

        match outcome {
            Err(_) => {
                warn!("Transaction exceeded {:?}, rolling back", self.timeout);
                Self::rollback(&mut *tx).await;
                Err(ApplicationError::Timeout)
            }
            Ok(Err(panic)) => {
                error!("Transaction body panicked, rolling back");
                Self::rollback(&mut *tx).await;
                std::panic::resume_unwind(panic)
            }
            Ok(Ok(Err(e))) => {
                debug!("Transaction body failed, rolling back: {:?}", e);
                Self::rollback(&mut *tx).await;
                Err(e)
            }
            Ok(Ok(Ok(value))) => match tx.commit().await {
                Ok(()) => Ok(value),
                Err(e) => {
                    error!("Transaction commit failed: {:?}", e);
                    Self::rollback(&mut *tx).await;
                    Err(e)
                }
            },
        }
    }

    async fn rollback(tx: &mut dyn Transaction) {
        if let Err(e) = tx.rollback().await {
            error!("Transaction rollback failed: {:?}", e);
        }
    }

    /// Optimistic read-modify-write over `keys`. `build` sees the watched
    /// values and returns the writes to apply plus a result; it is re-run from
    /// a fresh read whenever a watched key changes before commit, so it must be
    /// free of side effects.
    pub async fn execute_in_cache_transaction<T, F>(
        &self,
        keys: &[String],
        build: F,
    ) -> Result<T, ApplicationError>
    where
        T: Send,
        F: Fn(&CacheSnapshot) -> Result<(Vec<CacheWrite>, T), ApplicationError> + Send + Sync,
    {
        let attempts = async {
            for attempt in 1..=self.cache_max_retries {
                let mut session = self.cache.watch(keys).await?;

                let mut snapshot = CacheSnapshot::with_capacity(keys.len());
                for key in keys {
                    let value = session.get(key).await?;
                    let ttl = session.ttl(key).await?;
                    snapshot.insert(key.clone(), WatchedValue { value, ttl });
                }

                let (writes, output) = build(&snapshot)?;
                if session.exec(writes).await? {
                    return Ok(output);
                }
                debug!(
                    "Watched keys changed before commit, retrying (attempt {}/{})",
                    attempt, self.cache_max_retries
                );
            }

            warn!(
                "Cache transaction gave up after {} conflicting attempts",
                self.cache_max_retries
            );
            Err(ApplicationError::Conflict)
        };

        tokio::time::timeout(self.timeout, attempts)
            .await
            .map_err(|_| ApplicationError::Timeout)?
    }
}

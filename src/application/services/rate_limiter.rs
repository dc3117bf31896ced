use std::{sync::Arc, time::Duration};

use tracing::{error, warn};

use crate::application::services::cache_client::{CacheClient, CacheError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub retry_after: Duration,
}

impl RateLimitDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            retry_after: Duration::ZERO,
        }
    }

    fn deny(retry_after: Duration) -> Self {
        Self {
            allowed: false,
            retry_after,
        }
    }
}

/// Redis reports whole seconds, so a window in its last second shows 0.
fn retry_hint(remaining: Duration) -> Duration {
    if remaining.is_zero() {
        Duration::from_secs(1)
    } else {
        remaining
    }
}

/// Fixed-window request counter per client, kept in the shared cache so every
/// instance of the service sees the same quota.
///
/// The increment and the first-hit TTL are two separate commands. If the
/// process dies between them the counter is left without an expiration; a
/// denied request that finds no TTL puts the window back, so such a client is
/// blocked for at most one extra window. Cache failures deny (fail closed).
pub struct RateLimiter {
    cache: Arc<dyn CacheClient>,
    window: Duration,
    max_requests: u64,
}

impl RateLimiter {
    pub fn new(cache: Arc<dyn CacheClient>, window: Duration, max_requests: u64) -> Self {
        Self {
            cache,
            window,
            max_requests,
        }
    }

    fn limit(&self) -> i64 {
        i64::try_from(self.max_requests).unwrap_or(i64::MAX)
    }

    fn counter_key(client_key: &str) -> String {
        format!("rate_limit:{}", client_key)
    }

    pub async fn allow(&self, client_key: &str) -> RateLimitDecision {
        match self.check(client_key).await {
            Ok(decision) => decision,
            Err(e) => {
                error!(
                    "Rate limiter unavailable for '{}', denying: {}",
                    client_key, e
                );
                RateLimitDecision::deny(self.window)
            }
        }
    }

    async fn check(&self, client_key: &str) -> Result<RateLimitDecision, CacheError> {
        let key = Self::counter_key(client_key);
        let count = self.cache.incr(&key).await?;

        if count == 1 {
            self.cache.expire(&key, self.window).await?;
        }

        if count <= self.limit() {
            return Ok(RateLimitDecision::allow());
        }

        let retry_after = match self.cache.ttl(&key).await? {
            Some(remaining) => retry_hint(remaining),
            None => {
                warn!(
                    "Rate limit counter for '{}' had no expiration, restoring window",
                    client_key
                );
                self.cache.expire(&key, self.window).await?;
                self.window
            }
        };
        Ok(RateLimitDecision::deny(retry_after))
    }
}

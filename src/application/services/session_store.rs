use std::{sync::Arc, time::Duration};

use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    application::{
        error::ApplicationError,
        services::{
            cache_client::{CacheClient, CacheError, CacheWrite},
            transaction::TransactionCoordinator,
        },
    },
    domain::models::session::UserSession,
};

const SESSION_PREFIX: &str = "session:";

pub fn session_key_for(token_value: &str) -> String {
    format!("{}{}", SESSION_PREFIX, token_value)
}

fn decode(key: &str, raw: &str) -> Result<UserSession, ApplicationError> {
    serde_json::from_str(raw)
        .map_err(|e| ApplicationError::CorruptData(format!("Session '{}' is unreadable: {}", key, e)))
}

fn encode(session: &UserSession) -> Result<String, ApplicationError> {
    serde_json::to_string(session)
        .map_err(|e| CacheError::Serialization(e.to_string()).into())
}

/// Active logins, one cache entry per bearer token. The entry's presence is
/// what makes a token valid; its TTL is the token's validity.
pub struct SessionStore {
    cache: Arc<dyn CacheClient>,
    coordinator: Arc<TransactionCoordinator>,
    scan_page_size: usize,
}

impl SessionStore {
    pub fn new(
        cache: Arc<dyn CacheClient>,
        coordinator: Arc<TransactionCoordinator>,
        scan_page_size: usize,
    ) -> Self {
        Self {
            cache,
            coordinator,
            scan_page_size: scan_page_size.max(1),
        }
    }

    pub async fn create_session(
        &self,
        session_key: &str,
        ttl: Duration,
        session: &UserSession,
    ) -> Result<(), ApplicationError> {
        let value = encode(session)?;
        self.cache.set_ex(session_key, &value, ttl).await?;
        debug!("Session stored for user {} (ttl {:?})", session.user_id, ttl);
        Ok(())
    }

    /// `Ok(None)` is the normal "no active session" answer.
    pub async fn get_session(
        &self,
        session_key: &str,
    ) -> Result<Option<UserSession>, ApplicationError> {
        match self.cache.get(session_key).await? {
            None => Ok(None),
            Some(raw) => decode(session_key, &raw).map(Some),
        }
    }

    pub async fn delete_session(&self, session_key: &str) -> Result<(), ApplicationError> {
        self.cache.del(session_key).await?;
        Ok(())
    }

    /// Walks every session key page by page and deletes the ones owned by
    /// `user_id`. Not a snapshot: a session written while the scan runs may be
    /// missed. Unreadable entries are reported and left in place.
    pub async fn delete_sessions_for_user(&self, user_id: Uuid) -> Result<usize, ApplicationError> {
        let pattern = format!("{}*", SESSION_PREFIX);
        let mut cursor = 0u64;
        let mut visited = 0usize;
        let mut deleted = 0usize;

        loop {
            let (next, keys) = self
                .cache
                .scan(cursor, &pattern, self.scan_page_size)
                .await?;

            for key in keys {
                visited += 1;
                let Some(raw) = self.cache.get(&key).await? else {
                    continue;
                };
                match decode(&key, &raw) {
                    Ok(session) if session.user_id == user_id => {
                        self.cache.del(&key).await?;
                        deleted += 1;
                    }
                    Ok(_) => {}
                    Err(e) => error!("Skipping corrupt session during bulk revoke: {:?}", e),
                }
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        info!(
            "Deleted {} sessions for user {} ({} keys visited)",
            deleted, user_id, visited
        );
        Ok(deleted)
    }

    /// Read-modify-write of one session under optimistic concurrency. The
    /// remaining TTL is carried over. `Ok(None)` if the session is gone.
    pub async fn update_session<F>(
        &self,
        session_key: &str,
        mutate: F,
    ) -> Result<Option<UserSession>, ApplicationError>
    where
        F: Fn(&mut UserSession) + Send + Sync,
    {
        let keys = vec![session_key.to_string()];
        self.coordinator
            .execute_in_cache_transaction(&keys, |snapshot| {
                let Some(watched) = snapshot.get(session_key) else {
                    return Ok((Vec::new(), None));
                };
                let Some(raw) = watched.value.as_deref() else {
                    return Ok((Vec::new(), None));
                };

                let mut session = decode(session_key, raw)?;
                mutate(&mut session);
                let write = CacheWrite::Set {
                    key: session_key.to_string(),
                    value: encode(&session)?,
                    ttl: watched.ttl,
                };
                Ok((vec![write], Some(session)))
            })
            .await
    }
}

use axum::extract::FromRef;
use std::sync::Arc;

use crate::{
    application::{
        repositories::user_repository::UserRepository,
        services::{
            cache_client::CacheClient,
            lifecycle::{LifecycleManager, TokenRepositories},
            notifier::TokenNotifier,
            rate_limiter::RateLimiter,
            session_store::SessionStore,
            transaction::{TransactionCoordinator, TransactionManager},
        },
    },
    domain::config::auth::AuthConfig,
};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub lifecycle: Arc<LifecycleManager>,
    pub rate_limiter: Arc<RateLimiter>,
    pub cache: Arc<dyn CacheClient>,
    pub database: Arc<dyn TransactionManager>,
}

impl AppState {
    /// Wires the services on top of the store adapters.
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: TokenRepositories,
        cache: Arc<dyn CacheClient>,
        database: Arc<dyn TransactionManager>,
        notifier: Arc<dyn TokenNotifier>,
        config: &AuthConfig,
    ) -> Self {
        let coordinator = Arc::new(TransactionCoordinator::new(
            database.clone(),
            cache.clone(),
            config.store_timeout,
            config.cache_transaction_max_retries,
        ));
        let sessions = Arc::new(SessionStore::new(
            cache.clone(),
            coordinator.clone(),
            config.session_scan_page_size,
        ));
        let lifecycle = Arc::new(LifecycleManager::new(
            users,
            tokens,
            sessions,
            coordinator,
            notifier,
            config,
        ));
        let rate_limiter = Arc::new(RateLimiter::new(
            cache.clone(),
            config.rate_limit_window,
            config.rate_limit_max_requests,
        ));

        Self {
            lifecycle,
            rate_limiter,
            cache,
            database,
        }
    }
}

//! In-process store doubles for tests.

mod database;
mod notifier;

use std::sync::Arc;

pub use cache::MemoryCacheClient;
pub use database::{MemoryDatabase, MemoryOneTimeTokens};
pub use notifier::RecordingNotifier;

use crate::{
    adapters::state::AppState,
    application::services::lifecycle::TokenRepositories,
    domain::{config::auth::AuthConfig, models::one_time_token::OneTimeTokenKind},
};

/// Application state wired to fresh in-memory stores, plus handles on them.
pub struct MemoryStores {
    pub state: AppState,
    pub db: MemoryDatabase,
    pub cache: MemoryCacheClient,
    pub notifier: RecordingNotifier,
}

pub fn memory_state(config: &AuthConfig) -> MemoryStores {
    let db = MemoryDatabase::new();
    let cache = MemoryCacheClient::new();
    let notifier = RecordingNotifier::new();
    let state = AppState::new(
        Arc::new(db.clone()),
        TokenRepositories {
            login: Arc::new(db.clone()),
            password_reset: Arc::new(MemoryOneTimeTokens::new(
                db.clone(),
                OneTimeTokenKind::PasswordReset,
            )),
            registration: Arc::new(MemoryOneTimeTokens::new(
                db.clone(),
                OneTimeTokenKind::Registration,
            )),
        },
        Arc::new(cache.clone()),
        Arc::new(db.clone()),
        Arc::new(notifier.clone()),
        config,
    );
    MemoryStores {
        state,
        db,
        cache,
        notifier,
    }
}

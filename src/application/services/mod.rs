pub mod cache_client;
pub mod credentials;
pub mod lifecycle;
pub mod notifier;
pub mod rate_limiter;
pub mod session_store;
pub mod transaction;

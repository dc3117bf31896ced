mod pg_login_token_repository;
mod pg_one_time_token_repository;
mod pg_transaction;
mod pg_user_repository;
mod redis_cache_client;

pub use pg_login_token_repository::PgLoginTokenRepository;
pub use pg_one_time_token_repository::PgOneTimeTokenRepository;
pub use pg_transaction::PgTransactionManager;
pub use pg_user_repository::PgUserRepository;
pub use redis_cache_client::RedisCacheClient;

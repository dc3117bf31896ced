mod adapters;
mod application;
mod domain;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use adapters::{
    notifier::LogTokenNotifier,
    repositories::{
        PgLoginTokenRepository, PgOneTimeTokenRepository, PgTransactionManager,
        PgUserRepository, RedisCacheClient,
    },
    routes::build_router,
    state::AppState,
};
use application::services::{
    cache_client::CacheClient, lifecycle::TokenRepositories, transaction::TransactionManager,
};
use domain::{config::auth::AuthConfig, models::one_time_token::OneTimeTokenKind};
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Redis and Postgres TLS both go through rustls; pick the provider once.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let database_url = std::env::var("DATABASE_URL")
        .expect("ERROR: DATABASE_URL environment variable must be set");

    let redis_url =
        std::env::var("REDIS_URL").expect("ERROR: REDIS_URL environment variable must be set");

    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse::<u16>()
        .expect("PORT must be a valid u16");

    let config = AuthConfig::from_env().expect("ERROR: Invalid auth configuration");
    tracing::info!("Starting session-gate with {:?}", config);

    // Configure CORS
    let cors = if let Ok(allowed_origins) = std::env::var("CORS_ALLOWED_ORIGINS") {
        let origins: Vec<_> = allowed_origins
            .split(',')
            .map(|s| s.trim().parse().expect("Invalid CORS origin"))
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        // Allow all origins if not specified (only for development)
        CorsLayer::permissive()
    };

    // Connect to PostgreSQL and Redis in parallel for faster startup
    tracing::info!("Connecting to databases...");
    let store_timeout = config.store_timeout;
    let (pool, (redis_client, redis_conn_manager)) = tokio::join!(
        async {
            sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(store_timeout)
                .connect(&database_url)
                .await
                .expect("ERROR: Failed to connect to PostgreSQL database. Check DATABASE_URL and network connectivity.")
        },
        async {
            let redis_client = redis::Client::open(redis_url.as_str())
                .expect("ERROR: Failed to create Redis client. Check REDIS_URL format.");
            let manager_config = redis::aio::ConnectionManagerConfig::new()
                .set_connection_timeout(store_timeout)
                .set_response_timeout(store_timeout);
            let manager =
                redis::aio::ConnectionManager::new_with_config(redis_client.clone(), manager_config)
                    .await
                    .expect(
                        "ERROR: Failed to connect to Redis. Check REDIS_URL and network connectivity.",
                    );
            (redis_client, manager)
        }
    );
    tracing::info!("Database connections established");

    let cache =
        Arc::new(RedisCacheClient::new(redis_client, redis_conn_manager)) as Arc<dyn CacheClient>;
    let database =
        Arc::new(PgTransactionManager::new(pool.clone())) as Arc<dyn TransactionManager>;

    let tokens = TokenRepositories {
        login: Arc::new(PgLoginTokenRepository::new(pool.clone())),
        password_reset: Arc::new(PgOneTimeTokenRepository::new(
            pool.clone(),
            OneTimeTokenKind::PasswordReset,
        )),
        registration: Arc::new(PgOneTimeTokenRepository::new(
            pool.clone(),
            OneTimeTokenKind::Registration,
        )),
    };

    let app_state = AppState::new(
        Arc::new(PgUserRepository::new(pool)),
        tokens,
        cache,
        database,
        Arc::new(LogTokenNotifier),
        &config,
    );

    // Room for a database transaction plus a cache round trip.
    let request_timeout = store_timeout * 2 + Duration::from_secs(1);
    let router = build_router(app_state, cors, request_timeout);

    // Start the server
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .expect("Failed to bind to port");

    tracing::info!("Server listening on 0.0.0.0:{}", port);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}

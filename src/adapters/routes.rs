use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::adapters::{
    controllers::{auth_controller::AuthController, health_controller::HealthController},
    middleware::{rate_limit, require_session},
    state::AppState,
};

pub fn build_router(state: AppState, cors: CorsLayer, request_timeout: Duration) -> Router {
    // Routes that need a live session behind `Authorization: Bearer`
    let session_routes = Router::new()
        .route("/api/v1/auth/logout", post(AuthController::logout))
        .route(
            "/api/v1/auth/session",
            get(AuthController::get_session).patch(AuthController::update_session),
        )
        .route(
            "/api/v1/auth/sessions/revoke",
            post(AuthController::revoke_sessions),
        )
        .route_layer(middleware::from_fn_with_state(
            state.lifecycle.clone(),
            require_session,
        ));

    let public_routes = Router::new()
        .route("/api/v1/auth/register", post(AuthController::register))
        .route(
            "/api/v1/auth/register/confirm",
            post(AuthController::confirm_registration),
        )
        .route("/api/v1/auth/login", post(AuthController::login))
        .route(
            "/api/v1/auth/password/forgot",
            post(AuthController::forgot_password),
        )
        .route(
            "/api/v1/auth/password/reset",
            post(AuthController::reset_password),
        );

    // Outside the rate limiter so a cache outage reports 503 rather than 429.
    let health_routes =
        Router::new().route("/api/v1/health", get(HealthController::health_check));

    Router::new()
        .merge(session_routes)
        .merge(public_routes)
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit,
        ))
        .merge(health_routes)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

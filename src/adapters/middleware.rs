use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::application::{
    error::ApplicationError,
    services::{lifecycle::LifecycleManager, rate_limiter::RateLimiter},
};

/// Bearer token of the current request, placed next to its `UserSession`.
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

fn client_key(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Admission control keyed by the peer address.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = client_key(&request);
    let decision = limiter.allow(&key).await;
    if !decision.allowed {
        warn!("Rate limit exceeded for client {}", key);
        return ApplicationError::TooManyRequests {
            retry_after: decision.retry_after,
        }
        .into_response();
    }
    next.run(request).await
}

/// Resolves `Authorization: Bearer <token>` to a cached session
pub async fn require_session(
    State(lifecycle): State<Arc<LifecycleManager>>,
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(&headers) else {
        warn!("Authorization header is missing or not a bearer token");
        return ApplicationError::Unauthorized.into_response();
    };

    match lifecycle.require_session(token).await {
        Ok(session) => {
            let token = SessionToken(token.to_string());
            request.extensions_mut().insert(session);
            request.extensions_mut().insert(token);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

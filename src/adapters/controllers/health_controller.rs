use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::{error, info};

use crate::adapters::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub cache: String,
    pub database: String,
}

fn component_status(healthy: bool) -> String {
    if healthy { "up" } else { "down" }.to_string()
}

pub struct HealthController;

impl HealthController {
    /// Health check endpoint
    /// GET /api/v1/health
    pub async fn health_check(
        State(app_state): State<AppState>,
    ) -> (StatusCode, Json<HealthResponse>) {
        info!("Health check requested");

        let (cache, database) = tokio::join!(app_state.cache.ping(), app_state.database.ping());
        if let Err(ref e) = cache {
            error!("Health check: cache unreachable: {}", e);
        }
        if let Err(ref e) = database {
            error!("Health check: database unreachable: {:?}", e);
        }

        let healthy = cache.is_ok() && database.is_ok();
        let status = if healthy {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };

        (
            status,
            Json(HealthResponse {
                status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
                cache: component_status(cache.is_ok()),
                database: component_status(database.is_ok()),
            }),
        )
    }
}

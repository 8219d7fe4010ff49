//! Liveness endpoints.

use axum::Json;

use crate::dto::response::HealthResponse;

/// GET /up
pub async fn up() -> &'static str {
    "OK"
}

/// GET /pusher/health
pub async fn pusher_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

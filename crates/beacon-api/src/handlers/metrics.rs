//! Prometheus exposition endpoint.

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use crate::error::ApiError;
use crate::state::AppState;

const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// GET /metrics
pub async fn render(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let body = state.realtime.metrics.render()?;
    Ok(([(header::CONTENT_TYPE, CONTENT_TYPE)], body))
}

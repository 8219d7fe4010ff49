//! Application metadata endpoint.

use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::Json;

use beacon_realtime::Application;
use beacon_realtime::application::app::ApplicationSummary;

use crate::state::AppState;

/// GET /apps/{app_id}
pub async fn show(
    State(state): State<AppState>,
    Extension(app): Extension<Arc<Application>>,
) -> Json<ApplicationSummary> {
    let connections = state.realtime.apps.connection_count(app.id());
    Json(app.summary(connections))
}

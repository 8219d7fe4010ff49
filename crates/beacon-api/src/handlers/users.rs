//! User management endpoints.

use std::sync::Arc;

use axum::extract::{Extension, Path, State};
use axum::Json;
use tracing::info;

use beacon_realtime::Application;

use crate::dto::response::EmptyResponse;
use crate::state::AppState;

/// POST /apps/{app_id}/users/{user_id}/terminate_connections
pub async fn terminate_connections(
    State(state): State<AppState>,
    Extension(app): Extension<Arc<Application>>,
    Path((_app_id, user_id)): Path<(String, String)>,
) -> Json<EmptyResponse> {
    let closed = state.realtime.connections.terminate_user(app.id(), &user_id);
    info!(app_id = %app.id(), user_id = %user_id, closed, "Terminated user connections");
    Json(EmptyResponse::default())
}

//! Static route table.

use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};

use crate::handlers;
use crate::middleware::{logging, signature};
use crate::state::AppState;

/// Builds the complete router with every route group.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(app_routes(state.clone()))
        .merge(auth_routes(state.clone()))
        .merge(public_routes())
        .layer(from_fn(logging::request_logging))
        .with_state(state)
}

/// Signed `/apps/{app_id}` HTTP API.
fn app_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/apps/{app_id}", get(handlers::apps::show))
        .route("/apps/{app_id}/events", post(handlers::events::trigger))
        .route(
            "/apps/{app_id}/batch_events",
            post(handlers::events::trigger_batch),
        )
        .route("/apps/{app_id}/channels", get(handlers::channels::list))
        .route(
            "/apps/{app_id}/channels/{channel_name}",
            get(handlers::channels::show),
        )
        .route(
            "/apps/{app_id}/channels/{channel_name}/users",
            get(handlers::channels::users),
        )
        .route(
            "/apps/{app_id}/users/{user_id}/terminate_connections",
            post(handlers::users::terminate_connections),
        )
        .route_layer(from_fn_with_state(state, signature::verify_app_signature))
}

/// Signed auth endpoints, resolved by `auth_key`.
fn auth_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/pusher/auth", post(handlers::auth::channel_auth))
        .route("/pusher/user-auth", post(handlers::auth::user_auth))
        .route_layer(from_fn_with_state(state, signature::verify_key_signature))
}

/// WebSocket, health and metrics.
fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/app/{app_key}", get(handlers::ws::ws_handler))
        .route("/up", get(handlers::health::up))
        .route("/pusher/health", get(handlers::health::pusher_health))
        .route("/metrics", get(handlers::metrics::render))
}

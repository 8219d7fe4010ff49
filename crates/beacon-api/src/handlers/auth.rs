//! Channel and user authorization signing.
//!
//! Both endpoints accept `application/json` or form-encoded bodies.

use std::sync::Arc;

use axum::extract::{Extension, Form, FromRequest, Request, State};
use axum::http::header;
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use beacon_core::error::AppError;
use beacon_realtime::channel::{ChannelKind, PresenceMember};
use beacon_realtime::message::validator::validate_channel_name;
use beacon_realtime::{Application, SocketId};

use crate::dto::request::{ChannelAuthRequest, UserAuthRequest};
use crate::dto::response::{ChannelAuthResponse, UserAuthResponse};
use crate::error::ApiError;
use crate::state::AppState;

/// POST /pusher/auth
pub async fn channel_auth(
    State(state): State<AppState>,
    Extension(app): Extension<Arc<Application>>,
    request: Request,
) -> Result<Json<ChannelAuthResponse>, ApiError> {
    let req: ChannelAuthRequest = read_body(request).await?;

    let socket_id = SocketId::parse(&req.socket_id)
        .map_err(|e| AppError::authentication(e.message))?;
    validate_channel_name(&req.channel_name, state.config.realtime.max_channel_name_length)
        .map_err(|e| AppError::authentication(e.message))?;

    let channel_data = if ChannelKind::from_name(&req.channel_name).is_presence() {
        let raw = req.channel_data.ok_or_else(|| {
            AppError::validation("Presence channels require 'channel_data'")
        })?;
        PresenceMember::from_channel_data(&raw)?;
        Some(raw)
    } else {
        None
    };

    let auth = app.signer().channel_auth(
        socket_id.as_str(),
        &req.channel_name,
        channel_data.as_deref(),
    );
    debug!(app_id = %app.id(), socket_id = %socket_id, channel = %req.channel_name, "Signed channel auth");

    Ok(Json(ChannelAuthResponse { auth, channel_data }))
}

/// POST /pusher/user-auth
pub async fn user_auth(
    Extension(app): Extension<Arc<Application>>,
    request: Request,
) -> Result<Json<UserAuthResponse>, ApiError> {
    let req: UserAuthRequest = read_body(request).await?;

    let socket_id = SocketId::parse(&req.socket_id)
        .map_err(|e| AppError::authentication(e.message))?;
    let user: Value = serde_json::from_str(&req.user_data)
        .map_err(|_| AppError::validation("'user_data' must be a JSON object"))?;
    if !user.get("id").is_some_and(|id| id.is_string() || id.is_number()) {
        return Err(AppError::validation("'user_data' is missing 'id'").into());
    }

    let auth = app.signer().user_auth(socket_id.as_str(), &req.user_data);
    Ok(Json(UserAuthResponse {
        auth,
        user_data: req.user_data,
    }))
}

async fn read_body<T: DeserializeOwned>(request: Request) -> Result<T, ApiError> {
    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    let parsed = if is_json {
        Json::<T>::from_request(request, &())
            .await
            .map(|Json(body)| body)
            .map_err(|e| e.body_text())
    } else {
        Form::<T>::from_request(request, &())
            .await
            .map(|Form(body)| body)
            .map_err(|e| e.body_text())
    };

    parsed.map_err(|reason| AppError::authentication(format!("Invalid auth request: {reason}")).into())
}

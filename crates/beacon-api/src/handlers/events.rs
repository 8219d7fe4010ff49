//! Event trigger endpoints.

use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::Json;
use tracing::debug;
use validator::Validate;

use beacon_core::error::AppError;
use beacon_realtime::message::validator::{validate_channel_name, validate_event_name};
use beacon_realtime::{Application, SocketId};

use crate::dto::request::{BatchEventsRequest, TriggerEventRequest};
use crate::dto::response::EmptyResponse;
use crate::error::ApiError;
use crate::state::AppState;

/// POST /apps/{app_id}/events
pub async fn trigger(
    State(state): State<AppState>,
    Extension(app): Extension<Arc<Application>>,
    Json(req): Json<TriggerEventRequest>,
) -> Result<Json<EmptyResponse>, ApiError> {
    req.validate()?;
    validate_event_name(&req.name)?;

    let channels = req.target_channels();
    if channels.is_empty() {
        return Err(AppError::validation("Either 'channel' or 'channels' is required").into());
    }
    let max_length = state.config.realtime.max_channel_name_length;
    for channel in &channels {
        validate_channel_name(channel, max_length)?;
    }
    let except = parse_socket_id(req.socket_id.as_deref())?;

    let delivered = state.realtime.dispatcher.dispatch_to_multiple(
        app.id(),
        &channels,
        &req.name,
        req.data,
        except.as_ref(),
    );
    debug!(app_id = %app.id(), event = %req.name, channels = channels.len(), delivered, "Triggered event");

    Ok(Json(EmptyResponse::default()))
}

/// POST /apps/{app_id}/batch_events
///
/// The whole batch is validated before anything is dispatched.
pub async fn trigger_batch(
    State(state): State<AppState>,
    Extension(app): Extension<Arc<Application>>,
    Json(req): Json<BatchEventsRequest>,
) -> Result<Json<EmptyResponse>, ApiError> {
    req.validate()?;

    let max_length = state.config.realtime.max_channel_name_length;
    let mut prepared = Vec::with_capacity(req.batch.len());
    for event in req.batch {
        validate_event_name(&event.name)?;
        validate_channel_name(&event.channel, max_length)?;
        let except = parse_socket_id(event.socket_id.as_deref())?;
        prepared.push((event, except));
    }

    for (event, except) in prepared {
        state.realtime.dispatcher.dispatch(
            app.id(),
            &event.channel,
            &event.name,
            event.data,
            except.as_ref(),
        );
    }

    Ok(Json(EmptyResponse::default()))
}

fn parse_socket_id(raw: Option<&str>) -> Result<Option<SocketId>, AppError> {
    raw.filter(|s| !s.is_empty()).map(SocketId::parse).transpose()
}

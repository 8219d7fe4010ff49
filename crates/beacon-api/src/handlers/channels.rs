//! Channel inspection endpoints.

use std::sync::Arc;

use axum::extract::{Extension, Path, Query};
use axum::Json;

use beacon_core::error::AppError;
use beacon_realtime::Application;
use beacon_realtime::channel::ChannelKind;

use crate::dto::request::{ChannelQuery, ChannelsQuery, wants};
use crate::dto::response::{
    ChannelResponse, ChannelSummary, ChannelsResponse, UserEntry, UsersResponse,
};
use crate::error::ApiError;

/// GET /apps/{app_id}/channels
pub async fn list(
    Extension(app): Extension<Arc<Application>>,
    Query(query): Query<ChannelsQuery>,
) -> Json<ChannelsResponse> {
    let with_users = wants(query.info.as_deref(), "user_count");
    let channels = app
        .channels()
        .list_channels(query.filter_by_prefix.as_deref())
        .into_iter()
        .map(|name| {
            let user_count = if with_users {
                app.channels().info(&name).user_count
            } else {
                None
            };
            (name, ChannelSummary { user_count })
        })
        .collect();

    Json(ChannelsResponse { channels })
}

/// GET /apps/{app_id}/channels/{channel_name}
pub async fn show(
    Extension(app): Extension<Arc<Application>>,
    Path((_app_id, channel_name)): Path<(String, String)>,
    Query(query): Query<ChannelQuery>,
) -> Json<ChannelResponse> {
    let info = app.channels().info(&channel_name);
    let info_list = query.info.as_deref();

    Json(ChannelResponse {
        occupied: info.occupied,
        subscription_count: wants(info_list, "subscription_count")
            .then_some(info.subscription_count),
        user_count: if wants(info_list, "user_count") {
            info.user_count
        } else {
            None
        },
    })
}

/// GET /apps/{app_id}/channels/{channel_name}/users
pub async fn users(
    Extension(app): Extension<Arc<Application>>,
    Path((_app_id, channel_name)): Path<(String, String)>,
) -> Result<Json<UsersResponse>, ApiError> {
    if !ChannelKind::from_name(&channel_name).is_presence() {
        return Err(AppError::validation(format!(
            "'{channel_name}' is not a presence channel"
        ))
        .into());
    }

    let users = app
        .channels()
        .members(&channel_name)
        .into_iter()
        .map(|member| UserEntry { id: member.user_id })
        .collect();

    Ok(Json(UsersResponse { users }))
}

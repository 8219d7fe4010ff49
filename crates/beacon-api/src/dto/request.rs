//! Request DTOs with validation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

/// Most channels a single trigger may target.
pub const MAX_TRIGGER_CHANNELS: u64 = 100;
/// Most events a single batch may carry.
pub const MAX_BATCH_EVENTS: u64 = 10;

/// `POST /apps/{app_id}/events` body.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TriggerEventRequest {
    /// Event name.
    #[validate(length(min = 1, max = 200, message = "Event name is required"))]
    pub name: String,
    /// Payload; strings are forwarded verbatim.
    #[serde(default)]
    pub data: Value,
    /// Single target channel.
    pub channel: Option<String>,
    /// Multiple target channels.
    #[validate(length(max = 100, message = "At most 100 channels per trigger"))]
    pub channels: Option<Vec<String>>,
    /// Socket to exclude from delivery.
    pub socket_id: Option<String>,
}

impl TriggerEventRequest {
    /// Target channels: `channels` when given, else `channel`.
    pub fn target_channels(&self) -> Vec<String> {
        match (&self.channels, &self.channel) {
            (Some(channels), _) if !channels.is_empty() => channels.clone(),
            (_, Some(channel)) => vec![channel.clone()],
            _ => Vec::new(),
        }
    }
}

/// One entry of a batch trigger.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BatchEvent {
    /// Event name.
    #[validate(length(min = 1, max = 200, message = "Event name is required"))]
    pub name: String,
    /// Target channel.
    #[validate(length(min = 1, message = "Channel is required"))]
    pub channel: String,
    /// Payload.
    #[serde(default)]
    pub data: Value,
    /// Socket to exclude from delivery.
    pub socket_id: Option<String>,
}

/// `POST /apps/{app_id}/batch_events` body.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BatchEventsRequest {
    /// Events, dispatched in order.
    #[validate(length(min = 1, max = 10, message = "A batch holds 1 to 10 events"))]
    #[validate(nested)]
    pub batch: Vec<BatchEvent>,
}

/// `GET /apps/{app_id}/channels` query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelsQuery {
    /// Only channels starting with this prefix.
    pub filter_by_prefix: Option<String>,
    /// Comma-separated attributes to include.
    pub info: Option<String>,
}

/// `GET /apps/{app_id}/channels/{channel_name}` query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelQuery {
    /// Comma-separated attributes to include.
    pub info: Option<String>,
}

/// Whether a comma-separated `info` list names `attribute`.
pub fn wants(info: Option<&str>, attribute: &str) -> bool {
    info.is_some_and(|info| info.split(',').any(|a| a.trim() == attribute))
}

/// `POST /pusher/auth` body, as form or JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelAuthRequest {
    /// Socket requesting access.
    pub socket_id: String,
    /// Channel being joined.
    pub channel_name: String,
    /// Presence member data, JSON-encoded.
    pub channel_data: Option<String>,
}

/// `POST /pusher/user-auth` body, as form or JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAuthRequest {
    /// Socket signing in.
    pub socket_id: String,
    /// User data, JSON-encoded, with at least an `id`.
    pub user_data: String,
}

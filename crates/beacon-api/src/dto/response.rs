//! Response DTOs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Empty JSON object, returned by trigger and terminate endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmptyResponse {}

/// Per-channel attributes in a channel listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelSummary {
    /// Distinct presence users, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_count: Option<usize>,
}

/// `GET /apps/{app_id}/channels` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelsResponse {
    /// Occupied channels by name.
    pub channels: BTreeMap<String, ChannelSummary>,
}

/// `GET /apps/{app_id}/channels/{channel_name}` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelResponse {
    /// Whether anyone is subscribed.
    pub occupied: bool,
    /// Connection count, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_count: Option<usize>,
    /// Distinct presence users, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_count: Option<usize>,
}

/// One presence user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEntry {
    /// User id
    pub id: String,
}

/// `GET /apps/{app_id}/channels/{channel_name}/users` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersResponse {
    /// Present users.
    pub users: Vec<UserEntry>,
}

/// `POST /pusher/auth` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelAuthResponse {
    /// `"<key>:<signature>"`
    pub auth: String,
    /// Echoed presence data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_data: Option<String>,
}

/// `POST /pusher/user-auth` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAuthResponse {
    /// `"<key>:<signature>"`
    pub auth: String,
    /// Echoed user data.
    pub user_data: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the process serves requests.
    pub status: String,
}

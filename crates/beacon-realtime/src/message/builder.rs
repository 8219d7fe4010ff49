//! Builders for the Pusher protocol frames the server emits.

use serde_json::{Value, json};

use beacon_core::error::{AppError, ErrorKind};

use super::types::Message;

/// Pusher error and close codes.
pub mod codes {
    /// Application does not exist.
    pub const APP_NOT_FOUND: u16 = 4001;
    /// Application is over its connection quota.
    pub const OVER_QUOTA: u16 = 4004;
    /// Subscription rejected or connection terminated by the API.
    pub const UNAUTHORIZED: u16 = 4009;
    /// Connection idle past its activity timeout.
    pub const PONG_NOT_RECEIVED: u16 = 4201;
    /// Client event rejected.
    pub const CLIENT_EVENT_REJECTED: u16 = 4301;
    /// Normal closure.
    pub const NORMAL: u16 = 1000;
    /// Server going away.
    pub const GOING_AWAY: u16 = 1001;
}

/// `pusher:connection_established`
pub fn connection_established(socket_id: &str, activity_timeout_secs: u64) -> Message {
    Message::new(
        "pusher:connection_established",
        None,
        json!({ "socket_id": socket_id, "activity_timeout": activity_timeout_secs }),
    )
}

/// `pusher_internal:subscription_succeeded`, with the member list for presence channels.
pub fn subscription_succeeded(channel: &str, presence: Option<Value>) -> Message {
    let data = match presence {
        Some(presence) => json!({ "presence": presence }),
        None => json!({}),
    };
    Message::new(
        "pusher_internal:subscription_succeeded",
        Some(channel.to_string()),
        data,
    )
}

/// `pusher_internal:member_added`
pub fn member_added(channel: &str, user_id: &str, user_info: &Value) -> Message {
    Message::new(
        "pusher_internal:member_added",
        Some(channel.to_string()),
        json!({ "user_id": user_id, "user_info": user_info }),
    )
}

/// `pusher_internal:member_removed`
pub fn member_removed(channel: &str, user_id: &str) -> Message {
    Message::new(
        "pusher_internal:member_removed",
        Some(channel.to_string()),
        json!({ "user_id": user_id }),
    )
}

/// `pusher:signin_success`
pub fn signin_success(user_data: &str) -> Message {
    Message::new(
        "pusher:signin_success",
        None,
        json!({ "user_data": user_data }),
    )
}

/// `pusher:error` with an optional numeric code.
pub fn error(code: Option<u16>, message: impl Into<String>) -> Message {
    Message::new(
        "pusher:error",
        None,
        json!({ "code": code, "message": message.into() }),
    )
}

/// `pusher:ping`
pub fn ping() -> Message {
    Message::new("pusher:ping", None, json!({}))
}

/// `pusher:pong`
pub fn pong() -> Message {
    Message::new("pusher:pong", None, json!({}))
}

/// Close code for an error that ends a connection attempt.
pub fn close_code_for(err: &AppError) -> u16 {
    match err.kind {
        ErrorKind::NotFound => codes::APP_NOT_FOUND,
        ErrorKind::ConnectionLimit => codes::OVER_QUOTA,
        ErrorKind::Unauthorized | ErrorKind::Authentication => codes::UNAUTHORIZED,
        _ => codes::GOING_AWAY,
    }
}

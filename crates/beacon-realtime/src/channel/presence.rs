//! Presence member identity carried by presence subscriptions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use beacon_core::error::AppError;

/// A user joining a presence channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceMember {
    /// User id, normalized to a string.
    pub user_id: String,
    /// Arbitrary user info shown to other members.
    #[serde(default)]
    pub user_info: Value,
}

impl PresenceMember {
    /// Creates a member.
    pub fn new(user_id: impl Into<String>, user_info: Value) -> Self {
        Self {
            user_id: user_id.into(),
            user_info,
        }
    }

    /// Parses the `channel_data` JSON string of a presence subscription.
    ///
    /// `user_id` may be a string or a number.
    pub fn from_channel_data(channel_data: &str) -> Result<Self, AppError> {
        let value: Value = serde_json::from_str(channel_data)
            .map_err(|e| AppError::validation(format!("Invalid channel_data: {e}")))?;

        let user_id = match value.get("user_id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => return Err(AppError::validation("channel_data is missing 'user_id'")),
        };

        let user_info = value.get("user_info").cloned().unwrap_or(Value::Null);
        Ok(Self { user_id, user_info })
    }
}

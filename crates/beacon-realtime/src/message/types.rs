//! The protocol message model shared by inbound and outbound traffic.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use beacon_core::error::AppError;

/// Events whose `data` travels as a JSON object instead of an encoded string.
const RAW_DATA_EVENTS: &[&str] = &["pusher:error", "pusher:ping", "pusher:pong"];

/// One protocol event.
///
/// A `Message` is immutable once built: every transformation returns a new
/// instance, so the same message can be read concurrently during broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    channel: Option<String>,
    #[serde(default)]
    data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
}

impl Message {
    /// Builds a message from its parts.
    pub fn new(event: impl Into<String>, channel: Option<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            channel,
            data,
            user_id: None,
        }
    }

    /// Parses a raw frame.
    ///
    /// Fails on invalid JSON, a non-object payload, or a missing/empty
    /// `event`. A `data` field holding a JSON-encoded string is decoded
    /// one level.
    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        let value: Value = serde_json::from_str(raw)?;
        let Value::Object(mut object) = value else {
            return Err(AppError::validation("Message must be a JSON object"));
        };

        let event = match object.remove("event") {
            Some(Value::String(event)) if !event.is_empty() => event,
            _ => return Err(AppError::validation("Message is missing the 'event' field")),
        };

        let channel = match object.remove("channel") {
            Some(Value::String(channel)) => Some(channel),
            Some(Value::Null) | None => None,
            Some(_) => return Err(AppError::validation("'channel' must be a string")),
        };

        let data = match object.remove("data") {
            Some(Value::String(encoded)) => {
                serde_json::from_str(&encoded).unwrap_or(Value::String(encoded))
            }
            Some(other) => other,
            None => Value::Null,
        };

        Ok(Self {
            event,
            channel,
            data,
            user_id: None,
        })
    }

    /// Event name.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Target channel, if any.
    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    /// Payload.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Structured payload, when `data` is a key-value object.
    pub fn data_object(&self) -> Option<&Map<String, Value>> {
        self.data.as_object()
    }

    /// Originating user for client events on presence channels.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Returns a copy with a different event name.
    pub fn with_event(&self, event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            ..self.clone()
        }
    }

    /// Returns a copy with a different channel.
    pub fn with_channel(&self, channel: impl Into<String>) -> Self {
        Self {
            channel: Some(channel.into()),
            ..self.clone()
        }
    }

    /// Returns a copy with a different payload.
    pub fn with_data(&self, data: Value) -> Self {
        Self {
            data,
            ..self.clone()
        }
    }

    /// Returns a copy tagged with the originating user.
    pub fn with_user_id(&self, user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..self.clone()
        }
    }

    /// Serializes the message as a wire frame.
    ///
    /// Pusher clients expect `data` as a JSON-encoded string, except for the
    /// few protocol events that carry a plain object.
    pub fn to_frame(&self) -> String {
        let mut frame = Map::new();
        frame.insert("event".into(), Value::String(self.event.clone()));
        if let Some(channel) = &self.channel {
            frame.insert("channel".into(), Value::String(channel.clone()));
        }

        let data = if RAW_DATA_EVENTS.contains(&self.event.as_str()) {
            Some(self.data.clone())
        } else {
            match &self.data {
                Value::Null => None,
                Value::String(s) => Some(Value::String(s.clone())),
                other => Some(Value::String(other.to_string())),
            }
        };
        if let Some(data) = data {
            frame.insert("data".into(), data);
        }

        if let Some(user_id) = &self.user_id {
            frame.insert("user_id".into(), Value::String(user_id.clone()));
        }

        Value::Object(frame).to_string()
    }
}

//! Real-time WebSocket engine configuration.

use serde::{Deserialize, Serialize};

/// Real-time (WebSocket) engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Per-connection outbound frame buffer.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer_size: usize,
    /// Maximum size of an inbound frame in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Maximum channel name length.
    #[serde(default = "default_max_channel_name_length")]
    pub max_channel_name_length: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            outbound_buffer_size: default_outbound_buffer(),
            max_message_size: default_max_message_size(),
            max_channel_name_length: default_max_channel_name_length(),
        }
    }
}

fn default_outbound_buffer() -> usize {
    256
}

fn default_max_message_size() -> usize {
    10_240
}

fn default_max_channel_name_length() -> usize {
    200
}

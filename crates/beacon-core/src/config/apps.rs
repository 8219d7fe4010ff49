//! Tenant application configuration.

use serde::{Deserialize, Serialize};

/// One tenant application as declared in configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Routing identifier used by the HTTP API.
    pub id: String,
    /// Public key presented by clients.
    pub key: String,
    /// Secret used for HMAC signatures. Never transmitted.
    pub secret: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Maximum simultaneous connections (0 = unlimited).
    #[serde(default)]
    pub max_connections: u64,
    /// Idle seconds after which a connection is pruned.
    #[serde(default = "default_activity_timeout")]
    pub activity_timeout: u64,
    /// Idle seconds after which the server pings a connection.
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    /// Whether `client-*` events may be sent by connections.
    #[serde(default = "default_true")]
    pub enable_client_messages: bool,
    /// Whether this application's traffic is recorded in metrics.
    #[serde(default = "default_true")]
    pub enable_statistics: bool,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            key: String::new(),
            secret: String::new(),
            name: String::new(),
            max_connections: 0,
            activity_timeout: default_activity_timeout(),
            ping_interval: default_ping_interval(),
            enable_client_messages: true,
            enable_statistics: true,
        }
    }
}

impl std::fmt::Debug for ApplicationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationConfig")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("secret", &"[redacted]")
            .field("name", &self.name)
            .field("max_connections", &self.max_connections)
            .field("activity_timeout", &self.activity_timeout)
            .field("ping_interval", &self.ping_interval)
            .field("enable_client_messages", &self.enable_client_messages)
            .field("enable_statistics", &self.enable_statistics)
            .finish()
    }
}

fn default_activity_timeout() -> u64 {
    120
}

fn default_ping_interval() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

//! A single tenant application.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use beacon_core::config::ApplicationConfig;
use beacon_core::error::AppError;
use beacon_core::events::EventBus;

use crate::auth::AuthSigner;
use crate::channel::ChannelManager;

/// Tenant with its own credentials, quota, timeouts and channel namespace.
///
/// Built once from configuration; only its channel state changes afterwards.
pub struct Application {
    id: String,
    key: String,
    name: String,
    max_connections: u64,
    activity_timeout: Duration,
    ping_interval: Duration,
    enable_client_messages: bool,
    enable_statistics: bool,
    signer: AuthSigner,
    channels: ChannelManager,
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("name", &self.name)
            .field("max_connections", &self.max_connections)
            .finish_non_exhaustive()
    }
}

impl Application {
    /// Builds an application and its channel manager.
    pub fn from_config(config: &ApplicationConfig, events: EventBus) -> Result<Self, AppError> {
        let signer = AuthSigner::new(config.key.clone(), &config.secret)?;
        Ok(Self {
            id: config.id.clone(),
            key: config.key.clone(),
            name: config.name.clone(),
            max_connections: config.max_connections,
            activity_timeout: Duration::from_secs(config.activity_timeout),
            ping_interval: Duration::from_secs(config.ping_interval),
            enable_client_messages: config.enable_client_messages,
            enable_statistics: config.enable_statistics,
            signer,
            channels: ChannelManager::new(config.id.clone(), events),
        })
    }

    /// Routing id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Public key presented by clients.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Connection quota; 0 means unlimited.
    pub fn max_connections(&self) -> u64 {
        self.max_connections
    }

    /// Idle time after which a connection is pruned.
    pub fn activity_timeout(&self) -> Duration {
        self.activity_timeout
    }

    /// Idle time after which a connection is pinged.
    pub fn ping_interval(&self) -> Duration {
        self.ping_interval
    }

    /// Whether `client-*` events are accepted.
    pub fn client_messages_enabled(&self) -> bool {
        self.enable_client_messages
    }

    /// Whether traffic is recorded in metrics.
    pub fn statistics_enabled(&self) -> bool {
        self.enable_statistics
    }

    /// HMAC signer keyed with this application's secret.
    pub fn signer(&self) -> &AuthSigner {
        &self.signer
    }

    /// This application's channels.
    pub fn channels(&self) -> &ChannelManager {
        &self.channels
    }

    /// Public metadata; never includes the secret.
    pub fn summary(&self, connection_count: usize) -> ApplicationSummary {
        ApplicationSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            key: self.key.clone(),
            max_connections: self.max_connections,
            activity_timeout: self.activity_timeout.as_secs(),
            ping_interval: self.ping_interval.as_secs(),
            enable_client_messages: self.enable_client_messages,
            connection_count,
            channel_count: self.channels.channel_count(),
        }
    }
}

/// Serializable application metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationSummary {
    /// Routing id
    pub id: String,
    /// Display name
    pub name: String,
    /// Public key
    pub key: String,
    /// Connection quota
    pub max_connections: u64,
    /// Activity timeout in seconds
    pub activity_timeout: u64,
    /// Ping interval in seconds
    pub ping_interval: u64,
    /// Whether client events are enabled
    pub enable_client_messages: bool,
    /// Live connections
    pub connection_count: usize,
    /// Occupied channels
    pub channel_count: usize,
}

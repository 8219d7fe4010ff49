//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section. Configuration is loaded once at startup and passed by
//! reference; it is never reloaded while the process runs.

pub mod app;
pub mod apps;
pub mod logging;
pub mod realtime;
pub mod worker;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

pub use self::app::{CorsConfig, ServerConfig};
pub use self::apps::ApplicationConfig;
pub use self::logging::LoggingConfig;
pub use self::realtime::RealtimeConfig;
pub use self::worker::WorkerConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Tenant applications served by this process.
    #[serde(default)]
    pub apps: Vec<ApplicationConfig>,
    /// Real-time WebSocket settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,
    /// Housekeeping job settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `BEACON_`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("BEACON")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field invariants that serde cannot express.
    ///
    /// Every application needs a non-empty id, key, and secret, and ids and
    /// keys must be unique across the process.
    pub fn validate(&self) -> Result<(), AppError> {
        let mut ids = HashSet::new();
        let mut keys = HashSet::new();

        for app in &self.apps {
            if app.id.trim().is_empty() || app.key.trim().is_empty() || app.secret.is_empty() {
                return Err(AppError::configuration(format!(
                    "Application '{}' must define id, key, and secret",
                    app.id
                )));
            }
            if !ids.insert(app.id.as_str()) {
                return Err(AppError::configuration(format!(
                    "Duplicate application id '{}'",
                    app.id
                )));
            }
            if !keys.insert(app.key.as_str()) {
                return Err(AppError::configuration(format!(
                    "Duplicate application key '{}'",
                    app.key
                )));
            }
        }

        Ok(())
    }
}

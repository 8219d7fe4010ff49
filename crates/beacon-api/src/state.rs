//! Application state shared across all handlers and middleware.

use std::sync::Arc;

use beacon_core::config::AppConfig;
use beacon_realtime::RealtimeEngine;

/// Shared dependencies, passed to every handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// WebSocket realtime engine
    pub realtime: Arc<RealtimeEngine>,
}

impl AppState {
    /// Wraps an engine built from `config`.
    pub fn new(config: Arc<AppConfig>, realtime: Arc<RealtimeEngine>) -> Self {
        Self { config, realtime }
    }
}

//! Top-level real-time engine that ties together all subsystems.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use beacon_core::config::AppConfig;
use beacon_core::error::AppError;
use beacon_core::events::EventBus;

use crate::application::ApplicationManager;
use crate::connection::manager::ConnectionManager;
use crate::connection::registry::ConnectionRegistry;
use crate::dispatcher::{EventDispatcher, FilterStage};
use crate::message::builder::codes;
use crate::metrics::EngineMetrics;

/// Central real-time engine shared by the HTTP layer and the workers.
#[derive(Clone)]
pub struct RealtimeEngine {
    /// Application directory.
    pub apps: Arc<ApplicationManager>,
    /// Connection lifecycle and protocol handling.
    pub connections: Arc<ConnectionManager>,
    /// Event dispatch.
    pub dispatcher: EventDispatcher,
    /// Broker event bus.
    pub events: EventBus,
    /// Metrics registry.
    pub metrics: Arc<EngineMetrics>,
    recorder: Arc<JoinHandle<()>>,
}

impl std::fmt::Debug for RealtimeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeEngine")
            .field("apps", &self.apps.all().len())
            .field("connections", &self.apps.registry().total())
            .finish()
    }
}

impl RealtimeEngine {
    /// Creates the engine from configuration.
    ///
    /// Must be called inside a Tokio runtime: the metrics recorder is
    /// spawned here.
    pub fn new(config: &AppConfig) -> Result<Self, AppError> {
        Self::build(config, None)
    }

    /// Creates the engine with a filter stage on every dispatch.
    pub fn with_filter_stage(config: &AppConfig, stage: FilterStage) -> Result<Self, AppError> {
        Self::build(config, Some(stage))
    }

    fn build(config: &AppConfig, stage: Option<FilterStage>) -> Result<Self, AppError> {
        let events = EventBus::default();
        let registry = Arc::new(ConnectionRegistry::new());
        let apps = Arc::new(ApplicationManager::new(
            &config.apps,
            registry,
            events.clone(),
        )?);

        let silenced = config
            .apps
            .iter()
            .filter(|app| !app.enable_statistics)
            .map(|app| app.id.clone());
        let metrics = Arc::new(EngineMetrics::new(silenced)?);
        let recorder = Arc::new(metrics.spawn_recorder(&events));

        let mut dispatcher = EventDispatcher::new(apps.clone(), events.clone());
        if let Some(stage) = stage {
            dispatcher = dispatcher.with_stage(stage);
        }

        let connections = Arc::new(ConnectionManager::new(
            apps.clone(),
            dispatcher.clone(),
            metrics.clone(),
            events.clone(),
            config.realtime.clone(),
        ));

        info!(apps = config.apps.len(), "Real-time engine initialized");

        Ok(Self {
            apps,
            connections,
            dispatcher,
            events,
            metrics,
            recorder,
        })
    }

    /// Closes every connection and stops the metrics recorder.
    pub fn shutdown(&self) -> usize {
        info!("Shutting down real-time engine");
        let closed = self
            .connections
            .close_all(codes::GOING_AWAY, "Server shutting down");
        self.recorder.abort();
        info!(closed, "Real-time engine shut down");
        closed
    }
}

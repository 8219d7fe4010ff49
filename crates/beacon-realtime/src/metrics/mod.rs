//! Prometheus metrics for the real-time engine.
//!
//! Connection lifecycle counters are recorded directly by the connection
//! manager; everything else is derived from the broker event bus by
//! [`EngineMetrics::spawn_recorder`].

use std::collections::HashSet;
use std::sync::Arc;

use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use beacon_core::error::{AppError, ErrorKind};
use beacon_core::events::{BrokerEvent, EventBus};

/// Engine metric families and the registry that exposes them.
pub struct EngineMetrics {
    registry: Registry,
    connections_total: IntCounterVec,
    connections_active: IntGaugeVec,
    connections_rejected: IntCounterVec,
    connections_pruned: IntCounterVec,
    messages_sent: IntCounterVec,
    messages_received: IntCounterVec,
    channels_created: IntCounterVec,
    silenced: HashSet<String>,
}

impl std::fmt::Debug for EngineMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineMetrics")
            .field("silenced", &self.silenced)
            .finish_non_exhaustive()
    }
}

impl EngineMetrics {
    /// Creates and registers every metric family.
    ///
    /// Applications listed in `silenced` are never recorded.
    pub fn new(silenced: impl IntoIterator<Item = String>) -> Result<Self, AppError> {
        let registry = Registry::new();

        let connections_total = counter(
            &registry,
            "beacon_connections_total",
            "Connections accepted",
            &["app_id"],
        )?;
        let connections_active = {
            let gauge = IntGaugeVec::new(
                Opts::new("beacon_connections_active", "Currently open connections"),
                &["app_id"],
            )
            .map_err(metric_error)?;
            registry
                .register(Box::new(gauge.clone()))
                .map_err(metric_error)?;
            gauge
        };
        let connections_rejected = counter(
            &registry,
            "beacon_connections_rejected_total",
            "Connections refused at handshake",
            &["app_id", "reason"],
        )?;
        let connections_pruned = counter(
            &registry,
            "beacon_connections_pruned_total",
            "Connections evicted for inactivity",
            &["app_id"],
        )?;
        let messages_sent = counter(
            &registry,
            "beacon_messages_sent_total",
            "Frames queued to subscribers by broadcasts",
            &["app_id"],
        )?;
        let messages_received = counter(
            &registry,
            "beacon_messages_received_total",
            "Frames received from connections",
            &["app_id"],
        )?;
        let channels_created = counter(
            &registry,
            "beacon_channels_created_total",
            "Channels that became occupied",
            &["app_id"],
        )?;

        Ok(Self {
            registry,
            connections_total,
            connections_active,
            connections_rejected,
            connections_pruned,
            messages_sent,
            messages_received,
            channels_created,
            silenced: silenced.into_iter().collect(),
        })
    }

    fn enabled(&self, app_id: &str) -> bool {
        !self.silenced.contains(app_id)
    }

    /// A connection was admitted.
    pub fn connection_opened(&self, app_id: &str) {
        if self.enabled(app_id) {
            self.connections_total.with_label_values(&[app_id]).inc();
            self.connections_active.with_label_values(&[app_id]).inc();
        }
    }

    /// An admitted connection was closed.
    pub fn connection_closed(&self, app_id: &str) {
        if self.enabled(app_id) {
            self.connections_active.with_label_values(&[app_id]).dec();
        }
    }

    /// A handshake was refused.
    pub fn connection_rejected(&self, app_id: &str, reason: &str) {
        if self.enabled(app_id) {
            self.connections_rejected
                .with_label_values(&[app_id, reason])
                .inc();
        }
    }

    /// Applies one broker event.
    pub fn record(&self, event: &BrokerEvent) {
        let app_id = event.app_id();
        if !self.enabled(app_id) {
            return;
        }
        match event {
            BrokerEvent::ChannelCreated { .. } => {
                self.channels_created.with_label_values(&[app_id]).inc();
            }
            BrokerEvent::ChannelRemoved { .. } => {}
            BrokerEvent::ConnectionPruned { .. } => {
                self.connections_pruned.with_label_values(&[app_id]).inc();
            }
            BrokerEvent::MessageSent { recipients, .. } => {
                self.messages_sent
                    .with_label_values(&[app_id])
                    .inc_by(*recipients as u64);
            }
            BrokerEvent::MessageReceived { .. } => {
                self.messages_received.with_label_values(&[app_id]).inc();
            }
        }
    }

    /// Consumes the event bus until it closes.
    pub fn spawn_recorder(self: &Arc<Self>, events: &EventBus) -> JoinHandle<()> {
        let metrics = Arc::clone(self);
        let mut rx = events.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(envelope) => metrics.record(&envelope.event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Metrics recorder lagged behind the event bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Metrics recorder stopped");
        })
    }

    /// Prometheus text exposition of every family.
    pub fn render(&self) -> Result<String, AppError> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metric_error)?;
        String::from_utf8(buffer).map_err(|e| {
            AppError::with_source(ErrorKind::Internal, "Metrics output is not UTF-8", e)
        })
    }
}

fn counter(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<IntCounterVec, AppError> {
    let counter = IntCounterVec::new(Opts::new(name, help), labels).map_err(metric_error)?;
    registry
        .register(Box::new(counter.clone()))
        .map_err(metric_error)?;
    Ok(counter)
}

fn metric_error(err: prometheus::Error) -> AppError {
    AppError::with_source(ErrorKind::Internal, "Metrics registry error", err)
}

//! Broker events emitted by the real-time engine.
//!
//! Events are published on an [`EventBus`] and consumed by in-process
//! observers such as the metrics recorder. The variant set is fixed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Union of all broker event types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BrokerEvent {
    /// A channel became occupied and was added to its manager.
    ChannelCreated {
        /// Owning application.
        app_id: String,
        /// Channel name.
        channel: String,
    },
    /// A channel lost its last subscriber and was removed.
    ChannelRemoved {
        /// Owning application.
        app_id: String,
        /// Channel name.
        channel: String,
    },
    /// A stale connection was evicted by the prune job.
    ConnectionPruned {
        /// Owning application.
        app_id: String,
        /// Socket id of the evicted connection.
        socket_id: String,
    },
    /// A message was broadcast to a channel.
    MessageSent {
        /// Owning application.
        app_id: String,
        /// Target channel.
        channel: String,
        /// Event name.
        event: String,
        /// Number of connections the frame was queued for.
        recipients: usize,
    },
    /// A frame was received from a connection.
    MessageReceived {
        /// Owning application.
        app_id: String,
        /// Sending connection.
        socket_id: String,
        /// Event name.
        event: String,
    },
}

impl BrokerEvent {
    /// Application the event belongs to.
    pub fn app_id(&self) -> &str {
        match self {
            Self::ChannelCreated { app_id, .. }
            | Self::ChannelRemoved { app_id, .. }
            | Self::ConnectionPruned { app_id, .. }
            | Self::MessageSent { app_id, .. }
            | Self::MessageReceived { app_id, .. } => app_id,
        }
    }
}

/// Timestamped event as delivered to observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// The event payload.
    pub event: BrokerEvent,
}

/// Fan-out bus for [`BrokerEvent`]s.
///
/// Publishing never blocks and never fails; events published while no
/// observer is subscribed are discarded. Slow observers lag and skip.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Creates a bus that buffers up to `capacity` events per observer.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all current observers.
    pub fn publish(&self, event: BrokerEvent) {
        let _ = self.tx.send(EventEnvelope {
            timestamp: Utc::now(),
            event,
        });
    }

    /// Registers a new observer.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

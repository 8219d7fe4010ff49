//! Per-application channel registry.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use beacon_core::error::AppError;
use beacon_core::events::{BrokerEvent, EventBus};

use crate::connection::handle::{Connection, SocketId};
use crate::message::{Message, builder};

use super::channel::Channel;
use super::presence::PresenceMember;
use super::types::ChannelKind;

/// Occupancy snapshot of one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Whether the channel has at least one subscriber.
    pub occupied: bool,
    /// Number of subscribed connections.
    pub subscription_count: usize,
    /// Distinct presence members; `None` for non-presence channels.
    pub user_count: Option<usize>,
}

/// Creates, looks up and removes the channels of one application.
///
/// Creation happens inside the map's entry lock and removal uses
/// `remove_if` on emptiness, so a subscribe can never attach to a channel
/// that is being removed and an occupied channel is never dropped.
#[derive(Debug)]
pub struct ChannelManager {
    app_id: String,
    channels: DashMap<String, Channel>,
    events: EventBus,
}

impl ChannelManager {
    /// Creates an empty manager for `app_id`.
    pub fn new(app_id: impl Into<String>, events: EventBus) -> Self {
        Self {
            app_id: app_id.into(),
            channels: DashMap::new(),
            events,
        }
    }

    /// Owning application.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Subscribes `connection` to `name`, creating the channel on first use.
    ///
    /// The subscription ack is queued before the channel lock is released,
    /// so it always precedes any broadcast the new subscriber receives.
    /// Subscribing twice re-sends the ack without adding a second entry.
    ///
    /// A closed connection is never attached. If the connection closes
    /// while the subscribe is in flight, the subscription is rolled back
    /// here, since the close path may already have taken its channel set.
    pub fn subscribe(
        &self,
        name: &str,
        connection: &Arc<Connection>,
        member: Option<PresenceMember>,
    ) -> Result<(), AppError> {
        let kind = ChannelKind::from_name(name);
        if kind.is_presence() && member.is_none() {
            return Err(AppError::validation(format!(
                "Presence channel '{name}' requires channel_data"
            )));
        }

        let mut created = false;
        {
            let mut channel = self.channels.entry(name.to_string()).or_insert_with(|| {
                created = true;
                Channel::new(name)
            });

            if connection.is_alive() && channel.subscribe(connection, member) {
                connection.add_channel(name);
            }

            if connection.is_alive() {
                let presence = kind.is_presence().then(|| channel.presence_data());
                connection.send(&builder::subscription_succeeded(name, presence));
            }
        }

        if created {
            debug!(app_id = %self.app_id, channel = %name, "Channel created");
            self.events.publish(BrokerEvent::ChannelCreated {
                app_id: self.app_id.clone(),
                channel: name.to_string(),
            });
        }

        if !connection.is_alive() {
            connection.remove_channel(name);
            self.unsubscribe(name, connection.socket_id());
            // a channel created for a subscriber that never attached
            self.remove_channel(name);
            return Err(AppError::service_unavailable("Connection is closed"));
        }

        Ok(())
    }

    /// Removes a subscriber and drops the channel once it is empty.
    ///
    /// Returns whether the connection was subscribed.
    pub fn unsubscribe(&self, name: &str, socket_id: &SocketId) -> bool {
        let removed = match self.channels.get_mut(name) {
            Some(mut channel) => channel.unsubscribe(socket_id),
            None => false,
        };

        if removed {
            self.remove_channel(name);
        }
        removed
    }

    /// Removes `name` if it has no subscribers. Returns whether it was removed.
    pub fn remove_channel(&self, name: &str) -> bool {
        let removed = self
            .channels
            .remove_if(name, |_, channel| channel.is_empty())
            .is_some();

        if removed {
            debug!(app_id = %self.app_id, channel = %name, "Channel removed");
            self.events.publish(BrokerEvent::ChannelRemoved {
                app_id: self.app_id.clone(),
                channel: name.to_string(),
            });
        }
        removed
    }

    /// Broadcasts to one channel. A missing channel delivers to nobody.
    pub fn broadcast(&self, name: &str, message: &Message, except: Option<&SocketId>) -> usize {
        match self.channels.get(name) {
            Some(channel) => channel.broadcast(message, except),
            None => {
                debug!(app_id = %self.app_id, channel = %name, "Broadcast to unoccupied channel");
                0
            }
        }
    }

    /// Occupied channel names, optionally restricted to a prefix, sorted.
    pub fn list_channels(&self, prefix: Option<&str>) -> Vec<String> {
        let mut names: Vec<String> = self
            .channels
            .iter()
            .filter(|entry| prefix.is_none_or(|p| entry.key().starts_with(p)))
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Occupancy info. Unknown channels report unoccupied.
    pub fn info(&self, name: &str) -> ChannelInfo {
        let presence = ChannelKind::from_name(name).is_presence();
        match self.channels.get(name) {
            Some(channel) => ChannelInfo {
                occupied: channel.is_occupied(),
                subscription_count: channel.subscription_count(),
                user_count: presence.then(|| channel.user_count()),
            },
            None => ChannelInfo {
                occupied: false,
                subscription_count: 0,
                user_count: presence.then_some(0),
            },
        }
    }

    /// Presence members of a channel.
    pub fn members(&self, name: &str) -> Vec<PresenceMember> {
        self.channels
            .get(name)
            .map(|channel| channel.members())
            .unwrap_or_default()
    }

    /// Snapshot of a channel's subscribed connections.
    pub fn connections(&self, name: &str) -> Vec<Arc<Connection>> {
        self.channels
            .get(name)
            .map(|channel| channel.connections())
            .unwrap_or_default()
    }

    /// Whether `socket_id` is subscribed to `name`.
    pub fn is_subscribed(&self, name: &str, socket_id: &SocketId) -> bool {
        self.channels
            .get(name)
            .is_some_and(|channel| channel.has_subscriber(socket_id))
    }

    /// Number of occupied channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

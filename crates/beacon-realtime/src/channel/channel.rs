//! Single channel with subscriber and presence member tracking.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};

use serde_json::{Map, Value, json};

use crate::connection::handle::{Connection, SocketId};
use crate::message::{Message, builder};

use super::presence::PresenceMember;
use super::types::ChannelKind;

#[derive(Debug)]
struct Subscriber {
    connection: Weak<Connection>,
    user_id: Option<String>,
}

#[derive(Debug)]
struct Member {
    user_info: Value,
    connections: usize,
}

/// One named topic within one application.
///
/// Methods never block: frames are queued with non-blocking sends, so a
/// channel can be mutated while its manager holds the shard lock.
#[derive(Debug)]
pub struct Channel {
    name: String,
    kind: ChannelKind,
    subscribers: HashMap<SocketId, Subscriber>,
    members: BTreeMap<String, Member>,
}

impl Channel {
    /// Creates an empty channel.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: ChannelKind::from_name(&name),
            name,
            subscribers: HashMap::new(),
            members: BTreeMap::new(),
        }
    }

    /// Channel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Channel kind.
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Adds a subscriber.
    ///
    /// On a presence channel the first connection of a user notifies every
    /// existing subscriber with `member_added`; further connections of the
    /// same user do not. Returns `false` if the connection was already
    /// subscribed.
    pub fn subscribe(&mut self, connection: &Arc<Connection>, member: Option<PresenceMember>) -> bool {
        let socket_id = connection.socket_id();
        if self.subscribers.contains_key(socket_id) {
            return false;
        }

        let member = member.filter(|_| self.kind.is_presence());
        let user_id = member.as_ref().map(|m| m.user_id.clone());

        if let Some(member) = member {
            match self.members.get_mut(&member.user_id) {
                Some(existing) => existing.connections += 1,
                None => {
                    let added = builder::member_added(&self.name, &member.user_id, &member.user_info);
                    self.broadcast(&added, Some(socket_id));
                    self.members.insert(
                        member.user_id,
                        Member {
                            user_info: member.user_info,
                            connections: 1,
                        },
                    );
                }
            }
        }

        self.subscribers.insert(
            socket_id.clone(),
            Subscriber {
                connection: Arc::downgrade(connection),
                user_id,
            },
        );
        true
    }

    /// Removes a subscriber.
    ///
    /// On a presence channel `member_removed` fires only when the user's
    /// last connection leaves. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&mut self, socket_id: &SocketId) -> bool {
        let Some(subscriber) = self.subscribers.remove(socket_id) else {
            return false;
        };

        if let Some(user_id) = subscriber.user_id {
            let last = match self.members.get_mut(&user_id) {
                Some(member) => {
                    member.connections = member.connections.saturating_sub(1);
                    member.connections == 0
                }
                None => false,
            };
            if last {
                self.members.remove(&user_id);
                self.broadcast(&builder::member_removed(&self.name, &user_id), None);
            }
        }

        true
    }

    /// Sends `message` to every subscriber except `except`.
    ///
    /// Serializes once. A subscriber that cannot take the frame is skipped
    /// without affecting the others. Returns the number of recipients the
    /// frame was queued for.
    pub fn broadcast(&self, message: &Message, except: Option<&SocketId>) -> usize {
        let frame = message.to_frame();
        let mut delivered = 0;

        for (socket_id, subscriber) in &self.subscribers {
            if Some(socket_id) == except {
                continue;
            }
            match subscriber.connection.upgrade() {
                Some(connection) if connection.send_raw(frame.as_str()) => delivered += 1,
                _ => {
                    tracing::debug!(
                        channel = %self.name,
                        socket_id = %socket_id,
                        "Skipping subscriber that cannot receive"
                    );
                }
            }
        }

        delivered
    }

    /// Read-only snapshot of subscribed connections.
    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.subscribers
            .values()
            .filter_map(|s| s.connection.upgrade())
            .collect()
    }

    /// Whether `socket_id` is subscribed.
    pub fn has_subscriber(&self, socket_id: &SocketId) -> bool {
        self.subscribers.contains_key(socket_id)
    }

    /// Number of subscribed connections.
    pub fn subscription_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Number of distinct presence members.
    pub fn user_count(&self) -> usize {
        self.members.len()
    }

    /// Whether anyone is subscribed.
    pub fn is_occupied(&self) -> bool {
        !self.subscribers.is_empty()
    }

    /// Whether the subscriber set is empty.
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Presence members, ordered by user id.
    pub fn members(&self) -> Vec<PresenceMember> {
        self.members
            .iter()
            .map(|(id, m)| PresenceMember::new(id.clone(), m.user_info.clone()))
            .collect()
    }

    /// `{ids, hash, count}` payload for presence subscription acks.
    pub fn presence_data(&self) -> Value {
        let ids: Vec<&String> = self.members.keys().collect();
        let hash: Map<String, Value> = self
            .members
            .iter()
            .map(|(id, m)| (id.clone(), m.user_info.clone()))
            .collect();
        json!({ "ids": ids, "hash": hash, "count": self.members.len() })
    }
}

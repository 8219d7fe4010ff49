//! Channel kind derived from the channel name.

use serde::{Deserialize, Serialize};

/// Access model of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Open to any connection.
    Public,
    /// `private-` prefix: requires a signed subscription.
    Private,
    /// `presence-` prefix: signed subscription plus member tracking.
    Presence,
}

impl ChannelKind {
    /// Derives the kind from a channel name.
    pub fn from_name(name: &str) -> Self {
        if name.starts_with("presence-") {
            Self::Presence
        } else if name.starts_with("private-") {
            Self::Private
        } else {
            Self::Public
        }
    }

    /// Whether subscribing requires a signature.
    pub fn requires_auth(self) -> bool {
        matches!(self, Self::Private | Self::Presence)
    }

    /// Whether member identity is tracked.
    pub fn is_presence(self) -> bool {
        self == Self::Presence
    }

    /// Whether `client-*` events may be sent on the channel.
    pub fn allows_client_events(self) -> bool {
        self.requires_auth()
    }
}

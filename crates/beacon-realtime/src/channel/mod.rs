//! Channels: kinds, presence members, per-channel state, and the per-application manager.

pub mod channel;
pub mod manager;
pub mod presence;
pub mod types;

pub use channel::Channel;
pub use manager::{ChannelInfo, ChannelManager};
pub use presence::PresenceMember;
pub use types::ChannelKind;

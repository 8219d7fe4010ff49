//! # beacon-realtime
//!
//! Pusher-compatible real-time engine for Beacon. Provides:
//!
//! - Multi-tenant applications with per-app quotas and channel namespaces
//! - WebSocket connection lifecycle and the client protocol handler
//! - Public, private and presence channels with HMAC channel auth
//! - Event dispatch with an optional filter/transform stage
//! - Prometheus metrics fed by the broker event bus

pub mod application;
pub mod auth;
pub mod channel;
pub mod connection;
pub mod dispatcher;
pub mod message;
pub mod metrics;
pub mod server;

pub use application::{Application, ApplicationManager};
pub use auth::AuthSigner;
pub use channel::ChannelManager;
pub use connection::{Connection, ConnectionManager, ConnectionRegistry, SocketId};
pub use dispatcher::{EventDispatcher, FilterStage};
pub use message::Message;
pub use metrics::EngineMetrics;
pub use server::RealtimeEngine;

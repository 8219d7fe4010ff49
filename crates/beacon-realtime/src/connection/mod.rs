//! WebSocket connections: handles, the live registry, and lifecycle management.

pub mod handle;
pub mod manager;
pub mod registry;

pub use handle::{CloseReason, Connection, SocketId};
pub use manager::ConnectionManager;
pub use registry::ConnectionRegistry;

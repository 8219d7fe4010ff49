//! # beacon-api
//!
//! HTTP API layer for Beacon built on Axum.
//!
//! Provides the Pusher-compatible REST endpoints, the WebSocket upgrade,
//! request signature verification, CORS and logging middleware, DTOs, and
//! error mapping.

pub mod app;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::{build_app, run_server};
pub use error::ApiError;
pub use state::AppState;

//! Route handlers organized by domain.

pub mod apps;
pub mod auth;
pub mod channels;
pub mod events;
pub mod health;
pub mod metrics;
pub mod users;
pub mod ws;

//! Periodic housekeeping for the Beacon broker.
//!
//! This crate provides:
//! - The [`Job`] trait for interval-driven tasks
//! - A [`JobManager`] that starts and stops jobs independently
//! - The liveness jobs that ping idle connections and prune stale ones

pub mod job;
pub mod jobs;
pub mod manager;

pub use job::{Job, JobError};
pub use jobs::{PingInactiveConnectionsJob, PruneStaleConnectionsJob};
pub use manager::JobManager;

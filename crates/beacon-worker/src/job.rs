//! Job trait and errors.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use beacon_core::error::AppError;

/// A task run on a fixed interval.
#[async_trait]
pub trait Job: Send + Sync + std::fmt::Debug {
    /// Time between runs. Must be non-zero.
    fn interval(&self) -> Duration;

    /// Runs one tick and returns a summary for logging.
    async fn run(&self) -> Result<Value, JobError>;
}

/// Error from job management or execution
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// No job registered under the name
    #[error("Job '{0}' is not registered")]
    NotFound(String),

    /// The job's interval cannot be scheduled
    #[error("Invalid schedule for job '{name}': {reason}")]
    InvalidSchedule {
        /// Job name
        name: String,
        /// What is wrong
        reason: String,
    },

    /// The underlying scheduler failed
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// A run failed
    #[error("Job failed: {0}")]
    Failed(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

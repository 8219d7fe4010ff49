//! Prune-stale job: evicts connections past their activity timeout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use beacon_realtime::ConnectionManager;

use crate::job::{Job, JobError};

/// Closes every connection whose idle time exceeds its application's
/// activity timeout. The normal close path cascades channel and presence
/// cleanup.
#[derive(Debug)]
pub struct PruneStaleConnectionsJob {
    connections: Arc<ConnectionManager>,
    tick: Duration,
}

impl PruneStaleConnectionsJob {
    /// Creates the job with its tick interval.
    pub fn new(connections: Arc<ConnectionManager>, tick: Duration) -> Self {
        Self { connections, tick }
    }
}

#[async_trait]
impl Job for PruneStaleConnectionsJob {
    fn interval(&self) -> Duration {
        self.tick
    }

    async fn run(&self) -> Result<Value, JobError> {
        let live = self.connections.live();
        let mut pruned = 0usize;

        for (connection, app) in &live {
            if connection.is_stale(app.activity_timeout()) && self.connections.prune(connection) {
                pruned += 1;
            }
        }

        if pruned > 0 {
            tracing::info!(pruned, "Pruned stale connections");
        }
        Ok(json!({ "checked": live.len(), "pruned": pruned }))
    }
}

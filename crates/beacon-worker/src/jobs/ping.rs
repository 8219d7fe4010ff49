//! Ping-inactive job: probes connections that have gone quiet.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use beacon_realtime::ConnectionManager;

use crate::job::{Job, JobError};

/// Pings every connection idle for at least its application's ping interval.
///
/// Never closes anything; eviction is the prune job's concern.
#[derive(Debug)]
pub struct PingInactiveConnectionsJob {
    connections: Arc<ConnectionManager>,
    tick: Duration,
}

impl PingInactiveConnectionsJob {
    /// Creates the job with its tick interval.
    pub fn new(connections: Arc<ConnectionManager>, tick: Duration) -> Self {
        Self { connections, tick }
    }
}

#[async_trait]
impl Job for PingInactiveConnectionsJob {
    fn interval(&self) -> Duration {
        self.tick
    }

    async fn run(&self) -> Result<Value, JobError> {
        let live = self.connections.live();
        let mut pinged = 0usize;

        for (connection, app) in &live {
            if connection.idle_for() >= app.ping_interval() && self.connections.ping(connection) {
                tracing::debug!(
                    app_id = %app.id(),
                    socket_id = %connection.socket_id(),
                    "Pinged inactive connection"
                );
                pinged += 1;
            }
        }

        Ok(json!({ "checked": live.len(), "pinged": pinged }))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use beacon_core::config::{AppConfig, ApplicationConfig};
    use beacon_realtime::RealtimeEngine;
    use chrono::Utc;

    use super::*;

    fn engine() -> RealtimeEngine {
        let config = AppConfig {
            apps: vec![
                ApplicationConfig {
                    id: "fast".into(),
                    key: "fast-key".into(),
                    secret: "s".into(),
                    ping_interval: 30,
                    ..ApplicationConfig::default()
                },
                ApplicationConfig {
                    id: "slow".into(),
                    key: "slow-key".into(),
                    secret: "s".into(),
                    ping_interval: 300,
                    ..ApplicationConfig::default()
                },
            ],
            ..AppConfig::default()
        };
        RealtimeEngine::new(&config).expect("engine")
    }

    fn drained_events(rx: &mut tokio::sync::mpsc::Receiver<String>) -> Vec<String> {
        let mut events = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            let value: Value = serde_json::from_str(&frame).expect("json");
            events.push(value["event"].as_str().unwrap_or_default().to_string());
        }
        events
    }

    #[tokio::test]
    async fn test_pings_only_connections_idle_past_interval() {
        let engine = engine();
        let (idle, mut idle_rx) = engine.connections.open("fast-key", HashMap::new()).expect("open");
        let (active, mut active_rx) = engine.connections.open("fast-key", HashMap::new()).expect("open");
        idle.set_last_activity(Utc::now() - chrono::Duration::seconds(31));
        active.set_last_activity(Utc::now() - chrono::Duration::seconds(10));
        drained_events(&mut idle_rx);
        drained_events(&mut active_rx);

        let job = PingInactiveConnectionsJob::new(engine.connections.clone(), Duration::from_secs(10));
        let summary = job.run().await.expect("run");

        assert_eq!(summary["pinged"], 1);
        assert_eq!(drained_events(&mut idle_rx), vec!["pusher:ping".to_string()]);
        assert!(drained_events(&mut active_rx).is_empty());
        assert!(idle.is_alive());
    }

    #[tokio::test]
    async fn test_uses_each_connections_own_application() {
        let engine = engine();
        let (fast, mut fast_rx) = engine.connections.open("fast-key", HashMap::new()).expect("open");
        let (slow, mut slow_rx) = engine.connections.open("slow-key", HashMap::new()).expect("open");
        for conn in [&fast, &slow] {
            conn.set_last_activity(Utc::now() - chrono::Duration::seconds(60));
        }
        drained_events(&mut fast_rx);
        drained_events(&mut slow_rx);

        let job = PingInactiveConnectionsJob::new(engine.connections.clone(), Duration::from_secs(10));
        job.run().await.expect("run");

        assert_eq!(drained_events(&mut fast_rx), vec!["pusher:ping".to_string()]);
        assert!(drained_events(&mut slow_rx).is_empty());
    }
}

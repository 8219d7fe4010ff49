//! Registry of live connections, grouped by owning application.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use beacon_core::error::AppError;

use super::handle::{Connection, SocketId};

/// Maps live connections to their application.
///
/// Quota enforcement and insertion happen under the same shard lock, so two
/// concurrent connects can never both take the last free slot.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    apps: DashMap<String, HashMap<SocketId, Arc<Connection>>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection unless its application already holds
    /// `max_connections` (0 = unlimited).
    pub fn register(&self, connection: Arc<Connection>, max_connections: u64) -> Result<(), AppError> {
        let mut entry = self
            .apps
            .entry(connection.app_id().to_string())
            .or_default();

        if max_connections > 0 && entry.len() as u64 >= max_connections {
            return Err(AppError::connection_limit(format!(
                "Application '{}' is over its quota of {} connections",
                connection.app_id(),
                max_connections
            )));
        }

        entry.insert(connection.socket_id().clone(), connection);
        Ok(())
    }

    /// Removes a connection. Returns it only on the first call.
    pub fn unregister(&self, app_id: &str, socket_id: &SocketId) -> Option<Arc<Connection>> {
        let removed = self
            .apps
            .get_mut(app_id)
            .and_then(|mut conns| conns.remove(socket_id));
        self.apps.remove_if(app_id, |_, conns| conns.is_empty());
        removed
    }

    /// Looks up a connection.
    pub fn get(&self, app_id: &str, socket_id: &SocketId) -> Option<Arc<Connection>> {
        self.apps
            .get(app_id)
            .and_then(|conns| conns.get(socket_id).cloned())
    }

    /// Live connections for one application.
    pub fn count_for_app(&self, app_id: &str) -> usize {
        self.apps.get(app_id).map(|conns| conns.len()).unwrap_or(0)
    }

    /// Live connections across every application.
    pub fn total(&self) -> usize {
        self.apps.iter().map(|conns| conns.len()).sum()
    }

    /// Snapshot of one application's connections.
    pub fn for_app(&self, app_id: &str) -> Vec<Arc<Connection>> {
        self.apps
            .get(app_id)
            .map(|conns| conns.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot of one user's connections within an application.
    pub fn for_user(&self, app_id: &str, user_id: &str) -> Vec<Arc<Connection>> {
        self.for_app(app_id)
            .into_iter()
            .filter(|conn| conn.user_id().as_deref() == Some(user_id))
            .collect()
    }

    /// Snapshot of every connection, for housekeeping.
    pub fn all(&self) -> Vec<Arc<Connection>> {
        self.apps
            .iter()
            .flat_map(|conns| conns.values().cloned().collect::<Vec<_>>())
            .collect()
    }
}

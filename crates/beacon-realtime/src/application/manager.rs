//! Tenant directory: lookup by id or key and connection quota enforcement.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use beacon_core::config::ApplicationConfig;
use beacon_core::error::AppError;
use beacon_core::events::EventBus;

use crate::connection::handle::Connection;
use crate::connection::registry::ConnectionRegistry;

use super::app::Application;

/// Immutable directory of configured applications.
#[derive(Debug)]
pub struct ApplicationManager {
    by_id: HashMap<String, Arc<Application>>,
    id_by_key: HashMap<String, String>,
    registry: Arc<ConnectionRegistry>,
}

impl ApplicationManager {
    /// Builds every application from configuration.
    ///
    /// Duplicate ids or keys are a configuration error.
    pub fn new(
        configs: &[ApplicationConfig],
        registry: Arc<ConnectionRegistry>,
        events: EventBus,
    ) -> Result<Self, AppError> {
        let mut by_id = HashMap::with_capacity(configs.len());
        let mut id_by_key = HashMap::with_capacity(configs.len());

        for config in configs {
            if by_id.contains_key(&config.id) {
                return Err(AppError::configuration(format!(
                    "Duplicate application id '{}'",
                    config.id
                )));
            }
            if id_by_key.contains_key(&config.key) {
                return Err(AppError::configuration(format!(
                    "Duplicate application key '{}'",
                    config.key
                )));
            }

            let app = Application::from_config(config, events.clone())?;
            id_by_key.insert(config.key.clone(), config.id.clone());
            by_id.insert(config.id.clone(), Arc::new(app));
        }

        info!(apps = by_id.len(), "Applications loaded");

        Ok(Self {
            by_id,
            id_by_key,
            registry,
        })
    }

    /// Looks up an application by id.
    pub fn get(&self, app_id: &str) -> Option<Arc<Application>> {
        self.by_id.get(app_id).cloned()
    }

    /// Looks up an application by its public key.
    pub fn get_by_key(&self, key: &str) -> Option<Arc<Application>> {
        self.id_by_key.get(key).and_then(|id| self.get(id))
    }

    /// Looks up an application by id, failing with `NotFound`.
    pub fn require(&self, app_id: &str) -> Result<Arc<Application>, AppError> {
        self.get(app_id)
            .ok_or_else(|| AppError::not_found(format!("Application '{app_id}' not found")))
    }

    /// Fails with `ConnectionLimit` when the application is at its quota.
    ///
    /// Advisory only: [`admit`](Self::admit) repeats the check atomically.
    pub fn check_connection_quota(&self, app_id: &str) -> Result<(), AppError> {
        let app = self.require(app_id)?;
        let max = app.max_connections();
        if max > 0 && self.registry.count_for_app(app_id) as u64 >= max {
            return Err(AppError::connection_limit(format!(
                "Application '{app_id}' is over its quota of {max} connections"
            )));
        }
        Ok(())
    }

    /// Registers a connection against its application's quota.
    pub fn admit(&self, connection: Arc<Connection>) -> Result<(), AppError> {
        let app = self.require(connection.app_id())?;
        self.registry.register(connection, app.max_connections())
    }

    /// Live connections for an application.
    pub fn connection_count(&self, app_id: &str) -> usize {
        self.registry.count_for_app(app_id)
    }

    /// All applications, ordered by id.
    pub fn all(&self) -> Vec<Arc<Application>> {
        let mut apps: Vec<_> = self.by_id.values().cloned().collect();
        apps.sort_by(|a, b| a.id().cmp(b.id()));
        apps
    }

    /// Shared connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(id: &str, key: &str, max: u64) -> ApplicationConfig {
        ApplicationConfig {
            id: id.to_string(),
            key: key.to_string(),
            secret: format!("{id}-secret"),
            max_connections: max,
            ..ApplicationConfig::default()
        }
    }

    fn manager(configs: &[ApplicationConfig]) -> ApplicationManager {
        ApplicationManager::new(configs, Arc::new(ConnectionRegistry::new()), EventBus::default())
            .expect("apps")
    }

    #[test]
    fn test_lookup_by_id_and_key() {
        let apps = manager(&[config("1", "key-1", 0), config("2", "key-2", 0)]);

        assert_eq!(apps.get("1").expect("by id").key(), "key-1");
        assert_eq!(apps.get_by_key("key-2").expect("by key").id(), "2");
        assert!(apps.get("3").is_none());
        assert!(apps.get_by_key("nope").is_none());
        assert_eq!(
            apps.require("3").unwrap_err().kind,
            beacon_core::error::ErrorKind::NotFound
        );
    }

    #[test]
    fn test_duplicates_rejected() {
        let registry = Arc::new(ConnectionRegistry::new());
        let dup_id = [config("1", "a", 0), config("1", "b", 0)];
        assert!(ApplicationManager::new(&dup_id, registry.clone(), EventBus::default()).is_err());

        let dup_key = [config("1", "a", 0), config("2", "a", 0)];
        assert!(ApplicationManager::new(&dup_key, registry, EventBus::default()).is_err());
    }

    #[test]
    fn test_quota_counts_live_connections() {
        let apps = manager(&[config("1", "key-1", 2), config("2", "key-2", 0)]);

        for _ in 0..2 {
            let (conn, _rx) = Connection::new("1", HashMap::new(), 4);
            apps.admit(conn).expect("within quota");
        }
        assert!(apps.check_connection_quota("1").is_err());

        let (extra, _rx) = Connection::new("1", HashMap::new(), 4);
        assert!(apps.admit(extra).is_err());
        assert_eq!(apps.connection_count("1"), 2);

        for _ in 0..5 {
            let (conn, _rx) = Connection::new("2", HashMap::new(), 4);
            apps.admit(conn).expect("unlimited");
        }
        assert!(apps.check_connection_quota("2").is_ok());
    }

    #[test]
    fn test_each_app_owns_its_channels() {
        let apps = manager(&[config("1", "key-1", 0), config("2", "key-2", 0)]);
        let (conn, _rx) = Connection::new("1", HashMap::new(), 4);

        apps.get("1")
            .expect("app")
            .channels()
            .subscribe("news", &conn, None)
            .expect("subscribe");

        assert!(apps.get("1").expect("app").channels().info("news").occupied);
        assert!(!apps.get("2").expect("app").channels().info("news").occupied);
    }

    #[test]
    fn test_summary_omits_secret() {
        let apps = manager(&[config("1", "key-1", 5)]);
        let summary = serde_json::to_value(apps.get("1").expect("app").summary(0)).expect("json");

        assert_eq!(summary["max_connections"], 5);
        assert!(summary.get("secret").is_none());
        assert!(!summary.to_string().contains("1-secret"));
    }
}

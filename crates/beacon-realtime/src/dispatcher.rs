//! Routes triggered events to channel subscribers.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use beacon_core::events::{BrokerEvent, EventBus};

use crate::application::{Application, ApplicationManager};
use crate::connection::handle::SocketId;
use crate::message::{Criterion, Message, MessageFilter, TransformRule};

/// Optional predicate and transform applied to every dispatched message.
#[derive(Debug, Clone)]
pub struct FilterStage {
    filter: Arc<dyn MessageFilter>,
    criteria: Vec<Criterion>,
    rules: Vec<TransformRule>,
}

impl FilterStage {
    /// Creates a stage. Messages failing `criteria` are dropped; survivors
    /// are rewritten by `rules` in order.
    pub fn new(
        filter: Arc<dyn MessageFilter>,
        criteria: Vec<Criterion>,
        rules: Vec<TransformRule>,
    ) -> Self {
        Self {
            filter,
            criteria,
            rules,
        }
    }

    fn apply(&self, message: Message) -> Option<Message> {
        if !self.filter.filter(&message, &self.criteria) {
            return None;
        }
        if self.rules.is_empty() {
            return Some(message);
        }
        Some(self.filter.transform(&message, &self.rules))
    }
}

/// Best-effort fan-out of events to the channels of one application.
///
/// Unknown applications and unoccupied channels are logged and skipped;
/// nothing here returns an error.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    apps: Arc<ApplicationManager>,
    events: EventBus,
    stage: Option<FilterStage>,
}

impl EventDispatcher {
    /// Creates a dispatcher without a filter stage.
    pub fn new(apps: Arc<ApplicationManager>, events: EventBus) -> Self {
        Self {
            apps,
            events,
            stage: None,
        }
    }

    /// Installs a filter stage.
    pub fn with_stage(mut self, stage: FilterStage) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Broadcasts `event` to one channel. Returns the recipient count.
    pub fn dispatch(
        &self,
        app_id: &str,
        channel: &str,
        event: &str,
        data: Value,
        except: Option<&SocketId>,
    ) -> usize {
        let message = Message::new(event, Some(channel.to_string()), data);
        self.dispatch_message(app_id, message, except)
    }

    /// Broadcasts `event` to each channel independently.
    pub fn dispatch_to_multiple(
        &self,
        app_id: &str,
        channels: &[String],
        event: &str,
        data: Value,
        except: Option<&SocketId>,
    ) -> usize {
        let Some(app) = self.resolve(app_id) else {
            return 0;
        };
        let message = Message::new(event, None, data);
        channels
            .iter()
            .map(|channel| self.deliver(&app, message.with_channel(channel.as_str()), except))
            .sum()
    }

    /// Broadcasts a prepared message to its channel.
    pub fn dispatch_message(&self, app_id: &str, message: Message, except: Option<&SocketId>) -> usize {
        match self.resolve(app_id) {
            Some(app) => self.deliver(&app, message, except),
            None => 0,
        }
    }

    fn resolve(&self, app_id: &str) -> Option<Arc<Application>> {
        let app = self.apps.get(app_id);
        if app.is_none() {
            warn!(app_id = %app_id, "Dispatch to unknown application ignored");
        }
        app
    }

    fn deliver(&self, app: &Application, message: Message, except: Option<&SocketId>) -> usize {
        let message = match &self.stage {
            Some(stage) => match stage.apply(message) {
                Some(message) => message,
                None => {
                    debug!(app_id = %app.id(), "Message rejected by filter stage");
                    return 0;
                }
            },
            None => message,
        };

        let Some(channel) = message.channel() else {
            warn!(app_id = %app.id(), event = %message.event(), "Dispatch without a channel ignored");
            return 0;
        };

        let recipients = app.channels().broadcast(channel, &message, except);
        self.events.publish(BrokerEvent::MessageSent {
            app_id: app.id().to_string(),
            channel: channel.to_string(),
            event: message.event().to_string(),
            recipients,
        });
        recipients
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use beacon_core::config::ApplicationConfig;
    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::connection::handle::Connection;
    use crate::connection::registry::ConnectionRegistry;
    use crate::message::DefaultMessageFilter;

    fn setup() -> (EventDispatcher, Arc<ApplicationManager>) {
        let config = ApplicationConfig {
            id: "1".into(),
            key: "key".into(),
            secret: "secret".into(),
            ..ApplicationConfig::default()
        };
        let events = EventBus::new(64);
        let apps = Arc::new(
            ApplicationManager::new(&[config], Arc::new(ConnectionRegistry::new()), events.clone())
                .expect("apps"),
        );
        (EventDispatcher::new(apps.clone(), events), apps)
    }

    fn subscriber(apps: &ApplicationManager, channel: &str) -> (Arc<Connection>, mpsc::Receiver<String>) {
        let (conn, mut rx) = Connection::new("1", HashMap::new(), 16);
        apps.get("1")
            .expect("app")
            .channels()
            .subscribe(channel, &conn, None)
            .expect("subscribe");
        rx.try_recv().expect("ack");
        (conn, rx)
    }

    fn frame(rx: &mut mpsc::Receiver<String>) -> Value {
        serde_json::from_str(&rx.try_recv().expect("frame")).expect("json")
    }

    #[test]
    fn test_dispatch_excludes_sender() {
        let (dispatcher, apps) = setup();
        let (a, mut rx_a) = subscriber(&apps, "X");
        let (_b, mut rx_b) = subscriber(&apps, "X");

        let delivered = dispatcher.dispatch("1", "X", "update", json!({"n": 1}), Some(a.socket_id()));

        assert_eq!(delivered, 1);
        assert!(rx_a.try_recv().is_err());
        let f = frame(&mut rx_b);
        assert_eq!(f["event"], "update");
        assert_eq!(f["channel"], "X");
        assert_eq!(f["data"], r#"{"n":1}"#);
    }

    #[test]
    fn test_unknown_app_is_noop() {
        let (dispatcher, _apps) = setup();
        assert_eq!(dispatcher.dispatch("missing", "X", "e", json!({}), None), 0);
    }

    #[test]
    fn test_multiple_channels_fan_out_independently() {
        let (dispatcher, apps) = setup();
        let (_a, mut rx_a) = subscriber(&apps, "one");
        let (_b, mut rx_b) = subscriber(&apps, "two");

        let channels = vec!["one".to_string(), "empty".to_string(), "two".to_string()];
        let delivered = dispatcher.dispatch_to_multiple("1", &channels, "e", json!({}), None);

        assert_eq!(delivered, 2);
        assert_eq!(frame(&mut rx_a)["channel"], "one");
        assert_eq!(frame(&mut rx_b)["channel"], "two");
    }

    #[test]
    fn test_filter_stage_drops_and_transforms() {
        let (dispatcher, apps) = setup();
        let criteria = vec![Criterion::from_entry("event", json!("keep-*"))];
        let rules = vec![TransformRule::ChangeEvent("renamed".into())];
        let dispatcher = dispatcher.with_stage(FilterStage::new(
            Arc::new(DefaultMessageFilter),
            criteria,
            rules,
        ));
        let (_a, mut rx) = subscriber(&apps, "X");

        assert_eq!(dispatcher.dispatch("1", "X", "drop-me", json!({}), None), 0);
        assert_eq!(dispatcher.dispatch("1", "X", "keep-me", json!({}), None), 1);
        assert_eq!(frame(&mut rx)["event"], "renamed");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_message_sent_is_published() {
        let (dispatcher, apps) = setup();
        let mut events = dispatcher.events.subscribe();
        let (_a, _rx) = subscriber(&apps, "X");
        while events.try_recv().is_ok() {}

        dispatcher.dispatch("1", "X", "e", json!({}), None);

        let envelope = events.try_recv().expect("event");
        assert_eq!(
            envelope.event,
            BrokerEvent::MessageSent {
                app_id: "1".into(),
                channel: "X".into(),
                event: "e".into(),
                recipients: 1,
            }
        );
    }
}

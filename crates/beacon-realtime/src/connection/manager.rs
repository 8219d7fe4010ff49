//! Connection manager: handshake admission, the inbound protocol handler,
//! and the close path that cascades channel and presence cleanup.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use beacon_core::config::RealtimeConfig;
use beacon_core::error::{AppError, ErrorKind};
use beacon_core::events::{BrokerEvent, EventBus};

use crate::application::{Application, ApplicationManager};
use crate::channel::{ChannelKind, PresenceMember};
use crate::dispatcher::EventDispatcher;
use crate::message::builder::{self, codes};
use crate::message::{Message, validator};
use crate::metrics::EngineMetrics;

use super::handle::{Connection, SocketId};

/// Owns the lifecycle of every WebSocket connection.
#[derive(Debug)]
pub struct ConnectionManager {
    apps: Arc<ApplicationManager>,
    dispatcher: EventDispatcher,
    metrics: Arc<EngineMetrics>,
    events: EventBus,
    config: RealtimeConfig,
}

impl ConnectionManager {
    /// Creates a connection manager.
    pub fn new(
        apps: Arc<ApplicationManager>,
        dispatcher: EventDispatcher,
        metrics: Arc<EngineMetrics>,
        events: EventBus,
        config: RealtimeConfig,
    ) -> Self {
        Self {
            apps,
            dispatcher,
            metrics,
            events,
            config,
        }
    }

    /// Application directory.
    pub fn apps(&self) -> &Arc<ApplicationManager> {
        &self.apps
    }

    /// Admits a new connection for `app_key`.
    ///
    /// Unknown keys fail with `NotFound` and a full application with
    /// `ConnectionLimit`; in both cases nothing is registered. On success
    /// `pusher:connection_established` is already queued on the returned
    /// receiver.
    pub fn open(
        &self,
        app_key: &str,
        attributes: HashMap<String, String>,
    ) -> Result<(Arc<Connection>, mpsc::Receiver<String>), AppError> {
        let app = self.apps.get_by_key(app_key).ok_or_else(|| {
            warn!(app_key = %app_key, "Connection for unknown application key");
            AppError::not_found(format!("Application with key '{app_key}' does not exist"))
        })?;

        let (connection, receiver) =
            Connection::new(app.id(), attributes, self.config.outbound_buffer_size);

        if let Err(err) = self.apps.admit(Arc::clone(&connection)) {
            warn!(
                app_id = %app.id(),
                max_connections = app.max_connections(),
                "Connection rejected: over quota"
            );
            self.metrics.connection_rejected(app.id(), "over_quota");
            return Err(err);
        }

        self.metrics.connection_opened(app.id());
        connection.send(&builder::connection_established(
            connection.socket_id().as_str(),
            app.activity_timeout().as_secs(),
        ));

        info!(
            app_id = %app.id(),
            socket_id = %connection.socket_id(),
            "WebSocket connection established"
        );

        Ok((connection, receiver))
    }

    /// Processes one inbound text frame.
    ///
    /// Every frame refreshes the connection's activity, even one that is
    /// later rejected. Malformed frames are dropped without touching any
    /// channel state.
    pub fn handle_inbound(&self, connection: &Arc<Connection>, raw: &str) {
        connection.touch();

        if let Err(err) = validator::validate_inbound(raw, self.config.max_message_size) {
            connection.send(&builder::error(None, err.message));
            return;
        }

        let message = match Message::from_json(raw) {
            Ok(message) => message,
            Err(err) => {
                debug!(
                    socket_id = %connection.socket_id(),
                    error = %err,
                    "Dropping malformed frame"
                );
                return;
            }
        };

        self.events.publish(BrokerEvent::MessageReceived {
            app_id: connection.app_id().to_string(),
            socket_id: connection.socket_id().to_string(),
            event: message.event().to_string(),
        });

        match message.event() {
            "pusher:ping" => {
                connection.send(&builder::pong());
            }
            "pusher:pong" => {}
            "pusher:subscribe" => {
                if let Err(err) = self.subscribe(connection, &message) {
                    reject(connection, protocol_code(&err), &err);
                }
            }
            "pusher:unsubscribe" => self.unsubscribe(connection, &message),
            "pusher:signin" => {
                if let Err(err) = self.signin(connection, &message) {
                    reject(connection, protocol_code(&err), &err);
                }
            }
            event if event.starts_with("client-") => {
                if let Err(err) = self.client_event(connection, message) {
                    reject(connection, Some(codes::CLIENT_EVENT_REJECTED), &err);
                }
            }
            other => {
                debug!(socket_id = %connection.socket_id(), event = %other, "Ignoring unsupported event");
            }
        }
    }

    fn subscribe(&self, connection: &Arc<Connection>, message: &Message) -> Result<(), AppError> {
        let app = self.apps.require(connection.app_id())?;
        let data = message.data();

        let channel = data
            .get("channel")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::validation("Subscription is missing 'channel'"))?;
        validator::validate_channel_name(channel, self.config.max_channel_name_length)?;

        let kind = ChannelKind::from_name(channel);
        let channel_data = match data.get("channel_data") {
            Some(Value::String(raw)) => Some(raw.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };

        if kind.requires_auth() {
            let auth = data.get("auth").and_then(Value::as_str).unwrap_or_default();
            let signed_data = channel_data.as_deref().filter(|_| kind.is_presence());
            app.signer().verify_channel_auth(
                auth,
                connection.socket_id().as_str(),
                channel,
                signed_data,
            )?;
        }

        let member = if kind.is_presence() {
            let raw = channel_data.as_deref().ok_or_else(|| {
                AppError::validation(format!("Presence channel '{channel}' requires channel_data"))
            })?;
            let member = PresenceMember::from_channel_data(raw)?;
            if !connection.bind_user(&member.user_id) {
                return Err(AppError::unauthorized(format!(
                    "Connection is signed in as another user than '{}'",
                    member.user_id
                )));
            }
            Some(member)
        } else {
            None
        };

        app.channels().subscribe(channel, connection, member)?;

        debug!(
            app_id = %app.id(),
            socket_id = %connection.socket_id(),
            channel = %channel,
            "Subscribed"
        );
        Ok(())
    }

    fn unsubscribe(&self, connection: &Arc<Connection>, message: &Message) {
        let Some(channel) = message.data().get("channel").and_then(Value::as_str) else {
            debug!(socket_id = %connection.socket_id(), "Unsubscribe without channel ignored");
            return;
        };
        let Some(app) = self.apps.get(connection.app_id()) else {
            return;
        };

        connection.remove_channel(channel);
        if app.channels().unsubscribe(channel, connection.socket_id()) {
            debug!(
                app_id = %app.id(),
                socket_id = %connection.socket_id(),
                channel = %channel,
                "Unsubscribed"
            );
        }
    }

    fn signin(&self, connection: &Arc<Connection>, message: &Message) -> Result<(), AppError> {
        let app = self.apps.require(connection.app_id())?;
        let data = message.data();

        let user_data = data
            .get("user_data")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::validation("Sign-in is missing 'user_data'"))?;
        let auth = data.get("auth").and_then(Value::as_str).unwrap_or_default();
        app.signer()
            .verify_user_auth(auth, connection.socket_id().as_str(), user_data)?;

        let user: Value = serde_json::from_str(user_data)
            .map_err(|_| AppError::validation("'user_data' must be a JSON object"))?;
        let user_id = match user.get("id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => return Err(AppError::validation("'user_data' is missing 'id'")),
        };

        if !connection.bind_user(&user_id) {
            return Err(AppError::unauthorized(
                "Connection is already signed in as another user",
            ));
        }

        connection.send(&builder::signin_success(user_data));
        info!(app_id = %app.id(), socket_id = %connection.socket_id(), user_id = %user_id, "User signed in");
        Ok(())
    }

    fn client_event(&self, connection: &Arc<Connection>, message: Message) -> Result<(), AppError> {
        let app = self.apps.require(connection.app_id())?;
        if !app.client_messages_enabled() {
            return Err(AppError::validation(
                "Client events are disabled for this application",
            ));
        }
        validator::validate_event_name(message.event())?;

        let channel = message
            .channel()
            .ok_or_else(|| AppError::validation("Client event is missing 'channel'"))?;
        let kind = ChannelKind::from_name(channel);
        if !kind.allows_client_events() {
            return Err(AppError::validation(
                "Client events are only allowed on private and presence channels",
            ));
        }
        if !connection.is_subscribed(channel) {
            return Err(AppError::validation(format!(
                "Not subscribed to channel '{channel}'"
            )));
        }

        let outbound = match (kind.is_presence(), connection.user_id()) {
            (true, Some(user_id)) => message.with_user_id(user_id),
            _ => message,
        };
        self.dispatcher
            .dispatch_message(app.id(), outbound, Some(connection.socket_id()));
        Ok(())
    }

    /// Removes a connection and cascades the cleanup to its channels.
    ///
    /// The connection is marked closed before its channel set is taken, so
    /// a subscribe racing with this call either lands in that set or sees
    /// the closed connection and rolls itself back. Idempotent: returns
    /// whether this call unregistered the connection.
    pub fn disconnect(&self, connection: &Arc<Connection>) -> bool {
        connection.close(codes::NORMAL, "Connection closed");

        let app_id = connection.app_id();
        if self
            .apps
            .registry()
            .unregister(app_id, connection.socket_id())
            .is_none()
        {
            return false;
        }

        if let Some(app) = self.apps.get(app_id) {
            for channel in connection.take_channels() {
                app.channels().unsubscribe(&channel, connection.socket_id());
            }
        }

        self.metrics.connection_closed(app_id);

        let lifetime = chrono::Utc::now() - connection.connected_at();
        info!(
            app_id = %app_id,
            socket_id = %connection.socket_id(),
            duration_secs = lifetime.num_seconds(),
            "WebSocket connection closed"
        );
        true
    }

    /// Closes a connection with `code` and runs the normal close path.
    pub fn terminate(&self, connection: &Arc<Connection>, code: u16, reason: &str) -> bool {
        connection.close(code, reason);
        self.disconnect(connection)
    }

    /// Evicts a connection that missed its activity timeout.
    ///
    /// Returns `false` if the connection was already gone.
    pub fn prune(&self, connection: &Arc<Connection>) -> bool {
        if !self.terminate(connection, codes::PONG_NOT_RECEIVED, "Pong reply not received") {
            return false;
        }

        info!(
            app_id = %connection.app_id(),
            socket_id = %connection.socket_id(),
            idle_secs = connection.idle_for().as_secs(),
            "Pruned stale connection"
        );
        self.events.publish(BrokerEvent::ConnectionPruned {
            app_id: connection.app_id().to_string(),
            socket_id: connection.socket_id().to_string(),
        });
        true
    }

    /// Sends a protocol ping.
    pub fn ping(&self, connection: &Connection) -> bool {
        connection.send(&builder::ping())
    }

    /// Terminates every connection of `user_id` in `app_id`.
    pub fn terminate_user(&self, app_id: &str, user_id: &str) -> usize {
        let connections = self.apps.registry().for_user(app_id, user_id);
        for connection in &connections {
            self.terminate(connection, codes::UNAUTHORIZED, "Terminated by the server");
        }
        if !connections.is_empty() {
            info!(app_id = %app_id, user_id = %user_id, count = connections.len(), "User connections terminated");
        }
        connections.len()
    }

    /// Closes every connection.
    pub fn close_all(&self, code: u16, reason: &str) -> usize {
        let connections = self.apps.registry().all();
        for connection in &connections {
            self.terminate(connection, code, reason);
        }
        connections.len()
    }

    /// Looks up a live connection.
    pub fn get(&self, app_id: &str, socket_id: &SocketId) -> Option<Arc<Connection>> {
        self.apps.registry().get(app_id, socket_id)
    }

    /// Snapshot of every live connection with its application.
    pub fn live(&self) -> Vec<(Arc<Connection>, Arc<Application>)> {
        self.apps
            .registry()
            .all()
            .into_iter()
            .filter_map(|conn| {
                let app = self.apps.get(conn.app_id())?;
                Some((conn, app))
            })
            .collect()
    }
}

fn protocol_code(err: &AppError) -> Option<u16> {
    match err.kind {
        ErrorKind::Unauthorized | ErrorKind::Authentication => Some(codes::UNAUTHORIZED),
        _ => None,
    }
}

fn reject(connection: &Connection, code: Option<u16>, err: &AppError) {
    debug!(
        socket_id = %connection.socket_id(),
        code = ?code,
        error = %err,
        "Rejecting client request"
    );
    connection.send(&builder::error(code, err.message.clone()));
}

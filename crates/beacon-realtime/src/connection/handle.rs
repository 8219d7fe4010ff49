//! Individual WebSocket connection handle.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use beacon_core::error::AppError;

use crate::message::Message;

/// Process-unique connection identifier in Pusher's `"<n>.<n>"` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SocketId(String);

impl SocketId {
    /// Generates a fresh random id.
    pub fn generate() -> Self {
        let left: u32 = rand::random_range(1..=1_000_000_000);
        let right: u32 = rand::random_range(1..=1_000_000_000);
        Self(format!("{left}.{right}"))
    }

    /// Parses and validates a client-supplied id.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let valid = raw
            .split_once('.')
            .is_some_and(|(left, right)| is_digits(left) && is_digits(right));
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(AppError::validation(format!("Invalid socket id '{raw}'")))
        }
    }

    /// Borrows the id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Close code and reason recorded when a connection is closed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    /// WebSocket close code.
    pub code: u16,
    /// Human-readable reason.
    pub reason: String,
}

/// One client's session state.
///
/// Owned by the [`ConnectionRegistry`](super::registry::ConnectionRegistry);
/// channels only hold weak back-references.
pub struct Connection {
    socket_id: SocketId,
    app_id: String,
    attributes: HashMap<String, String>,
    user_id: Mutex<Option<String>>,
    channels: Mutex<HashSet<String>>,
    connected_at: DateTime<Utc>,
    last_activity: Mutex<DateTime<Utc>>,
    sender: mpsc::Sender<String>,
    alive: AtomicBool,
    close_reason: Mutex<Option<CloseReason>>,
    closed: CancellationToken,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("socket_id", &self.socket_id)
            .field("app_id", &self.app_id)
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl Connection {
    /// Creates a connection and the receiver its socket writer drains.
    pub fn new(
        app_id: impl Into<String>,
        attributes: HashMap<String, String>,
        buffer: usize,
    ) -> (Arc<Self>, mpsc::Receiver<String>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let now = Utc::now();
        let connection = Arc::new(Self {
            socket_id: SocketId::generate(),
            app_id: app_id.into(),
            attributes,
            user_id: Mutex::new(None),
            channels: Mutex::new(HashSet::new()),
            connected_at: now,
            last_activity: Mutex::new(now),
            sender,
            alive: AtomicBool::new(true),
            close_reason: Mutex::new(None),
            closed: CancellationToken::new(),
        });
        (connection, receiver)
    }

    /// Socket id.
    pub fn socket_id(&self) -> &SocketId {
        &self.socket_id
    }

    /// Owning application id.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Handshake attribute such as `client` or `protocol`.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Authenticated or presence user id, if any.
    pub fn user_id(&self) -> Option<String> {
        self.user_id
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Binds a user id to this connection.
    ///
    /// The first binding wins; returns `false` when a different user is
    /// already bound.
    pub fn bind_user(&self, user_id: &str) -> bool {
        let mut bound = self.user_id.lock().unwrap_or_else(|e| e.into_inner());
        match bound.as_deref() {
            Some(existing) => existing == user_id,
            None => {
                *bound = Some(user_id.to_string());
                true
            }
        }
    }

    /// When the socket was accepted.
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Records inbound activity.
    pub fn touch(&self) {
        self.set_last_activity(Utc::now());
    }

    /// Last inbound activity.
    pub fn last_activity(&self) -> DateTime<Utc> {
        *self.last_activity.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Overrides the last-activity timestamp.
    pub fn set_last_activity(&self, at: DateTime<Utc>) {
        *self.last_activity.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }

    /// Time since the last inbound activity.
    pub fn idle_for(&self) -> Duration {
        (Utc::now() - self.last_activity())
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Whether the idle time exceeds `timeout`.
    pub fn is_stale(&self, timeout: Duration) -> bool {
        self.idle_for() > timeout
    }

    /// Records a channel subscription. Returns `false` if already present.
    pub fn add_channel(&self, channel: &str) -> bool {
        self.channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(channel.to_string())
    }

    /// Forgets a channel subscription.
    pub fn remove_channel(&self, channel: &str) -> bool {
        self.channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(channel)
    }

    /// Whether the connection is subscribed to `channel`.
    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(channel)
    }

    /// Snapshot of subscribed channels.
    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self
            .channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect();
        channels.sort();
        channels
    }

    /// Empties and returns the subscribed channel set.
    pub fn take_channels(&self) -> Vec<String> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels.drain().collect()
    }

    /// Queues a message.
    pub fn send(&self, message: &Message) -> bool {
        self.send_raw(message.to_frame())
    }

    /// Queues an already serialized frame without blocking.
    ///
    /// A full buffer drops the frame; a closed receiver marks the
    /// connection dead.
    pub fn send_raw(&self, frame: impl Into<String>) -> bool {
        if !self.is_alive() {
            return false;
        }
        match self.sender.try_send(frame.into()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    socket_id = %self.socket_id,
                    "Connection send buffer full, dropping frame"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.alive.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    /// Whether the connection can still receive frames.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Closes the connection with a WebSocket close code.
    ///
    /// Only the first call records its reason; returns whether this call
    /// performed the close.
    pub fn close(&self, code: u16, reason: impl Into<String>) -> bool {
        let mut slot = self.close_reason.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return false;
        }
        *slot = Some(CloseReason {
            code,
            reason: reason.into(),
        });
        drop(slot);

        self.alive.store(false, Ordering::SeqCst);
        self.closed.cancel();
        true
    }

    /// Close code and reason, once closed by the server.
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> (Arc<Connection>, mpsc::Receiver<String>) {
        Connection::new("app-1", HashMap::new(), 8)
    }

    #[test]
    fn test_socket_id_format() {
        let id = SocketId::generate();
        assert!(SocketId::parse(id.as_str()).is_ok());
        assert!(SocketId::parse("abc").is_err());
        assert!(SocketId::parse("1.").is_err());
        assert!(SocketId::parse("1.2.3").is_err());
    }

    #[test]
    fn test_send_queues_frames_in_order() {
        let (conn, mut rx) = connection();
        assert!(conn.send_raw("one"));
        assert!(conn.send_raw("two"));
        assert_eq!(rx.try_recv().expect("first"), "one");
        assert_eq!(rx.try_recv().expect("second"), "two");
    }

    #[test]
    fn test_full_buffer_drops_without_closing() {
        let (conn, _rx) = Connection::new("app-1", HashMap::new(), 1);
        assert!(conn.send_raw("one"));
        assert!(!conn.send_raw("two"));
        assert!(conn.is_alive());
    }

    #[test]
    fn test_dropped_receiver_marks_dead() {
        let (conn, rx) = connection();
        drop(rx);
        assert!(!conn.send_raw("one"));
        assert!(!conn.is_alive());
    }

    #[test]
    fn test_is_stale_uses_last_activity() {
        let (conn, _rx) = connection();
        assert!(!conn.is_stale(Duration::from_secs(30)));

        conn.set_last_activity(Utc::now() - chrono::Duration::seconds(60));
        assert!(conn.is_stale(Duration::from_secs(30)));
        assert!(!conn.is_stale(Duration::from_secs(120)));

        conn.touch();
        assert!(!conn.is_stale(Duration::from_secs(30)));
    }

    #[test]
    fn test_close_is_recorded_once() {
        let (conn, _rx) = connection();
        assert!(conn.close(4201, "stale"));
        assert!(!conn.close(1000, "again"));
        assert_eq!(conn.close_reason().expect("reason").code, 4201);
        assert!(!conn.is_alive());
        assert!(!conn.send_raw("late"));
    }

    #[tokio::test]
    async fn test_closed_future_resolves_after_close() {
        let (conn, _rx) = connection();
        conn.close(1000, "bye");
        tokio::time::timeout(Duration::from_millis(100), conn.closed())
            .await
            .expect("closed resolves");
    }

    #[test]
    fn test_bind_user_first_wins() {
        let (conn, _rx) = connection();
        assert!(conn.bind_user("7"));
        assert!(conn.bind_user("7"));
        assert!(!conn.bind_user("8"));
        assert_eq!(conn.user_id().as_deref(), Some("7"));
    }

    #[test]
    fn test_channel_bookkeeping() {
        let (conn, _rx) = connection();
        assert!(conn.add_channel("b"));
        assert!(conn.add_channel("a"));
        assert!(!conn.add_channel("a"));
        assert_eq!(conn.channels(), vec!["a".to_string(), "b".to_string()]);
        assert!(conn.remove_channel("a"));
        assert_eq!(conn.take_channels(), vec!["b".to_string()]);
        assert!(!conn.is_subscribed("b"));
    }
}

//! WebSocket upgrade handler for the Pusher client path.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use beacon_realtime::Connection;
use beacon_realtime::message::builder::{self, codes};

use crate::state::AppState;

/// GET /app/{app_key}?protocol=7&client=js&version=..
///
/// Query parameters are kept as connection attributes.
pub async fn ws_handler(
    State(state): State<AppState>,
    Path(app_key): Path<String>,
    Query(attributes): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_ws_connection(state, app_key, attributes, socket))
}

/// Runs one socket from admission to cleanup.
async fn handle_ws_connection(
    state: AppState,
    app_key: String,
    attributes: HashMap<String, String>,
    socket: WebSocket,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let connections = Arc::clone(&state.realtime.connections);

    let (connection, outbound_rx) = match connections.open(&app_key, attributes) {
        Ok(opened) => opened,
        Err(err) => {
            let code = builder::close_code_for(&err);
            let frame = builder::error(Some(code), err.message.clone()).to_frame();
            let _ = ws_tx.send(Message::Text(frame.into())).await;
            let _ = ws_tx
                .send(Message::Close(Some(CloseFrame {
                    code,
                    reason: err.message.into(),
                })))
                .await;
            return;
        }
    };

    let outbound_task = tokio::spawn(forward_outbound(
        Arc::clone(&connection),
        outbound_rx,
        ws_tx,
    ));

    loop {
        tokio::select! {
            biased;
            _ = connection.closed() => break,
            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    connections.handle_inbound(&connection, text.as_str());
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => connection.touch(),
                Some(Ok(Message::Binary(_))) => {
                    connection.touch();
                    debug!(socket_id = %connection.socket_id(), "Binary frame ignored");
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    warn!(socket_id = %connection.socket_id(), error = %e, "WebSocket error");
                    break;
                }
            },
        }
    }

    connections.disconnect(&connection);

    let grace = Duration::from_secs(state.config.server.shutdown_grace_seconds);
    if tokio::time::timeout(grace, outbound_task).await.is_err() {
        debug!(socket_id = %connection.socket_id(), "Outbound writer did not drain in time");
    }
}

/// Writes queued frames to the socket until the connection closes, then
/// sends the recorded close frame.
async fn forward_outbound(
    connection: Arc<Connection>,
    mut outbound_rx: mpsc::Receiver<String>,
    mut ws_tx: SplitSink<WebSocket, Message>,
) {
    loop {
        tokio::select! {
            biased;
            frame = outbound_rx.recv() => match frame {
                Some(frame) => {
                    if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                        return;
                    }
                }
                None => break,
            },
            _ = connection.closed() => break,
        }
    }

    while let Ok(frame) = outbound_rx.try_recv() {
        if ws_tx.send(Message::Text(frame.into())).await.is_err() {
            return;
        }
    }

    let (code, reason) = connection
        .close_reason()
        .map(|r| (r.code, r.reason))
        .unwrap_or((codes::NORMAL, String::new()));
    let _ = ws_tx
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}

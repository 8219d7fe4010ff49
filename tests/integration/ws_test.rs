//! Integration tests for the WebSocket endpoint over a real socket.

mod helpers;

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use helpers::{APP_ID, APP_KEY, TestApp};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(addr: SocketAddr, key: &str) -> Client {
    let url = format!("ws://{addr}/app/{key}?protocol=7&client=js&version=8.0.0");
    let (client, _) = connect_async(url).await.expect("connect");
    client
}

/// Next message, skipping transport pings.
async fn next_message(client: &mut Client) -> Message {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("websocket error");
        if !matches!(message, Message::Ping(_) | Message::Pong(_)) {
            return message;
        }
    }
}

async fn next_json(client: &mut Client) -> Value {
    match next_message(client).await {
        Message::Text(text) => serde_json::from_str(text.as_str()).expect("json"),
        other => panic!("expected text frame, got {other:?}"),
    }
}

async fn send_json(client: &mut Client, value: Value) {
    client
        .send(Message::Text(value.to_string().into()))
        .await
        .expect("send");
}

async fn expect_close(client: &mut Client) -> u16 {
    match next_message(client).await {
        Message::Close(Some(frame)) => u16::from(frame.code),
        other => panic!("expected close frame, got {other:?}"),
    }
}

#[tokio::test]
async fn test_handshake_sends_connection_established() {
    let app = TestApp::new();
    let addr = app.spawn().await;
    let mut client = connect(addr, APP_KEY).await;

    let established = next_json(&mut client).await;

    assert_eq!(established["event"], "pusher:connection_established");
    let data: Value = serde_json::from_str(established["data"].as_str().expect("data")).expect("data json");
    assert!(data["socket_id"].as_str().expect("socket id").contains('.'));
    assert_eq!(data["activity_timeout"], 120);
}

#[tokio::test]
async fn test_unknown_key_is_closed_with_4001() {
    let app = TestApp::new();
    let addr = app.spawn().await;
    let mut client = connect(addr, "missing-key").await;

    let error = next_json(&mut client).await;
    assert_eq!(error["event"], "pusher:error");
    assert_eq!(error["data"]["code"], 4001);

    assert_eq!(expect_close(&mut client).await, 4001);
}

#[tokio::test]
async fn test_over_quota_is_closed_with_4004() {
    let app = TestApp::with_app(|config| config.max_connections = 1);
    let addr = app.spawn().await;

    let mut first = connect(addr, APP_KEY).await;
    next_json(&mut first).await;

    let mut second = connect(addr, APP_KEY).await;
    let error = next_json(&mut second).await;
    assert_eq!(error["data"]["code"], 4004);
    assert_eq!(expect_close(&mut second).await, 4004);
}

#[tokio::test]
async fn test_subscribe_and_receive_broadcast() {
    let app = TestApp::new();
    let addr = app.spawn().await;
    let mut client = connect(addr, APP_KEY).await;
    next_json(&mut client).await;

    send_json(&mut client, json!({"event": "pusher:subscribe", "data": {"channel": "news"}})).await;
    let ack = next_json(&mut client).await;
    assert_eq!(ack["event"], "pusher_internal:subscription_succeeded");

    let delivered = app
        .engine
        .dispatcher
        .dispatch(APP_ID, "news", "headline", json!({"title": "hi"}), None);
    assert_eq!(delivered, 1);

    let frame = next_json(&mut client).await;
    assert_eq!(frame["event"], "headline");
    assert_eq!(frame["channel"], "news");
    assert_eq!(frame["data"], r#"{"title":"hi"}"#);
}

#[tokio::test]
async fn test_protocol_ping_gets_pong() {
    let app = TestApp::new();
    let addr = app.spawn().await;
    let mut client = connect(addr, APP_KEY).await;
    next_json(&mut client).await;

    send_json(&mut client, json!({"event": "pusher:ping", "data": {}})).await;

    assert_eq!(next_json(&mut client).await["event"], "pusher:pong");
}

#[tokio::test]
async fn test_client_disconnect_cleans_up() {
    let app = TestApp::new();
    let addr = app.spawn().await;
    let mut client = connect(addr, APP_KEY).await;
    next_json(&mut client).await;
    send_json(&mut client, json!({"event": "pusher:subscribe", "data": {"channel": "news"}})).await;
    next_json(&mut client).await;

    client.close(None).await.expect("close");

    let channels = app.engine.apps.get(APP_ID).expect("app");
    let mut cleaned = false;
    for _ in 0..50 {
        if app.engine.apps.connection_count(APP_ID) == 0 && !channels.channels().info("news").occupied {
            cleaned = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(cleaned);
}

#[tokio::test]
async fn test_server_termination_sends_close_code() {
    let app = TestApp::new();
    let addr = app.spawn().await;
    let mut client = connect(addr, APP_KEY).await;
    next_json(&mut client).await;

    let mut closed = 0;
    for _ in 0..50 {
        closed = app.engine.connections.close_all(4009, "Terminated");
        if closed > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(closed, 1);
    assert_eq!(expect_close(&mut client).await, 4009);
}

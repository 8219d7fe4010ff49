//! Integration tests for the channel and user auth endpoints.

mod helpers;

use http::StatusCode;
use serde_json::json;

use helpers::{TestApp, next_frame};

async fn post_json(app: &TestApp, path: &str, body: serde_json::Value) -> helpers::TestResponse {
    let body = body.to_string();
    let uri = app.signed_uri("POST", path, &[], &body);
    app.raw("POST", &uri, "application/json", body).await
}

#[tokio::test]
async fn test_private_channel_auth_json() {
    let app = TestApp::new();

    let response = post_json(
        &app,
        "/pusher/auth",
        json!({"socket_id": "123.456", "channel_name": "private-orders"}),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    let expected = app.signer().channel_auth("123.456", "private-orders", None);
    assert_eq!(response.body["auth"], expected);
    assert!(response.body.get("channel_data").is_none());
}

#[tokio::test]
async fn test_private_channel_auth_form() {
    let app = TestApp::new();
    let body = "socket_id=123.456&channel_name=private-orders".to_string();
    let uri = app.signed_uri("POST", "/pusher/auth", &[], &body);

    let response = app
        .raw("POST", &uri, "application/x-www-form-urlencoded", body)
        .await;

    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    assert!(response.body["auth"].as_str().expect("auth").starts_with("app-key:"));
}

#[tokio::test]
async fn test_presence_auth_signs_channel_data() {
    let app = TestApp::new();
    let channel_data = json!({"user_id": "u1", "user_info": {"name": "Ada"}}).to_string();

    let response = post_json(
        &app,
        "/pusher/auth",
        json!({
            "socket_id": "1.2",
            "channel_name": "presence-room",
            "channel_data": channel_data,
        }),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["channel_data"], channel_data.as_str());
    let expected = app
        .signer()
        .channel_auth("1.2", "presence-room", Some(&channel_data));
    assert_eq!(response.body["auth"], expected);
}

#[tokio::test]
async fn test_presence_auth_requires_channel_data() {
    let app = TestApp::new();
    let response = post_json(
        &app,
        "/pusher/auth",
        json!({"socket_id": "1.2", "channel_name": "presence-room"}),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_auth_input_is_authentication_error() {
    let app = TestApp::new();

    let bad_socket = post_json(
        &app,
        "/pusher/auth",
        json!({"socket_id": "abc", "channel_name": "private-orders"}),
    )
    .await;
    assert_eq!(bad_socket.status, StatusCode::UNAUTHORIZED);

    let bad_channel = post_json(
        &app,
        "/pusher/auth",
        json!({"socket_id": "1.2", "channel_name": "private orders!"}),
    )
    .await;
    assert_eq!(bad_channel.status, StatusCode::UNAUTHORIZED);

    let missing = post_json(&app, "/pusher/auth", json!({"socket_id": "1.2"})).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_requires_known_key() {
    let app = TestApp::new();
    let body = json!({"socket_id": "1.2", "channel_name": "private-a"}).to_string();
    let uri = app
        .signed_uri("POST", "/pusher/auth", &[], &body)
        .replace("auth_key=app-key", "auth_key=other-key");

    let response = app.raw("POST", &uri, "application/json", body).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_auth() {
    let app = TestApp::new();
    let user_data = json!({"id": "u1", "name": "Ada"}).to_string();

    let response = post_json(
        &app,
        "/pusher/user-auth",
        json!({"socket_id": "1.2", "user_data": user_data}),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["auth"], app.signer().user_auth("1.2", &user_data));
    assert_eq!(response.body["user_data"], user_data.as_str());

    let anonymous = post_json(
        &app,
        "/pusher/user-auth",
        json!({"socket_id": "1.2", "user_data": "{}"}),
    )
    .await;
    assert_eq!(anonymous.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_endpoint_signature_admits_subscription() {
    let app = TestApp::new();
    let (conn, mut rx) = app.connect();

    let response = post_json(
        &app,
        "/pusher/auth",
        json!({"socket_id": conn.socket_id().as_str(), "channel_name": "private-orders"}),
    )
    .await;
    let auth = response.body["auth"].as_str().expect("auth").to_string();

    app.engine.connections.handle_inbound(
        &conn,
        &json!({"event": "pusher:subscribe", "data": {"channel": "private-orders", "auth": auth}})
            .to_string(),
    );

    let ack = next_frame(&mut rx);
    assert_eq!(ack["event"], "pusher_internal:subscription_succeeded");
    assert_eq!(ack["channel"], "private-orders");
}

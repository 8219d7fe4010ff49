//! Integration tests for the signed HTTP API.

mod helpers;

use http::StatusCode;
use serde_json::json;

use helpers::{APP_KEY, TestApp, next_frame};

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::new();

    let up = app.get("/up").await;
    assert_eq!(up.status, StatusCode::OK);
    assert_eq!(up.text, "OK");

    let health = app.get("/pusher/health").await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body["status"], "ok");
}

#[tokio::test]
async fn test_trigger_delivers_to_subscribers() {
    let app = TestApp::new();
    let (conn, mut rx) = app.connect();
    app.subscribe(&conn, &mut rx, "news", None);

    let response = app
        .signed(
            "POST",
            "/apps/1/events",
            Some(json!({"name": "update", "channel": "news", "data": "{\"n\":1}"})),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    assert_eq!(response.body, json!({}));
    let frame = next_frame(&mut rx);
    assert_eq!(frame["event"], "update");
    assert_eq!(frame["channel"], "news");
    assert_eq!(frame["data"], "{\"n\":1}");
}

#[tokio::test]
async fn test_trigger_excludes_socket_id() {
    let app = TestApp::new();
    let (sender, mut sender_rx) = app.connect();
    let (other, mut other_rx) = app.connect();
    app.subscribe(&sender, &mut sender_rx, "news", None);
    app.subscribe(&other, &mut other_rx, "news", None);

    let response = app
        .signed(
            "POST",
            "/apps/1/events",
            Some(json!({
                "name": "update",
                "channels": ["news"],
                "data": {},
                "socket_id": sender.socket_id().as_str(),
            })),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(sender_rx.try_recv().is_err());
    assert_eq!(next_frame(&mut other_rx)["event"], "update");
}

#[tokio::test]
async fn test_unsigned_request_rejected() {
    let app = TestApp::new();
    let response = app
        .raw(
            "POST",
            "/apps/1/events",
            "application/json",
            json!({"name": "e", "channel": "news"}).to_string(),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_app_is_not_found() {
    let app = TestApp::new();
    let response = app.signed("GET", "/apps/999/channels", None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tampered_signature_rejected() {
    let app = TestApp::new();
    let body = json!({"name": "e", "channel": "news"}).to_string();
    let uri = app.signed_uri("POST", "/apps/1/events", &[], &body);

    let other_body = json!({"name": "other", "channel": "news"}).to_string();
    let response = app.raw("POST", &uri, "application/json", other_body).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let wrong_method = app.raw("GET", &uri.replace("events", "channels"), "application/json", String::new()).await;
    assert_eq!(wrong_method.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_timestamp_rejected() {
    let app = TestApp::new();
    let stale = chrono::Utc::now().timestamp() - 601;
    let uri = app.signed_uri_at("GET", "/apps/1/channels", &[], "", stale);

    let response = app.get(&uri).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_trigger_validation() {
    let app = TestApp::new();

    let channels: Vec<String> = (0..101).map(|i| format!("c{i}")).collect();
    let too_many = app
        .signed("POST", "/apps/1/events", Some(json!({"name": "e", "channels": channels})))
        .await;
    assert_eq!(too_many.status, StatusCode::BAD_REQUEST);

    let no_channel = app
        .signed("POST", "/apps/1/events", Some(json!({"name": "e", "data": {}})))
        .await;
    assert_eq!(no_channel.status, StatusCode::BAD_REQUEST);

    let bad_socket = app
        .signed(
            "POST",
            "/apps/1/events",
            Some(json!({"name": "e", "channel": "news", "socket_id": "nope"})),
        )
        .await;
    assert_eq!(bad_socket.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_batch_events() {
    let app = TestApp::new();
    let (conn, mut rx) = app.connect();
    app.subscribe(&conn, &mut rx, "a", None);
    app.subscribe(&conn, &mut rx, "b", None);

    let response = app
        .signed(
            "POST",
            "/apps/1/batch_events",
            Some(json!({"batch": [
                {"name": "first", "channel": "a", "data": {}},
                {"name": "second", "channel": "b", "data": {}},
            ]})),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(next_frame(&mut rx)["event"], "first");
    assert_eq!(next_frame(&mut rx)["event"], "second");

    let batch: Vec<_> = (0..11)
        .map(|i| json!({"name": format!("e{i}"), "channel": "a", "data": {}}))
        .collect();
    let oversized = app
        .signed("POST", "/apps/1/batch_events", Some(json!({ "batch": batch })))
        .await;
    assert_eq!(oversized.status, StatusCode::BAD_REQUEST);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_channel_listing_and_info() {
    let app = TestApp::new();
    let (a, mut rx_a) = app.connect();
    let (b, mut rx_b) = app.connect();
    app.subscribe(&a, &mut rx_a, "news", None);
    app.subscribe(&b, &mut rx_b, "news", None);
    let member = json!({"user_id": "u1", "user_info": {"name": "Ada"}}).to_string();
    app.subscribe(&a, &mut rx_a, "presence-room", Some(&member));

    let all = app.signed("GET", "/apps/1/channels", None).await;
    assert_eq!(all.status, StatusCode::OK);
    let names: Vec<&String> = all.body["channels"].as_object().expect("map").keys().collect();
    assert_eq!(names, vec!["news", "presence-room"]);

    let presence = app
        .signed_with(
            "GET",
            "/apps/1/channels",
            &[("filter_by_prefix", "presence-"), ("info", "user_count")],
            None,
        )
        .await;
    assert_eq!(presence.body, json!({"channels": {"presence-room": {"user_count": 1}}}));

    let info = app
        .signed_with(
            "GET",
            "/apps/1/channels/news",
            &[("info", "subscription_count")],
            None,
        )
        .await;
    assert_eq!(info.body, json!({"occupied": true, "subscription_count": 2}));

    let empty = app.signed("GET", "/apps/1/channels/nobody-here", None).await;
    assert_eq!(empty.body, json!({"occupied": false}));
}

#[tokio::test]
async fn test_presence_users() {
    let app = TestApp::new();
    let (conn, mut rx) = app.connect();
    let member = json!({"user_id": 7}).to_string();
    app.subscribe(&conn, &mut rx, "presence-room", Some(&member));

    let users = app.signed("GET", "/apps/1/channels/presence-room/users", None).await;
    assert_eq!(users.status, StatusCode::OK);
    assert_eq!(users.body, json!({"users": [{"id": "7"}]}));

    let public = app.signed("GET", "/apps/1/channels/news/users", None).await;
    assert_eq!(public.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_terminate_user_connections() {
    let app = TestApp::new();
    let (conn, mut rx) = app.connect();
    let (bystander, _bystander_rx) = app.connect();
    let member = json!({"user_id": "u1"}).to_string();
    app.subscribe(&conn, &mut rx, "presence-room", Some(&member));

    let response = app
        .signed("POST", "/apps/1/users/u1/terminate_connections", None)
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(!conn.is_alive());
    assert_eq!(conn.close_reason().expect("closed").code, 4009);
    assert!(bystander.is_alive());
    assert!(!app.engine.apps.get("1").expect("app").channels().info("presence-room").occupied);
}

#[tokio::test]
async fn test_app_summary_omits_secret() {
    let app = TestApp::new();
    let _conn = app.connect();

    let response = app.signed("GET", "/apps/1", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["key"], APP_KEY);
    assert_eq!(response.body["connection_count"], 1);
    assert!(response.body.get("secret").is_none());
    assert!(!response.text.contains(helpers::APP_SECRET));
}

#[tokio::test]
async fn test_metrics_exposition() {
    let app = TestApp::new();
    let _conn = app.connect();

    let response = app.get("/metrics").await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.text.contains("beacon_connections_total{app_id=\"1\"} 1"));
    assert!(response.text.contains("beacon_connections_active{app_id=\"1\"} 1"));
}

//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use http::{Request, StatusCode};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tower::ServiceExt;

use beacon_api::AppState;
use beacon_core::config::{AppConfig, ApplicationConfig};
use beacon_realtime::{AuthSigner, Connection, RealtimeEngine};

/// Application id of the default test tenant.
pub const APP_ID: &str = "1";
/// Public key of the default test tenant.
pub const APP_KEY: &str = "app-key";
/// Secret of the default test tenant.
pub const APP_SECRET: &str = "app-secret";

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Engine behind the router
    pub engine: Arc<RealtimeEngine>,
    /// Application config
    pub config: Arc<AppConfig>,
}

impl TestApp {
    /// Create a test application with one tenant.
    pub fn new() -> Self {
        Self::with_app(|_| {})
    }

    /// Create a test application, adjusting the tenant first.
    pub fn with_app(adjust: impl FnOnce(&mut ApplicationConfig)) -> Self {
        let mut app = ApplicationConfig {
            id: APP_ID.to_string(),
            key: APP_KEY.to_string(),
            secret: APP_SECRET.to_string(),
            name: "Test".to_string(),
            ..ApplicationConfig::default()
        };
        adjust(&mut app);

        let mut config = AppConfig {
            apps: vec![app],
            ..AppConfig::default()
        };
        config.worker.enabled = false;
        config.server.shutdown_grace_seconds = 1;
        let config = Arc::new(config);

        let engine = Arc::new(RealtimeEngine::new(&config).expect("Failed to build engine"));
        let router = beacon_api::build_app(AppState::new(Arc::clone(&config), Arc::clone(&engine)));

        Self {
            router,
            engine,
            config,
        }
    }

    /// Serve the router on an ephemeral local port.
    pub async fn spawn(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("local addr");
        let router = self.router.clone();
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("server");
        });
        addr
    }

    /// Signer of the default tenant.
    pub fn signer(&self) -> AuthSigner {
        AuthSigner::new(APP_KEY, APP_SECRET).expect("signer")
    }

    /// Opens an in-process connection and drains `connection_established`.
    pub fn connect(&self) -> (Arc<Connection>, mpsc::Receiver<String>) {
        let (conn, mut rx) = self
            .engine
            .connections
            .open(APP_KEY, HashMap::new())
            .expect("open connection");
        rx.try_recv().expect("connection_established");
        (conn, rx)
    }

    /// Subscribes an in-process connection and drains the ack.
    pub fn subscribe(
        &self,
        conn: &Arc<Connection>,
        rx: &mut mpsc::Receiver<String>,
        channel: &str,
        channel_data: Option<&str>,
    ) {
        let mut data = json!({ "channel": channel });
        if channel.starts_with("private-") || channel.starts_with("presence-") {
            let auth = self
                .signer()
                .channel_auth(conn.socket_id().as_str(), channel, channel_data);
            data["auth"] = json!(auth);
        }
        if let Some(channel_data) = channel_data {
            data["channel_data"] = json!(channel_data);
        }
        self.engine.connections.handle_inbound(
            conn,
            &json!({ "event": "pusher:subscribe", "data": data }).to_string(),
        );
        let ack = next_frame(rx);
        assert_eq!(ack["event"], "pusher_internal:subscription_succeeded", "{ack}");
    }

    /// Builds a signed URI for `method path` with `extra` query params.
    pub fn signed_uri(&self, method: &str, path: &str, extra: &[(&str, &str)], body: &str) -> String {
        self.signed_uri_at(method, path, extra, body, chrono::Utc::now().timestamp())
    }

    /// Like [`signed_uri`](Self::signed_uri) with an explicit timestamp.
    pub fn signed_uri_at(
        &self,
        method: &str,
        path: &str,
        extra: &[(&str, &str)],
        body: &str,
        timestamp: i64,
    ) -> String {
        let mut params: BTreeMap<String, String> = extra
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        params.insert("auth_key".into(), APP_KEY.into());
        params.insert("auth_timestamp".into(), timestamp.to_string());
        params.insert("auth_version".into(), "1.0".into());
        if !body.is_empty() {
            params.insert("body_md5".into(), format!("{:x}", md5::compute(body)));
        }

        let signature = self.signer().request_signature(method, path, &params);
        params.insert("auth_signature".into(), signature);

        let query = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        format!("{path}?{query}")
    }

    /// Sends a signed JSON request.
    pub async fn signed(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        self.signed_with(method, path, &[], body).await
    }

    /// Sends a signed JSON request with extra query params.
    pub async fn signed_with(
        &self,
        method: &str,
        path: &str,
        extra: &[(&str, &str)],
        body: Option<Value>,
    ) -> TestResponse {
        let body = body.map(|b| b.to_string()).unwrap_or_default();
        let uri = self.signed_uri(method, path, extra, &body);
        self.raw(method, &uri, "application/json", body).await
    }

    /// Make an HTTP request to the test app
    pub async fn raw(&self, method: &str, uri: &str, content_type: &str, body: String) -> TestResponse {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", content_type)
            .body(Body::from(body))
            .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("Failed to read body");

        let text = String::from_utf8_lossy(&body_bytes).to_string();
        let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        TestResponse { status, body, text }
    }

    /// Unsigned GET.
    pub async fn get(&self, uri: &str) -> TestResponse {
        self.raw("GET", uri, "application/json", String::new()).await
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Parsed JSON body, `Null` if not JSON
    pub body: Value,
    /// Raw body
    pub text: String,
}

/// Pops and parses the next queued frame.
pub fn next_frame(rx: &mut mpsc::Receiver<String>) -> Value {
    serde_json::from_str(&rx.try_recv().expect("frame")).expect("json frame")
}

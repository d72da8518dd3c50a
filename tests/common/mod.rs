//! Test helpers for the relay integration tests.
//!
//! Provides an in-process `TestServer`, a live server bound to an ephemeral
//! port, and a small reader for server-sent event streams.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::AUTHORIZATION;
use axum_test::TestServer;
use serde_json::{json, Value};
use tokio::time::timeout;

use yak::command::CommandRegistry;
use yak::config::{Config, RelayConfig};
use yak::web::router::create_router;
use yak::{AppState, WebServer};

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a test configuration with the heartbeat and extensions off.
pub fn create_test_config() -> Config {
    let mut config = Config::default();
    config.web.host = "127.0.0.1".to_string();
    config.web.port = 0;
    config.web.serve_static = false;
    config.relay.heartbeat_interval_ms = 0;
    config.extensions.enabled = false;
    config
}

/// Create state around a registry with the default relay settings.
pub fn create_state(registry: CommandRegistry) -> AppState {
    AppState::new(registry, &RelayConfig::default(), Duration::from_secs(2))
}

/// Create an in-process test server.
pub fn create_test_server(state: AppState) -> TestServer {
    let router = create_router(Arc::new(state), &[]);
    TestServer::new(router).expect("Failed to create test server")
}

/// Log in and return the session token.
pub async fn login(server: &TestServer, nick: &str) -> String {
    let response = server.post("/login").json(&json!({ "nick": nick })).await;
    response.assert_status(axum::http::StatusCode::CREATED);
    let body: Value = response.json();
    body["token"]
        .as_str()
        .expect("login response has a token")
        .to_string()
}

/// Post a message as `nick` using `token`.
pub async fn post(server: &TestServer, token: &str, nick: &str, body: &str) {
    server
        .post("/messages")
        .add_header(AUTHORIZATION, format!("Bearer {}", token))
        .json(&json!({ "nick": nick, "body": body }))
        .await
        .assert_status(axum::http::StatusCode::CREATED);
}

/// Start a real server on an ephemeral port.
pub async fn spawn_server(config: &Config, state: AppState) -> (SocketAddr, Arc<AppState>) {
    let server = WebServer::from_state(config, state).expect("Failed to create web server");
    let state = server.state();
    let addr = server
        .run_with_addr()
        .await
        .expect("Failed to start web server");
    (addr, state)
}

/// One decoded server-sent event.
#[derive(Debug, Clone)]
pub struct SseFrame {
    pub id: Option<u64>,
    pub data: Value,
}

impl SseFrame {
    pub fn kind(&self) -> &str {
        self.data["type"].as_str().unwrap_or_default()
    }

    pub fn body(&self) -> &str {
        self.data["payload"]["body"].as_str().unwrap_or_default()
    }

    pub fn nick(&self) -> &str {
        self.data["payload"]["nick"].as_str().unwrap_or_default()
    }
}

/// Incremental reader over an `text/event-stream` response.
pub struct SseReader {
    response: reqwest::Response,
    buffer: String,
}

impl SseReader {
    /// Open `/events`, optionally resuming after `last_event_id`.
    pub async fn connect(addr: SocketAddr, last_event_id: Option<u64>) -> Self {
        let client = reqwest::Client::new();
        let mut request = client.get(format!("http://{}/events", addr));
        if let Some(id) = last_event_id {
            request = request.header("Last-Event-ID", id.to_string());
        }
        let response = request.send().await.expect("Failed to open event stream");
        assert!(response.status().is_success());
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(content_type.starts_with("text/event-stream"), "{content_type}");

        Self {
            response,
            buffer: String::new(),
        }
    }

    /// Read the next event carrying data.
    pub async fn next_frame(&mut self) -> SseFrame {
        timeout(DEFAULT_TIMEOUT, self.read_frame())
            .await
            .expect("Timed out waiting for an event")
    }

    /// Read events until one matches `predicate`.
    pub async fn next_matching<F>(&mut self, predicate: F) -> SseFrame
    where
        F: Fn(&SseFrame) -> bool,
    {
        loop {
            let frame = self.next_frame().await;
            if predicate(&frame) {
                return frame;
            }
        }
    }

    /// Read the next chat message, skipping heartbeats.
    pub async fn next_message(&mut self) -> SseFrame {
        self.next_matching(|frame| frame.kind() == "message").await
    }

    async fn read_frame(&mut self) -> SseFrame {
        loop {
            if let Some(frame) = self.take_buffered() {
                return frame;
            }
            let chunk = self
                .response
                .chunk()
                .await
                .expect("Event stream read failed")
                .expect("Event stream closed");
            self.buffer.push_str(&String::from_utf8_lossy(&chunk));
        }
    }

    fn take_buffered(&mut self) -> Option<SseFrame> {
        loop {
            let end = self.buffer.find("\n\n")?;
            let block: String = self.buffer.drain(..end + 2).collect();

            let mut id = None;
            let mut data = String::new();
            for line in block.lines() {
                if let Some(value) = line.strip_prefix("id:") {
                    id = value.trim().parse().ok();
                } else if let Some(value) = line.strip_prefix("data:") {
                    data.push_str(value.trim_start());
                }
            }

            // Comment-only blocks carry no event.
            if data.is_empty() {
                continue;
            }
            let data = serde_json::from_str(&data).expect("Event data is not JSON");
            return Some(SseFrame { id, data });
        }
    }
}

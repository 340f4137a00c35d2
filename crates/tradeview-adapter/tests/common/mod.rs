/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, mock server and mock transport
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for tradeview-adapter tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tradeview_adapter::{
    ApiClient, ClientConfig, Connector, Result, SessionStore, SyncError, TransportLink,
};
use wiremock::{Match, MockServer, Request};

pub const PUBLIC_KEY: &str = "anon-public-key";

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Client pointed at the mock server with an in-memory session
pub fn client_for(server: &MockServer) -> ApiClient {
    client_with_session(server, SessionStore::in_memory())
}

pub fn client_with_session(server: &MockServer, session: SessionStore) -> ApiClient {
    let config = ClientConfig {
        public_key: Some(PUBLIC_KEY.to_string()),
        ..ClientConfig::with_base_url(server.uri())
    };
    ApiClient::with_config(config, session).expect("client init")
}

pub fn login_body(access: &str, refresh: &str, expires_in: u64) -> serde_json::Value {
    serde_json::json!({
        "accessToken": access,
        "refreshToken": refresh,
        "expiresIn": expires_in,
    })
}

/// Fresh directory under the system temp dir
pub fn temp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("{prefix}-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

/// Matches requests that carry no `Authorization` header
pub struct NoAuthorization;

impl Match for NoAuthorization {
    fn matches(&self, request: &Request) -> bool {
        !request.headers.contains_key("authorization")
    }
}

/// Server side of one accepted mock transport
#[derive(Debug)]
pub struct ServerEnd {
    pub from_client: mpsc::Receiver<String>,
    pub to_client: mpsc::Sender<String>,
}

impl ServerEnd {
    /// Next frame the client sent, parsed as JSON
    pub async fn next_frame(&mut self) -> serde_json::Value {
        let raw = tokio::time::timeout(Duration::from_secs(2), self.from_client.recv())
            .await
            .expect("timed out waiting for client frame")
            .expect("client closed transport");
        serde_json::from_str(&raw).expect("client frame is JSON")
    }

    /// Assert the client stays quiet for a short while
    pub async fn expect_silence(&mut self) {
        let next = tokio::time::timeout(Duration::from_millis(100), self.from_client.recv()).await;
        assert!(next.is_err(), "unexpected client frame: {next:?}");
    }

    pub async fn push(&self, text: impl Into<String>) {
        self.to_client
            .send(text.into())
            .await
            .expect("client dropped inbound channel");
    }
}

/// In-process connector; each accepted connection shows up on `accepted`
#[derive(Debug)]
pub struct MockConnector {
    accepted: mpsc::UnboundedSender<ServerEnd>,
    refuse_remaining: AtomicUsize,
    attempts: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerEnd>) {
        let (accepted, rx) = mpsc::unbounded_channel();
        (
            Self {
                accepted,
                refuse_remaining: AtomicUsize::new(0),
                attempts: AtomicUsize::new(0),
            },
            rx,
        )
    }

    /// Fail the next `count` connects
    pub fn refuse_next(&self, count: usize) {
        self.refuse_remaining.store(count, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _url: &str) -> Result<TransportLink> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .refuse_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(SyncError::WebSocket("connection refused".to_string()));
        }

        let (outbound, from_client) = mpsc::channel(64);
        let (to_client, inbound) = mpsc::channel(64);
        let _ = self.accepted.send(ServerEnd {
            from_client,
            to_client,
        });
        Ok(TransportLink { outbound, inbound })
    }
}

/// Wait for the next accepted mock connection
pub async fn accept(accepted: &mut mpsc::UnboundedReceiver<ServerEnd>) -> ServerEnd {
    tokio::time::timeout(Duration::from_secs(2), accepted.recv())
        .await
        .expect("timed out waiting for connection")
        .expect("connector dropped")
}

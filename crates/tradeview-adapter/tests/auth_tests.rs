/*
[INPUT]:  Mock authentication responses
[OUTPUT]: Test results for login, refresh and logout flows
[POS]:    Integration tests - session lifecycle
[UPDATE]: When auth endpoints or token handling change
*/

mod common;

use chrono::{DateTime, Duration, Utc};
use common::{
    NoAuthorization, PUBLIC_KEY, client_for, client_with_session, login_body, setup_mock_server,
    temp_dir,
};
use std::sync::Arc;
use tokio_test::assert_ok;
use tradeview_adapter::{
    ApiClient, ClientConfig, MemoryStorage, SAFETY_MARGIN_SECONDS, SessionStorage, SessionStore,
    SyncError,
};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_login_sets_session_with_safety_margin() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(NoAuthorization)
        .and(body_json(serde_json::json!({"Username": "alice", "password": "secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("access-1", "refresh-1", 3600)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let before = Utc::now();
    let response = assert_ok!(client.login("alice", "secret").await);
    let after = Utc::now();

    assert_eq!(response.access_token, "access-1");
    let session = client.session().session().expect("session stored");
    assert_eq!(session.access_token, "access-1");
    assert_eq!(session.refresh_token.as_deref(), Some("refresh-1"));

    let lifetime = Duration::seconds(3600 - SAFETY_MARGIN_SECONDS);
    assert!(session.expires_at >= before + lifetime);
    assert!(session.expires_at <= after + lifetime);
    assert!(!client.session().is_expiring_soon());
}

#[tokio::test]
async fn test_login_without_expires_in_uses_default_lifetime() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "accessToken": "a",
            "refreshToken": "r"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let response = assert_ok!(client.login("alice", "secret").await);
    assert_eq!(response.expires_in, 3600);
}

#[tokio::test]
async fn test_rejected_login_leaves_session_empty() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": "Invalid credentials"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.login("alice", "wrong").await.unwrap_err();
    match err {
        SyncError::Unauthorized { message } => assert_eq!(message, "Invalid credentials"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(client.session().get_access().is_none());
}

#[tokio::test]
async fn test_call_after_expiry_refreshes_once_then_succeeds() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("stale", "refresh-1", 60)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(NoAuthorization)
        .and(body_json(serde_json::json!({"refreshToken": "refresh-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "accessToken": "fresh",
            "expiresIn": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user/profile"))
        .and(header("Authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "username": "alice"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert_ok!(client.login("alice", "secret").await);
    // 60s lifetime is inside the safety margin, so the session is already due.
    assert!(client.session().is_expiring_soon());

    let profile = assert_ok!(client.get_profile().await);
    assert_eq!(profile.username, "alice");
    assert_eq!(client.session().get_access().as_deref(), Some("fresh"));
    assert_eq!(client.session().get_refresh().as_deref(), Some("refresh-1"));
}

#[tokio::test]
async fn test_failed_refresh_clears_session() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/user/balance"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": "Token expired"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": "Invalid refresh token"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = SessionStore::in_memory();
    session.set_tokens("access-1", "refresh-1", 3600);
    let client = client_with_session(&server, session);

    let err = client.get_balance().await.unwrap_err();
    assert!(err.is_auth_error(), "unexpected error: {err:?}");
    assert!(client.session().get_access().is_none());
    assert!(client.session().get_refresh().is_none());
    assert!(!client.session().is_logged_in());
}

#[tokio::test]
async fn test_explicit_refresh_without_session_is_expired() {
    let server = setup_mock_server().await;
    let client = client_for(&server);
    let err = client.refresh_access_token().await.unwrap_err();
    assert!(matches!(err, SyncError::SessionExpired));
}

#[tokio::test]
async fn test_logout_clears_session_even_when_server_fails() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .and(header("Authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let session = SessionStore::in_memory();
    session.set_tokens("access-1", "refresh-1", 3600);
    let client = client_with_session(&server, session);

    assert!(client.logout().await.is_err());
    assert!(client.session().get_access().is_none());
}

#[tokio::test]
async fn test_session_survives_restart_with_file_storage() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("access-1", "refresh-1", 3600)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"message": "ok"})))
        .mount(&server)
        .await;

    let dir = temp_dir("tradeview-session");
    {
        let client = client_with_session(&server, assert_ok!(SessionStore::open_file(&dir)));
        assert_ok!(client.login("alice", "secret").await);
    }

    let restored = assert_ok!(SessionStore::open_file(&dir));
    assert_eq!(restored.get_access().as_deref(), Some("access-1"));
    assert_eq!(restored.get_refresh().as_deref(), Some("refresh-1"));
    assert!(!restored.is_expiring_soon());

    let client = client_with_session(&server, restored);
    assert_ok!(client.logout().await);
    let reopened = assert_ok!(SessionStore::open_file(&dir));
    assert!(reopened.get_access().is_none());

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_login_with_huge_expires_in_does_not_overflow() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "accessToken": "access-1",
            "refreshToken": "refresh-1",
            "expiresIn": 10_000_000_000_000u64
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert_ok!(client.login("alice", "secret").await);

    let session = client.session().session().expect("session stored");
    assert_eq!(session.expires_at, DateTime::<Utc>::MAX_UTC);
    assert!(!client.session().is_expiring_soon());
}

#[tokio::test]
async fn test_logout_during_refresh_keeps_session_cleared() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/user/profile"))
        .and(header("Authorization", "Bearer old"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": "Token expired"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"accessToken": "new", "expiresIn": 3600}))
                .set_delay(std::time::Duration::from_millis(400)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"message": "ok"})))
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    let session = SessionStore::new(storage.clone());
    session.set_tokens("old", "refresh-1", 3600);
    let client = Arc::new(client_with_session(&server, session));

    let pending = {
        let client = client.clone();
        tokio::spawn(async move { client.get_profile().await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    assert_ok!(client.logout().await);
    assert!(client.session().get_access().is_none());

    let result = pending.await.expect("profile task joined");
    match result {
        Err(SyncError::Unauthorized { message }) => assert_eq!(message, "Token expired"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(client.session().get_access().is_none());
    assert!(!client.session().is_logged_in());
    assert!(storage.get("accessToken").is_none());
    assert!(storage.get("tokenExpiresAt").is_none());
}

#[tokio::test]
async fn test_network_failure_during_refresh_keeps_session() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/user/profile"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": "Token expired"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"accessToken": "new", "expiresIn": 3600}))
                .set_delay(std::time::Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let session = SessionStore::in_memory();
    session.set_tokens("old", "refresh-1", 3600);
    let config = ClientConfig {
        public_key: Some(PUBLIC_KEY.to_string()),
        timeout: std::time::Duration::from_millis(300),
        ..ClientConfig::with_base_url(server.uri())
    };
    let client = assert_ok!(ApiClient::with_config(config, session));

    match client.get_profile().await {
        Err(SyncError::Unauthorized { message }) => assert_eq!(message, "Token expired"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(client.session().get_access().as_deref(), Some("old"));
    assert_eq!(client.session().get_refresh().as_deref(), Some("refresh-1"));

    let direct = client.refresh_access_token().await.unwrap_err();
    assert!(direct.is_network(), "unexpected error: {direct:?}");
    assert!(client.session().is_logged_in());
}

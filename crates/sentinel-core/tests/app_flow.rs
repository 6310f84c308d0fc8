//! Session and data flows through `App` against a stub backend.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sentinel_core::dashboard::RefreshResult;
use sentinel_core::{
    ApiError, App, Config, CredentialStore, LocalStore, Metric, SessionState, StorageBackend,
};

fn config(base_url: &str) -> Config {
    Config {
        api_base_url: Some(base_url.to_string()),
        storage: StorageBackend::Memory,
        refresh_interval_secs: Some(1),
        ..Config::default()
    }
}

/// App over an in-memory token and a temporary data directory
fn app(base_url: &str) -> (App, Arc<CredentialStore>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(CredentialStore::in_memory());
    let app = App::with_store(
        config(base_url),
        Arc::clone(&store),
        LocalStore::new(dir.path()),
    )
    .unwrap();
    (app, store, dir)
}

async fn mount_login(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "success", "data": {"token": token}})),
        )
        .mount(server)
        .await;
}

/// Base URL nothing listens on
fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn test_login_then_fetch_sends_bearer_token() {
    let server = MockServer::start().await;
    mount_login(&server, "abc").await;
    Mock::given(method("GET"))
        .and(path("/api/data/latest"))
        .and(header("authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"temperature": 21})))
        .expect(1)
        .mount(&server)
        .await;

    let (app, store, _dir) = app(&server.uri());
    app.session.login("code6", "validpw").await.unwrap();
    assert_eq!(store.get().await.as_deref(), Some("abc"));
    assert_eq!(app.session.state(), SessionState::Authenticated);

    let sensors = app.sensors().await;
    assert!(sensors.is_live());
    assert_eq!(sensors.data.temperature, Some(21.0));
}

#[tokio::test]
async fn test_stored_token_restores_without_login() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"username": "code6"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let (app, store, _dir) = app(&server.uri());
    store.set("abc").await;

    assert_eq!(app.start().await, SessionState::Authenticated);
}

#[tokio::test]
async fn test_rejected_fetch_clears_token_and_revokes_session() {
    let server = MockServer::start().await;
    mount_login(&server, "abc").await;
    Mock::given(method("GET"))
        .and(path("/api/news"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let (app, store, _dir) = app(&server.uri());
    app.session.login("code6", "validpw").await.unwrap();
    let mut state = app.session.subscribe();

    // The client reports the rejection and leaves fallback to the caller
    let err = app.api.fetch_news().await.unwrap_err();
    assert!(matches!(err, ApiError::AuthRejected));
    assert_eq!(store.get().await, None);

    state.changed().await.unwrap();
    assert_eq!(*state.borrow(), SessionState::Unauthenticated);
    assert_eq!(app.session.check().await, SessionState::Unauthenticated);
}

#[tokio::test]
async fn test_late_rejection_keeps_token_from_new_login() {
    let server = MockServer::start().await;
    mount_login(&server, "new").await;
    Mock::given(method("GET"))
        .and(path("/api/news"))
        .and(header("authorization", "Bearer old"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(300)))
        .expect(1)
        .mount(&server)
        .await;

    let (app, store, _dir) = app(&server.uri());
    store.set("old").await;

    let api = app.api.clone();
    let in_flight = tokio::spawn(async move { api.fetch_news().await });
    // Give the old-token request time to go out
    tokio::time::sleep(Duration::from_millis(100)).await;

    app.session.login("code6", "validpw").await.unwrap();
    assert_eq!(store.get().await.as_deref(), Some("new"));

    let result = in_flight.await.unwrap();
    assert!(matches!(result, Err(ApiError::AuthRejected)));
    assert_eq!(store.get().await.as_deref(), Some("new"));
    assert_eq!(app.session.state(), SessionState::Authenticated);
}

#[tokio::test]
async fn test_network_failure_falls_back_with_same_metrics() {
    let (app, store, _dir) = app(&unreachable_url());
    store.set("abc").await;

    let err = app.api.fetch_sensor_data().await.unwrap_err();
    assert!(err.is_request_failure());
    // A transport failure is not a rejection: the token stays
    assert_eq!(store.get().await.as_deref(), Some("abc"));

    let sensors = app.sensors().await;
    assert!(!sensors.is_live());
    for metric in Metric::ALL {
        assert!(sensors.data.get(metric).is_some(), "{} missing", metric.key());
    }
}

#[tokio::test]
async fn test_unreachable_backend_keeps_restored_session() {
    let (app, store, _dir) = app(&unreachable_url());
    store.set("abc").await;

    assert_eq!(app.start().await, SessionState::Authenticated);
    assert_eq!(store.get().await.as_deref(), Some("abc"));
}

#[tokio::test]
async fn test_logged_out_fetch_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (app, _store, _dir) = app(&server.uri());
    assert_eq!(app.start().await, SessionState::Unauthenticated);

    let profile = app.profile().await;
    assert!(matches!(profile.error(), Some(ApiError::Unauthenticated)));
    assert!(!profile.data.is_empty());
}

#[tokio::test]
async fn test_logout_twice_is_safe() {
    let server = MockServer::start().await;
    mount_login(&server, "abc").await;

    let (app, store, _dir) = app(&server.uri());
    app.session.login("code6", "validpw").await.unwrap();

    app.session.logout().await;
    assert_eq!(app.session.state(), SessionState::Unauthenticated);
    app.session.logout().await;
    assert_eq!(app.session.state(), SessionState::Unauthenticated);
    assert_eq!(store.get().await, None);
}

#[tokio::test]
async fn test_history_sends_range() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/data/dev-1"))
        .and(query_param("from", "2024-05-01T00:00:00Z"))
        .and(query_param("to", "2024-05-02T00:00:00Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"timestamp": "2024-05-01T06:00:00Z", "temperature": 18}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let (app, store, _dir) = app(&server.uri());
    store.set("abc").await;

    let from = "2024-05-01T00:00:00Z".parse().unwrap();
    let to = "2024-05-02T00:00:00Z".parse().unwrap();
    let history = app.history("dev-1", Some(from), Some(to)).await.unwrap();
    assert!(history.is_live());
    assert_eq!(history.data.len(), 1);
    assert_eq!(history.data[0].reading.temperature, Some(18.0));

    assert!(matches!(
        app.history("dev-1", Some(to), Some(from)).await,
        Err(ApiError::InvalidDateRange)
    ));
}

#[tokio::test]
async fn test_history_rejects_blank_device_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let (app, store, _dir) = app(&server.uri());
    store.set("abc").await;

    assert!(matches!(
        app.api.fetch_historical_data("", None, None).await,
        Err(ApiError::MissingDeviceId)
    ));
    assert!(matches!(
        app.history("   ", None, None).await,
        Err(ApiError::MissingDeviceId)
    ));
}

#[tokio::test]
async fn test_history_device_id_stays_one_path_segment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/data/site%2F1%3Fx%23y"))
        .and(query_param("from", "2024-05-01T00:00:00Z"))
        .and(query_param("to", "2024-05-02T00:00:00Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"timestamp": "2024-05-01T06:00:00Z", "humidity": 50}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let (app, store, _dir) = app(&server.uri());
    store.set("abc").await;

    let from = "2024-05-01T00:00:00Z".parse().unwrap();
    let to = "2024-05-02T00:00:00Z".parse().unwrap();
    let rows = app
        .api
        .fetch_historical_data("site/1?x#y", Some(from), Some(to))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].reading.humidity, Some(50.0));
}

#[tokio::test]
async fn test_background_refresh_reports_expired_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let (app, store, _dir) = app(&server.uri());
    store.set("abc").await;

    let mut refresh = app.start_refresh();
    match refresh.next().await {
        Some(RefreshResult::Snapshot(snapshot)) => assert!(snapshot.auth_rejected()),
        other => panic!("expected a snapshot, got {:?}", other),
    }
    assert!(matches!(
        refresh.next().await,
        Some(RefreshResult::SessionExpired)
    ));
    assert!(refresh.next().await.is_none());
    assert_eq!(store.get().await, None);
}

#[tokio::test]
async fn test_news_unread_set_survives_restart() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/news"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "heading": "Shift change"},
            {"id": 2, "heading": "Gas drill"}
        ])))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(CredentialStore::in_memory());
    store.set("abc").await;

    let mut first = App::with_store(
        config(&server.uri()),
        Arc::clone(&store),
        LocalStore::new(dir.path()),
    )
    .unwrap();
    assert!(first.open_news("Gas drill").await.is_some());
    assert!(first.open_news("Missing").await.is_none());

    let mut second =
        App::with_store(config(&server.uri()), store, LocalStore::new(dir.path())).unwrap();
    second.news_feed().await;
    assert_eq!(second.news.unread(), ["Shift change"]);
}

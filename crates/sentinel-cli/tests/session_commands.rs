//! End-to-end runs of the `sentinel` binary against a stub backend.

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Isolated config and data directories using file-based token storage
struct Sandbox {
    config: TempDir,
    data: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let config = tempfile::tempdir().unwrap();
        std::fs::write(
            config.path().join("config.json"),
            json!({"storage": "local", "device_id": "dev-1"}).to_string(),
        )
        .unwrap();
        Self {
            config,
            data: tempfile::tempdir().unwrap(),
        }
    }

    fn token_path(&self) -> PathBuf {
        self.data.path().join("token.json")
    }

    fn seed_token(&self, token: &str) {
        std::fs::write(
            self.token_path(),
            json!({"value": token, "stored_at": "2024-05-01T00:00:00Z"}).to_string(),
        )
        .unwrap();
    }

    fn config_dir(&self) -> &Path {
        self.config.path()
    }

    fn cmd(&self, server: &MockServer) -> Command {
        let mut cmd = cargo_bin_cmd!("sentinel");
        cmd.env("SENTINEL_API_URL", server.uri())
            .env("SENTINEL_CONFIG_DIR", self.config.path())
            .env("SENTINEL_DATA_DIR", self.data.path())
            .env_remove("SENTINEL_PASSWORD")
            .env_remove("RUST_LOG");
        cmd
    }
}

async fn mount_profile(server: &MockServer, token: &str) {
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", format!("Bearer {}", token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "username": "maggie",
            "email": "maggie@example.com"
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_stores_token_and_username() {
    let server = MockServer::start().await;
    let sandbox = Sandbox::new();
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"username": "maggie", "password": "hunter2"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "success", "data": {"token": "tok-1"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    sandbox
        .cmd(&server)
        .args(["login", "--username", " maggie "])
        .env("SENTINEL_PASSWORD", "hunter2")
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged in as maggie"));

    let token = std::fs::read_to_string(sandbox.token_path()).unwrap();
    assert!(token.contains("tok-1"));
    let config = std::fs::read_to_string(sandbox.config_dir().join("config.json")).unwrap();
    assert!(config.contains("\"last_username\": \"maggie\""));
}

#[tokio::test]
async fn test_rejected_login_stores_nothing() {
    let server = MockServer::start().await;
    let sandbox = Sandbox::new();
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    sandbox
        .cmd(&server)
        .args(["login", "--username", "maggie"])
        .env("SENTINEL_PASSWORD", "wrong")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid credentials"));

    assert!(!sandbox.token_path().exists());
}

#[tokio::test]
async fn test_status_reports_restored_session() {
    let server = MockServer::start().await;
    let sandbox = Sandbox::new();
    sandbox.seed_token("tok-1");
    mount_profile(&server, "tok-1").await;

    sandbox
        .cmd(&server)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Session: authenticated"))
        .stdout(predicate::str::contains("Credential storage: local"));
}

#[tokio::test]
async fn test_logout_removes_token() {
    let server = MockServer::start().await;
    let sandbox = Sandbox::new();
    sandbox.seed_token("tok-1");

    sandbox.cmd(&server).arg("logout").assert().success();
    assert!(!sandbox.token_path().exists());

    sandbox
        .cmd(&server)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Session: unauthenticated"));
}

#[tokio::test]
async fn test_dashboard_without_login_uses_fallback() {
    let server = MockServer::start().await;
    let sandbox = Sandbox::new();
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    sandbox
        .cmd(&server)
        .arg("dashboard")
        .assert()
        .success()
        .stdout(predicate::str::contains("Source: fallback (not logged in)"))
        .stdout(predicate::str::contains("sentinel login"));
}

#[tokio::test]
async fn test_dashboard_shows_live_readings() {
    let server = MockServer::start().await;
    let sandbox = Sandbox::new();
    sandbox.seed_token("tok-1");
    mount_profile(&server, "tok-1").await;
    Mock::given(method("GET"))
        .and(path("/api/data/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "temperature": 19.5,
            "humidity": 40,
            "gas": 0.5,
            "steps": 1200,
            "heart_rate": 72,
            "noise_level": 35
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/news"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "heading": "Shift change", "body": "New rota from Monday"}
        ])))
        .mount(&server)
        .await;

    sandbox
        .cmd(&server)
        .arg("dashboard")
        .assert()
        .success()
        .stdout(predicate::str::contains("Welcome, maggie"))
        .stdout(predicate::str::contains("Source: live"))
        .stdout(predicate::str::contains("19.5 °C"))
        .stdout(predicate::str::contains("All clear"))
        .stdout(predicate::str::contains("Unread news: 1"));
}

#[tokio::test]
async fn test_rejected_token_is_cleared_with_hint() {
    let server = MockServer::start().await;
    let sandbox = Sandbox::new();
    sandbox.seed_token("stale");
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    sandbox
        .cmd(&server)
        .arg("profile")
        .assert()
        .success()
        .stdout(predicate::str::contains("Source: fallback"))
        .stdout(predicate::str::contains("sentinel login"));

    assert!(!sandbox.token_path().exists());
}

#[tokio::test]
async fn test_opening_news_marks_it_read() {
    let server = MockServer::start().await;
    let sandbox = Sandbox::new();
    sandbox.seed_token("tok-1");
    mount_profile(&server, "tok-1").await;
    Mock::given(method("GET"))
        .and(path("/api/news"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "heading": "Shift change", "body": "New rota from Monday"},
            {"id": 2, "heading": "Gas drill", "body": "Thursday at 10"}
        ])))
        .mount(&server)
        .await;

    sandbox
        .cmd(&server)
        .arg("news")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 unread"));

    sandbox
        .cmd(&server)
        .args(["news", "--open", "Gas drill"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Thursday at 10"));

    sandbox
        .cmd(&server)
        .arg("news")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 unread"));
}

#[tokio::test]
async fn test_history_rejects_inverted_range() {
    let server = MockServer::start().await;
    let sandbox = Sandbox::new();
    sandbox.seed_token("tok-1");
    mount_profile(&server, "tok-1").await;
    Mock::given(method("GET"))
        .and(path("/api/data/dev-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    sandbox
        .cmd(&server)
        .args([
            "history",
            "--from",
            "2024-05-02T00:00:00Z",
            "--to",
            "2024-05-01T00:00:00Z",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--from must be earlier than --to"));
}

#[tokio::test]
async fn test_forgot_password_posts_email() {
    let server = MockServer::start().await;
    let sandbox = Sandbox::new();
    Mock::given(method("POST"))
        .and(path("/auth/forgot-password"))
        .and(body_json(json!({"email": "maggie@example.com"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    sandbox
        .cmd(&server)
        .args(["forgot-password", "maggie@example.com"])
        .assert()
        .success()
        .stdout(predicate::str::contains("reset instructions"));
}

#[tokio::test]
async fn test_watch_stops_after_count() {
    let server = MockServer::start().await;
    let sandbox = Sandbox::new();

    sandbox
        .cmd(&server)
        .args(["watch", "--interval", "1", "--count", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Source: fallback").count(1));
}

#[tokio::test]
async fn test_history_rejects_blank_device() {
    let server = MockServer::start().await;
    let sandbox = Sandbox::new();
    sandbox.seed_token("tok-1");
    mount_profile(&server, "tok-1").await;
    Mock::given(method("GET"))
        .and(path("/api/data/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    sandbox
        .cmd(&server)
        .args(["history", " "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Device id must not be blank"));
}

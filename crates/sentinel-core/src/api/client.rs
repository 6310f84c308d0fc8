//! API client for the Sentinel backend.
//!
//! Authenticated calls read the bearer token from the `CredentialStore` on
//! every request. A 401 clears the store and revokes the session before the
//! error is returned, so the next session check already reflects it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::{CredentialStore, SessionSignal};
use crate::models::{HistoricalReading, NewsItem, Profile, SensorReading};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Number of days covered by a history request without explicit bounds.
const HISTORY_DEFAULT_DAYS: i64 = 30;

/// Status value the backend sends with a successful login
const LOGIN_SUCCESS_STATUS: &str = "success";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct ForgotPasswordRequest<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct ResetPasswordRequest<'a> {
    token: &'a str,
    #[serde(rename = "newPassword")]
    new_password: &'a str,
}

/// Body of `POST /auth/login`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub data: Option<LoginData>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginData {
    #[serde(default)]
    pub token: Option<String>,
}

impl LoginResponse {
    /// The token, if the response carries both the success status and a
    /// non-empty token.
    pub fn token(&self) -> Option<&str> {
        let succeeded = self
            .status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case(LOGIN_SUCCESS_STATUS));
        if !succeeded {
            return None;
        }
        self.data
            .as_ref()
            .and_then(|d| d.token.as_deref())
            .filter(|t| !t.is_empty())
    }
}

/// API client for the Sentinel backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    base: Url,
    store: Arc<CredentialStore>,
    signal: SessionSignal,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        store: Arc<CredentialStore>,
        signal: SessionSignal,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let base = Url::parse(&base_url)
            .with_context(|| format!("Invalid backend URL {}", base_url))?;
        if base.cannot_be_a_base() {
            bail!("Backend URL {} cannot hold a path", base_url);
        }

        Ok(Self {
            client,
            base_url,
            base,
            store,
            signal,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credential_store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn session_signal(&self) -> &SessionSignal {
        &self.signal
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// URL under the base with each segment percent-encoded, so ids can't
    /// change the path or the query.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::invalid_response(format!("{} cannot hold a path", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Read the token, failing without any network call when there is none.
    pub async fn ensure_authenticated(&self) -> Result<String, ApiError> {
        self.store.get().await.ok_or(ApiError::Unauthenticated)
    }

    /// Map a non-success status to an error, leaving side effects to the caller.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse_json(response: reqwest::Response, url: &str) -> Result<Value, ApiError> {
        response.json().await.map_err(|e| {
            ApiError::invalid_response(format!("Failed to parse JSON response from {}: {}", url, e))
        })
    }

    /// Authenticated GET returning the raw JSON body.
    async fn get_json(&self, url: Url, query: &[(&str, String)]) -> Result<Value, ApiError> {
        let token = self.ensure_authenticated().await?;
        debug!(url = %url, "GET");

        let response = self
            .client
            .get(url.clone())
            .bearer_auth(&token)
            .query(query)
            .send()
            .await?;

        match Self::check_response(response).await {
            Ok(response) => Self::parse_json(response, url.as_str()).await,
            Err(ApiError::AuthRejected) => {
                // A login may have replaced the token while this request was
                // in flight; only the token that was sent gets cleared.
                if self.store.clear_if(&token).await {
                    warn!(url = %url, "Token rejected, cleared stored credential");
                    self.signal.revoke();
                } else {
                    debug!(url = %url, "Rejected token was already replaced");
                }
                Err(ApiError::AuthRejected)
            }
            Err(e) => Err(e),
        }
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<reqwest::Response, ApiError> {
        let url = self.url(path);
        debug!(url = %url, "POST");

        let response = self.client.post(&url).json(body).send().await?;
        Self::check_response(response).await
    }

    // ===== Authentication =====

    /// Exchange credentials for a login response. The caller decides whether
    /// the response counts as a success (see `LoginResponse::token`).
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let url = self.url("/auth/login");
        let response = self
            .post("/auth/login", &LoginRequest { username, password })
            .await?;
        let value = Self::parse_json(response, &url).await?;
        decode(value)
    }

    /// Profile of the token's owner. Also used to validate a restored token.
    pub async fn fetch_profile(&self) -> Result<Profile, ApiError> {
        let value = self.get_json(self.endpoint(&["auth", "me"])?, &[]).await?;
        decode(unwrap_envelope(value))
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<(), ApiError> {
        self.post("/auth/forgot-password", &ForgotPasswordRequest { email })
            .await?;
        Ok(())
    }

    /// Set a new password with a reset token. A rejection carries the
    /// backend's `message` as the error body when it sends one.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), ApiError> {
        let url = self.url("/auth/reset-password");
        debug!(url = %url, "POST");

        let response = self
            .client
            .post(&url)
            .json(&ResetPasswordRequest {
                token,
                new_password,
            })
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or(body);
        Err(ApiError::from_status(status, &message))
    }

    // ===== Data Fetching Methods =====

    /// Latest reading keyed by metric name
    pub async fn fetch_sensor_data(&self) -> Result<SensorReading, ApiError> {
        let url = self.endpoint(&["api", "data", "latest"])?;
        let value = match unwrap_envelope(self.get_json(url, &[]).await?) {
            // Some deployments answer with a list of readings, newest first
            Value::Array(items) => items.into_iter().next().unwrap_or(Value::Null),
            other => other,
        };
        if value.is_null() {
            return Ok(SensorReading::default());
        }
        decode(value)
    }

    pub async fn fetch_news(&self) -> Result<Vec<NewsItem>, ApiError> {
        let url = self.endpoint(&["api", "news"])?;
        let value = unwrap_envelope(self.get_json(url, &[]).await?);
        if value.is_null() {
            return Ok(Vec::new());
        }
        decode(value)
    }

    /// Readings for one device. Without bounds the window is the trailing
    /// 30 days ending now.
    pub async fn fetch_historical_data(
        &self,
        device_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<HistoricalReading>, ApiError> {
        let device_id = device_id.trim();
        if device_id.is_empty() {
            return Err(ApiError::MissingDeviceId);
        }
        let (from, to) = history_window(from, to, Utc::now())?;
        let query = [
            ("from", from.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("to", to.to_rfc3339_opts(SecondsFormat::Secs, true)),
        ];

        let url = self.endpoint(&["api", "data", device_id])?;
        let value = self.get_json(url, &query).await?;
        let value = unwrap_envelope(value);
        if value.is_null() {
            return Ok(Vec::new());
        }
        decode(value)
    }
}

/// Resolve optional history bounds against `now`.
fn history_window(
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ApiError> {
    let to = to.unwrap_or(now);
    let from = from.unwrap_or(to - chrono::Duration::days(HISTORY_DEFAULT_DAYS));
    if from >= to {
        return Err(ApiError::InvalidDateRange);
    }
    Ok((from, to))
}

/// Unwrap a `{ "status": ..., "data": ... }` envelope, leaving bare payloads
/// untouched.
fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value)
        .map_err(|e| ApiError::invalid_response(format!("Unexpected response shape: {}", e)))
}

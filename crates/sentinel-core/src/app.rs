//! Application wiring for Sentinel.
//!
//! `App` builds the credential store, API client, session manager and news
//! tracker from a `Config`, and exposes the data accessors the screens use.
//! Every accessor applies the fallback policy, so callers always get
//! something to show along with its provenance.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::api::{ApiClient, ApiError};
use crate::auth::{CredentialStore, PasswordRecovery, SessionManager, SessionSignal, SessionState};
use crate::config::Config;
use crate::dashboard::{spawn_refresh, RefreshHandle};
use crate::fallback::{
    fallback_history, fallback_news, fallback_profile, fallback_sensor_reading,
    fetch_with_fallback, Resolved,
};
use crate::models::{HistoricalReading, NewsItem, Profile, SensorReading};
use crate::news::NotWatchedTracker;
use crate::storage::LocalStore;

pub struct App {
    pub config: Config,
    pub api: ApiClient,
    pub session: SessionManager,
    pub news: NotWatchedTracker,
    store: Arc<CredentialStore>,
}

impl App {
    /// Create a new application instance. The credential backend is chosen
    /// here, once.
    pub async fn new(config: Config) -> Result<Self> {
        let data_dir = config.data_dir()?;
        debug!(?data_dir, "Data directory configured");
        let local = LocalStore::new(data_dir);

        let store = CredentialStore::select(config.storage, local.clone()).await;
        Self::with_store(config, store, local)
    }

    /// Build around an existing credential store.
    pub fn with_store(config: Config, store: Arc<CredentialStore>, local: LocalStore) -> Result<Self> {
        let base_url = config.api_base_url();
        info!(base_url = %base_url, "Using backend");

        let api = ApiClient::new(
            base_url,
            config.request_timeout(),
            Arc::clone(&store),
            SessionSignal::new(),
        )?;
        let session = SessionManager::new(api.clone()).with_validation(config.validate_on_startup);
        let news = NotWatchedTracker::new(local);

        Ok(Self {
            config,
            api,
            session,
            news,
            store,
        })
    }

    /// Restore the previous session, leaving `Loading`.
    pub async fn start(&self) -> SessionState {
        self.session.restore().await
    }

    pub fn credential_backend(&self) -> &'static str {
        self.store.backend_name()
    }

    pub fn recovery(&self) -> PasswordRecovery {
        PasswordRecovery::new(self.api.clone())
    }

    pub async fn sensors(&self) -> Resolved<SensorReading> {
        fetch_with_fallback("sensors", self.api.fetch_sensor_data(), fallback_sensor_reading).await
    }

    pub async fn profile(&self) -> Resolved<Profile> {
        fetch_with_fallback("profile", self.api.fetch_profile(), fallback_profile).await
    }

    /// News items, with the unread set seeded from whatever is shown.
    pub async fn news_feed(&mut self) -> Resolved<Vec<NewsItem>> {
        let resolved = fetch_with_fallback("news", self.api.fetch_news(), fallback_news).await;
        self.news.sync(&resolved.data).await;
        resolved
    }

    /// Open a news item by heading, marking it read the first time.
    pub async fn open_news(&mut self, heading: &str) -> Option<NewsItem> {
        let feed = self.news_feed().await;
        let item = feed.data.into_iter().find(|item| item.heading == heading)?;
        if self.news.mark_watched(&item.heading).await {
            debug!(heading = %item.heading, "News item marked as read");
        }
        Some(item)
    }

    /// Device history. A blank device id or an inverted range is the caller's
    /// mistake and is returned as an error instead of fallback data.
    pub async fn history(
        &self,
        device_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Resolved<Vec<HistoricalReading>>, ApiError> {
        let resolved = fetch_with_fallback(
            "history",
            self.api.fetch_historical_data(device_id, from, to),
            || fallback_history(device_id),
        )
        .await;

        let invalid = match resolved.error() {
            Some(ApiError::InvalidDateRange) => Some(ApiError::InvalidDateRange),
            Some(ApiError::MissingDeviceId) => Some(ApiError::MissingDeviceId),
            _ => None,
        };
        match invalid {
            Some(e) => Err(e),
            None => Ok(resolved),
        }
    }

    /// Start refreshing dashboard data in the background.
    pub fn start_refresh(&self) -> RefreshHandle {
        spawn_refresh(self.api.clone(), self.config.refresh_interval())
    }
}

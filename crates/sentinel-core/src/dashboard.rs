//! Dashboard data: sensor alerts and periodic background refresh.
//!
//! The dashboard shows one alert picked from the conditions the latest
//! reading triggers, and re-fetches sensor data, news and profile on a fixed
//! interval. Results are sent over a channel so the consumer never blocks on
//! the network.

use std::time::Duration;

use rand::seq::SliceRandom;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::auth::SessionState;
use crate::fallback::{
    fallback_news, fallback_profile, fallback_sensor_reading, fetch_with_fallback, Resolved,
};
use crate::models::{NewsItem, Profile, SensorReading};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the refresh result channel.
const CHANNEL_BUFFER_SIZE: usize = 8;

const HEAT_THRESHOLD_C: f64 = 26.0;
const STEPS_THRESHOLD: f64 = 6000.0;
const HEART_RATE_THRESHOLD_BPM: f64 = 125.0;
const NOISE_THRESHOLD_DB: f64 = 70.0;
const GAS_THRESHOLD_PPM: f64 = 2.0;

// ============================================================================
// Alerts
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alert {
    Heat,
    Steps,
    HeartRate,
    Noise,
    Gas,
    /// Nothing triggered
    Default,
}

impl Alert {
    pub fn title(&self) -> &'static str {
        match self {
            Alert::Heat => "Heat warning",
            Alert::Steps => "Step goal reached",
            Alert::HeartRate => "High heart rate",
            Alert::Noise => "Loud environment",
            Alert::Gas => "Gas detected",
            Alert::Default => "All clear",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Alert::Heat => "It is hot. Take a break in the shade and drink water.",
            Alert::Steps => "You have walked a lot today. Remember to rest your legs.",
            Alert::HeartRate => "Your heart rate is high. Slow down for a moment.",
            Alert::Noise => "Noise levels are high. Wear hearing protection.",
            Alert::Gas => "Elevated gas levels. Ventilate the area or move away.",
            Alert::Default => "All readings are within normal ranges.",
        }
    }
}

/// Every alert the reading triggers, or `[Alert::Default]` when none do.
pub fn alerts_for(reading: &SensorReading) -> Vec<Alert> {
    let above = |value: Option<f64>, limit: f64| value.is_some_and(|v| v > limit);

    let mut alerts = Vec::new();
    if above(reading.temperature, HEAT_THRESHOLD_C) {
        alerts.push(Alert::Heat);
    }
    if above(reading.steps, STEPS_THRESHOLD) {
        alerts.push(Alert::Steps);
    }
    if above(reading.heart_rate, HEART_RATE_THRESHOLD_BPM) {
        alerts.push(Alert::HeartRate);
    }
    if above(reading.noise_level, NOISE_THRESHOLD_DB) {
        alerts.push(Alert::Noise);
    }
    if reading.gas.is_some_and(|g| g >= GAS_THRESHOLD_PPM) {
        alerts.push(Alert::Gas);
    }

    if alerts.is_empty() {
        alerts.push(Alert::Default);
    }
    alerts
}

/// Pick the alert to show this render.
pub fn pick_alert(reading: &SensorReading) -> Alert {
    alerts_for(reading)
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(Alert::Default)
}

// ============================================================================
// Refresh
// ============================================================================

/// One round of dashboard data, each part resolved independently
#[derive(Debug)]
pub struct Snapshot {
    pub sensors: Resolved<SensorReading>,
    pub news: Resolved<Vec<NewsItem>>,
    pub profile: Resolved<Profile>,
}

impl Snapshot {
    pub fn auth_rejected(&self) -> bool {
        self.sensors.auth_rejected() || self.news.auth_rejected() || self.profile.auth_rejected()
    }
}

/// Fetch sensors, news and profile concurrently, falling back per part.
pub async fn refresh_all(api: &ApiClient) -> Snapshot {
    let (sensors, news, profile) = futures::join!(
        fetch_with_fallback("sensors", api.fetch_sensor_data(), fallback_sensor_reading),
        fetch_with_fallback("news", api.fetch_news(), fallback_news),
        fetch_with_fallback("profile", api.fetch_profile(), fallback_profile),
    );
    debug!(
        sensors = sensors.provenance(),
        news = news.provenance(),
        profile = profile.provenance(),
        "Dashboard refreshed"
    );
    Snapshot {
        sensors,
        news,
        profile,
    }
}

#[derive(Debug)]
pub enum RefreshResult {
    Snapshot(Box<Snapshot>),
    /// The backend rejected the token; refreshing has stopped
    SessionExpired,
}

/// Handle to a running background refresh. Dropping it stops the task.
pub struct RefreshHandle {
    rx: mpsc::Receiver<RefreshResult>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Wait for the next result; `None` once the task has ended.
    pub async fn next(&mut self) -> Option<RefreshResult> {
        self.rx.recv().await
    }

    /// Collect results that are already waiting without blocking.
    pub fn drain(&mut self) -> Vec<RefreshResult> {
        let mut results = Vec::new();
        while let Ok(result) = self.rx.try_recv() {
            results.push(result);
        }
        results
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Refresh immediately, then once per `interval`, until the token is
/// rejected or the handle is dropped.
pub fn spawn_refresh(api: ApiClient, interval: Duration) -> RefreshHandle {
    let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let snapshot = refresh_all(&api).await;
            // A rejection that raced a fresh login leaves the session intact
            let expired = snapshot.auth_rejected()
                && api.session_signal().state() == SessionState::Unauthenticated;

            if tx.send(RefreshResult::Snapshot(Box::new(snapshot))).await.is_err() {
                debug!("Refresh receiver dropped, stopping");
                return;
            }
            if expired {
                info!("Session expired, stopping background refresh");
                let _ = tx.send(RefreshResult::SessionExpired).await;
                return;
            }
        }
    });

    RefreshHandle { rx, task }
}

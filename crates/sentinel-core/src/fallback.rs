//! Fetch-with-fallback and the bundled reference datasets.
//!
//! Data consumers wrap an API call in `fetch_with_fallback`. A failed call, or
//! a successful one with nothing in it, is replaced wholesale by a bundled
//! dataset of the same shape, so presentation code never waits on the
//! backend and never needs to know where the data came from. Live and
//! fallback values are never mixed within one result.
//!
//! The API client itself never falls back; that choice stays with the caller.

use std::future::Future;
use std::sync::OnceLock;

use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::api::ApiError;
use crate::models::{HistoricalReading, NewsItem, Profile, SensorReading};

const SENSORS_JSON: &str = include_str!("../data/sensors.json");
const NEWS_JSON: &str = include_str!("../data/news.json");
const PROFILE_JSON: &str = include_str!("../data/profile.json");
const HISTORY_JSON: &str = include_str!("../data/history.json");

static SENSORS: OnceLock<SensorReading> = OnceLock::new();
static NEWS: OnceLock<Vec<NewsItem>> = OnceLock::new();
static PROFILE: OnceLock<Profile> = OnceLock::new();
static HISTORY: OnceLock<Vec<HistoricalReading>> = OnceLock::new();

/// Why a fallback dataset was used
#[derive(Debug)]
pub enum FallbackReason {
    /// The backend answered but the payload was empty
    Empty,
    Failed(ApiError),
}

#[derive(Debug)]
pub enum DataSource {
    Live,
    Fallback(FallbackReason),
}

/// A value together with where it came from
#[derive(Debug)]
pub struct Resolved<T> {
    pub data: T,
    pub source: DataSource,
}

impl<T> Resolved<T> {
    pub fn is_live(&self) -> bool {
        matches!(self.source, DataSource::Live)
    }

    /// The live call failed because the token was rejected. Callers usually
    /// send the user back to login instead of quietly showing the fallback.
    pub fn auth_rejected(&self) -> bool {
        matches!(
            self.source,
            DataSource::Fallback(FallbackReason::Failed(ApiError::AuthRejected))
        )
    }

    pub fn error(&self) -> Option<&ApiError> {
        match &self.source {
            DataSource::Fallback(FallbackReason::Failed(e)) => Some(e),
            _ => None,
        }
    }

    pub fn provenance(&self) -> &'static str {
        match self.source {
            DataSource::Live => "live",
            DataSource::Fallback(_) => "fallback",
        }
    }
}

/// Whether a successful response actually carried data
pub trait Presence {
    fn is_absent(&self) -> bool;
}

impl Presence for SensorReading {
    fn is_absent(&self) -> bool {
        self.is_empty()
    }
}

impl Presence for Profile {
    fn is_absent(&self) -> bool {
        self.is_empty()
    }
}

impl<T> Presence for Vec<T> {
    fn is_absent(&self) -> bool {
        self.is_empty()
    }
}

/// Run one live fetch and fall back on failure or an empty payload.
/// Never retries.
pub async fn fetch_with_fallback<T, Fut, F>(name: &str, fetch: Fut, fallback: F) -> Resolved<T>
where
    T: Presence,
    Fut: Future<Output = Result<T, ApiError>>,
    F: FnOnce() -> T,
{
    match fetch.await {
        Ok(data) if !data.is_absent() => {
            debug!(source = name, "Using live data");
            Resolved {
                data,
                source: DataSource::Live,
            }
        }
        Ok(_) => {
            debug!(source = name, "Live response was empty, using fallback data");
            Resolved {
                data: fallback(),
                source: DataSource::Fallback(FallbackReason::Empty),
            }
        }
        Err(e) => {
            if e.is_auth_rejected() {
                warn!(source = name, "Session rejected, using fallback data");
            } else {
                error!(source = name, error = %e, "Fetch failed, using fallback data");
            }
            Resolved {
                data: fallback(),
                source: DataSource::Fallback(FallbackReason::Failed(e)),
            }
        }
    }
}

fn parse_bundled<T: DeserializeOwned + Default>(name: &str, json: &str) -> T {
    serde_json::from_str(json).unwrap_or_else(|e| {
        error!(dataset = name, error = %e, "Bundled fallback data is invalid");
        T::default()
    })
}

/// Reference reading with every metric present
pub fn fallback_sensor_reading() -> SensorReading {
    SENSORS
        .get_or_init(|| parse_bundled("sensors", SENSORS_JSON))
        .clone()
}

pub fn fallback_news() -> Vec<NewsItem> {
    NEWS.get_or_init(|| parse_bundled("news", NEWS_JSON)).clone()
}

pub fn fallback_profile() -> Profile {
    PROFILE
        .get_or_init(|| parse_bundled("profile", PROFILE_JSON))
        .clone()
}

/// Reference history, labelled with the requested device
pub fn fallback_history(device_id: &str) -> Vec<HistoricalReading> {
    HISTORY
        .get_or_init(|| parse_bundled("history", HISTORY_JSON))
        .iter()
        .cloned()
        .map(|mut row| {
            row.device_id = Some(device_id.to_string());
            row
        })
        .collect()
}

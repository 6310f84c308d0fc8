//! Core library for the Sentinel sensor-monitoring client.
//!
//! Sentinel is a thin data-fetching layer over a remote HTTP backend. This
//! crate holds everything below the presentation layer:
//!
//! - `auth`: bearer token storage, the session state machine, password recovery
//! - `api`: the authenticated HTTP client and its error taxonomy
//! - `fallback`: fetch-with-fallback and the bundled reference datasets
//! - `dashboard`: sensor alerts and periodic background refresh
//! - `news`: unread news tracking
//! - `storage`: JSON key/value persistence in the data directory
//! - `config`: configuration loading
//! - `app`: the composition root wiring the pieces together

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod fallback;
pub mod models;
pub mod news;
pub mod storage;

pub use api::{ApiClient, ApiError, RequestFailure};
pub use app::App;
pub use auth::{
    CredentialStore, LoginError, PasswordRecovery, RecoveryError, SessionManager, SessionSignal,
    SessionState,
};
pub use config::{Config, StorageBackend};
pub use fallback::{fetch_with_fallback, DataSource, FallbackReason, Presence, Resolved};
pub use models::{HistoricalReading, Metric, NewsItem, Profile, SensorReading};
pub use news::NotWatchedTracker;
pub use storage::{LocalStore, StorageError};

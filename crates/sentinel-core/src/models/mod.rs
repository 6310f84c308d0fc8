//! Data models for Sentinel entities.
//!
//! - `SensorReading`, `HistoricalReading`, `Metric`: environmental sensor data
//! - `NewsItem`: news and alert items shown alongside the dashboard
//! - `Profile`: the logged-in user's profile

pub mod news;
pub mod profile;
pub mod sensor;

pub use news::NewsItem;
pub use profile::Profile;
pub use sensor::{HistoricalReading, Metric, SensorReading};

//! Sensor reading models.
//!
//! The backend keys the latest reading by metric name. Each metric is an
//! independent scalar in its own unit, so every field is optional: a reading
//! with some metrics missing is still a live reading.

use serde::{Deserialize, Serialize};

/// A sensor metric shown on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Temperature,
    Humidity,
    Gas,
    Steps,
    HeartRate,
    NoiseLevel,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::Temperature,
        Metric::Humidity,
        Metric::Gas,
        Metric::Steps,
        Metric::HeartRate,
        Metric::NoiseLevel,
    ];

    /// Key used by the backend
    pub fn key(&self) -> &'static str {
        match self {
            Metric::Temperature => "temperature",
            Metric::Humidity => "humidity",
            Metric::Gas => "gas",
            Metric::Steps => "steps",
            Metric::HeartRate => "heart_rate",
            Metric::NoiseLevel => "noise_level",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Temperature => "Temperature",
            Metric::Humidity => "Humidity",
            Metric::Gas => "Gas",
            Metric::Steps => "Steps",
            Metric::HeartRate => "Heart rate",
            Metric::NoiseLevel => "Noise level",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Metric::Temperature => "°C",
            Metric::Humidity => "%",
            Metric::Gas => "ppm",
            Metric::Steps => "steps",
            Metric::HeartRate => "bpm",
            Metric::NoiseLevel => "dB",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.key() == key)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default, alias = "gasLevel")]
    pub gas: Option<f64>,
    #[serde(default)]
    pub steps: Option<f64>,
    #[serde(default, alias = "heartRate")]
    pub heart_rate: Option<f64>,
    #[serde(default, alias = "noiseLevel")]
    pub noise_level: Option<f64>,
}

impl SensorReading {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Temperature => self.temperature,
            Metric::Humidity => self.humidity,
            Metric::Gas => self.gas,
            Metric::Steps => self.steps,
            Metric::HeartRate => self.heart_rate,
            Metric::NoiseLevel => self.noise_level,
        }
    }

    /// Metrics paired with their values, in dashboard order
    pub fn metrics(&self) -> impl Iterator<Item = (Metric, Option<f64>)> + '_ {
        Metric::ALL.into_iter().map(move |m| (m, self.get(m)))
    }

    /// True when no metric carries a value
    pub fn is_empty(&self) -> bool {
        self.metrics().all(|(_, v)| v.is_none())
    }

    /// Format one metric for display, e.g. `28 °C`
    pub fn display(&self, metric: Metric) -> String {
        match self.get(metric) {
            Some(v) if v.fract() == 0.0 => format!("{} {}", v as i64, metric.unit()),
            Some(v) => format!("{:.1} {}", v, metric.unit()),
            None => "n/a".to_string(),
        }
    }
}

/// One timestamped reading from a device's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalReading {
    #[serde(default, alias = "timestamp", alias = "recordedAt")]
    pub recorded_at: Option<String>,
    #[serde(default, alias = "deviceId")]
    pub device_id: Option<String>,
    #[serde(flatten)]
    pub reading: SensorReading,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_keys_round_trip() {
        for metric in Metric::ALL {
            assert_eq!(Metric::from_key(metric.key()), Some(metric));
        }
        assert_eq!(Metric::from_key("pressure"), None);
    }

    #[test]
    fn test_parse_latest_reading_with_extra_fields() {
        let json = r#"{"temperature": 21.5, "humidity": 40, "gas": 1, "steps": 5400,
                       "heart_rate": 72, "noise_level": 55, "device": "abc"}"#;
        let reading: SensorReading = serde_json::from_str(json).unwrap();
        assert_eq!(reading.temperature, Some(21.5));
        assert_eq!(reading.steps, Some(5400.0));
        assert!(!reading.is_empty());
    }

    #[test]
    fn test_camel_case_aliases() {
        let json = r#"{"heartRate": 90, "noiseLevel": 71, "gasLevel": 2}"#;
        let reading: SensorReading = serde_json::from_str(json).unwrap();
        assert_eq!(reading.heart_rate, Some(90.0));
        assert_eq!(reading.noise_level, Some(71.0));
        assert_eq!(reading.gas, Some(2.0));
        assert_eq!(reading.temperature, None);
    }

    #[test]
    fn test_empty_reading() {
        assert!(SensorReading::default().is_empty());
        let reading: SensorReading = serde_json::from_str("{}").unwrap();
        assert!(reading.is_empty());
    }

    #[test]
    fn test_display() {
        let reading = SensorReading {
            temperature: Some(21.46),
            steps: Some(6200.0),
            ..Default::default()
        };
        assert_eq!(reading.display(Metric::Temperature), "21.5 °C");
        assert_eq!(reading.display(Metric::Steps), "6200 steps");
        assert_eq!(reading.display(Metric::Gas), "n/a");
    }

    #[test]
    fn test_historical_reading_flattens_metrics() {
        let json = r#"{"timestamp": "2024-05-01T10:00:00Z", "deviceId": "dev-1", "temperature": 19}"#;
        let row: HistoricalReading = serde_json::from_str(json).unwrap();
        assert_eq!(row.recorded_at.as_deref(), Some("2024-05-01T10:00:00Z"));
        assert_eq!(row.device_id.as_deref(), Some("dev-1"));
        assert_eq!(row.reading.temperature, Some(19.0));
    }
}

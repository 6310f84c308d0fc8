//! Plain-text rendering of Sentinel data for the terminal.

use sentinel_core::dashboard::Alert;
use sentinel_core::{
    ApiError, DataSource, FallbackReason, HistoricalReading, Metric, NewsItem, NotWatchedTracker,
    Profile, Resolved, SensorReading,
};

/// Width of the label column in key/value listings
const LABEL_WIDTH: usize = 14;

/// Longest news summary shown in list views
const SUMMARY_MAX_LEN: usize = 60;

/// Where the data came from, e.g. `Source: fallback (backend unreachable)`
pub fn source_line<T>(resolved: &Resolved<T>) -> String {
    let detail = match &resolved.source {
        DataSource::Live => return "Source: live".to_string(),
        DataSource::Fallback(FallbackReason::Empty) => "backend returned no data".to_string(),
        DataSource::Fallback(FallbackReason::Failed(ApiError::Unauthenticated)) => {
            "not logged in".to_string()
        }
        DataSource::Fallback(FallbackReason::Failed(ApiError::AuthRejected)) => {
            "session rejected".to_string()
        }
        DataSource::Fallback(FallbackReason::Failed(e)) => e.to_string(),
    };
    format!("Source: fallback ({})", detail)
}

/// A hint to log in again, when the session is missing or was rejected
pub fn session_hint<T>(resolved: &Resolved<T>) -> Option<&'static str> {
    if resolved.auth_rejected() {
        return Some("Your session has expired. Run `sentinel login` to sign in again.");
    }
    match resolved.error() {
        Some(ApiError::Unauthenticated) => {
            Some("You are not logged in. Run `sentinel login` to see live data.")
        }
        _ => None,
    }
}

pub fn sensors(reading: &SensorReading) -> String {
    Metric::ALL
        .iter()
        .map(|&metric| {
            format!(
                "{:<width$}{}",
                metric.label(),
                reading.display(metric),
                width = LABEL_WIDTH
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn alert(alert: Alert) -> String {
    format!("{}: {}", alert.title(), alert.message())
}

/// News list with unread markers
pub fn news_list(items: &[NewsItem], tracker: &NotWatchedTracker) -> String {
    items
        .iter()
        .map(|item| {
            let marker = if tracker.is_unread(&item.heading) { "*" } else { " " };
            let summary = truncate(item.summary(), SUMMARY_MAX_LEN);
            if summary.is_empty() {
                format!("{} {}", marker, item.heading)
            } else {
                format!("{} {} - {}", marker, item.heading, summary)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn news_item(item: &NewsItem) -> String {
    let mut out = item.heading.clone();
    let meta: Vec<String> = [
        item.category.clone(),
        item.published_at.as_deref().map(format_timestamp),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !meta.is_empty() {
        out.push_str(&format!("\n({})", meta.join(", ")));
    }
    if !item.body.is_empty() {
        out.push_str("\n\n");
        out.push_str(&item.body);
    }
    out
}

pub fn profile(profile: &Profile) -> String {
    profile
        .fields()
        .iter()
        .map(|(label, value)| format!("{:<width$}{}", label, value, width = LABEL_WIDTH))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn history(rows: &[HistoricalReading]) -> String {
    rows.iter()
        .map(|row| {
            let when = row
                .recorded_at
                .as_deref()
                .map(format_timestamp)
                .unwrap_or_else(|| "unknown time".to_string());
            let values: Vec<String> = Metric::ALL
                .iter()
                .filter(|&&metric| row.reading.get(metric).is_some())
                .map(|&metric| format!("{}={}", metric.key(), row.reading.display(metric)))
                .collect();
            format!("{}  {}", when, values.join("  "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Shorten to `max_len` characters, ending in an ellipsis when cut
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return s.chars().take(max_len).collect();
    }
    let cut: String = s.chars().take(max_len - 3).collect();
    format!("{}...", cut.trim_end())
}

/// Render an RFC 3339 timestamp as `YYYY-MM-DD HH:MM` in UTC; anything else
/// is shown as received.
pub fn format_timestamp(raw: &str) -> String {
    match chrono::DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt
            .with_timezone(&chrono::Utc)
            .format("%Y-%m-%d %H:%M")
            .to_string(),
        Err(_) => raw.to_string(),
    }
}

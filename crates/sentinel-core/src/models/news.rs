use serde::{Deserialize, Serialize};

/// A news or alert item. Read/unread status is tracked client-side by
/// `NotWatchedTracker`, never by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: i64,
    pub heading: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, alias = "publishedAt", skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

impl NewsItem {
    /// First line of the body, for list views
    pub fn summary(&self) -> &str {
        self.body.lines().next().unwrap_or_default().trim()
    }
}

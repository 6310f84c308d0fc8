//! Unread news tracking.
//!
//! The set of headings the user has not opened yet is kept locally under the
//! `NotWatched` key. It only drives the "unread" marker; the backend never
//! hears about it. A missing key means the set was never seeded, while an
//! empty set means everything has been read.

use tracing::{debug, warn};

use crate::models::NewsItem;
use crate::storage::LocalStore;

/// Local key holding the unread headings
pub const NOT_WATCHED_KEY: &str = "NotWatched";

pub struct NotWatchedTracker {
    store: LocalStore,
    unread: Option<Vec<String>>,
}

impl NotWatchedTracker {
    pub fn new(store: LocalStore) -> Self {
        Self {
            store,
            unread: None,
        }
    }

    /// Load the persisted set, seeding it with every heading in `news` the
    /// first time.
    pub async fn sync(&mut self, news: &[NewsItem]) {
        if self.unread.is_none() {
            self.unread = match self.store.load::<Vec<String>>(NOT_WATCHED_KEY).await {
                Ok(stored) => stored.map(|s| s.value),
                Err(e) => {
                    warn!(error = %e, "Failed to load unread news, starting fresh");
                    None
                }
            };
        }

        if self.unread.is_none() {
            let mut headings: Vec<String> = Vec::with_capacity(news.len());
            for item in news {
                if !headings.contains(&item.heading) {
                    headings.push(item.heading.clone());
                }
            }
            debug!(count = headings.len(), "Seeding unread news");
            self.unread = Some(headings);
            self.persist().await;
        }
    }

    pub fn is_unread(&self, heading: &str) -> bool {
        self.unread
            .as_ref()
            .is_some_and(|set| set.iter().any(|h| h == heading))
    }

    /// Unread headings in their original order
    pub fn unread(&self) -> &[String] {
        self.unread.as_deref().unwrap_or_default()
    }

    /// Mark an item as opened. Returns true only the first time a heading is
    /// removed.
    pub async fn mark_watched(&mut self, heading: &str) -> bool {
        let Some(set) = self.unread.as_mut() else {
            return false;
        };
        let Some(index) = set.iter().position(|h| h == heading) else {
            return false;
        };

        set.remove(index);
        self.persist().await;
        true
    }

    async fn persist(&self) {
        if let Some(ref set) = self.unread {
            if let Err(e) = self.store.save(NOT_WATCHED_KEY, set).await {
                warn!(error = %e, "Failed to save unread news");
            }
        }
    }
}

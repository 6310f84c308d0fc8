//! Local key/value persistence.
//!
//! Each key is stored as `<data_dir>/<key>.json`, wrapping the value in a
//! `StoredValue` that records when it was written. This is the
//! browser-local style medium used for the bearer token when no OS keychain
//! is available, and for the unread news set.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored value is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Storage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredValue<T> {
    pub value: T,
    pub stored_at: DateTime<Utc>,
}

impl<T> StoredValue<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            stored_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Load a value, returning `Ok(None)` when the key was never written.
    pub async fn load<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<StoredValue<T>>, StorageError> {
        let path = self.path(key);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let stored: StoredValue<T> = serde_json::from_str(&contents)?;
        debug!(key, stored_at = %stored.stored_at, "Loaded local value");
        Ok(Some(stored))
    }

    /// Write a value. The file is written beside its final path and renamed
    /// into place so readers see either the old or the new value.
    pub async fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path(key);
        let tmp = self.dir.join(format!(".{}.json.tmp", key));
        let contents = serde_json::to_string_pretty(&StoredValue::new(value))?;
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(key, "Saved local value");
        Ok(())
    }

    /// Remove a key. Removing a missing key is not an error.
    pub async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

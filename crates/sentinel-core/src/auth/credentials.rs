use std::sync::Arc;

use keyring::Entry;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::StorageBackend;
use crate::storage::{LocalStore, StorageError};

const SERVICE_NAME: &str = "sentinel";

/// Key (and keychain account) holding the bearer token
pub const TOKEN_KEY: &str = "token";

enum Backend {
    Keyring,
    Local(LocalStore),
    Memory(std::sync::Mutex<Option<String>>),
}

/// Persistence for the single bearer token.
///
/// Every operation takes the same async lock, so a `set` followed by a `get`
/// in one flow always observes the new value. Nothing is cached in front of
/// the keychain or the local file. Storage errors are logged and degrade to
/// "no token" instead of reaching the caller.
pub struct CredentialStore {
    backend: Backend,
    lock: Mutex<()>,
}

impl CredentialStore {
    /// OS keychain backed store
    pub fn keyring() -> Self {
        Self::with_backend(Backend::Keyring)
    }

    /// File backed store under the given local store
    pub fn local(store: LocalStore) -> Self {
        Self::with_backend(Backend::Local(store))
    }

    /// Process-memory store; nothing is persisted
    pub fn in_memory() -> Self {
        Self::with_backend(Backend::Memory(std::sync::Mutex::new(None)))
    }

    fn with_backend(backend: Backend) -> Self {
        Self {
            backend,
            lock: Mutex::new(()),
        }
    }

    /// Pick a backend once at startup. `Auto` probes the keychain and falls
    /// back to the local file when it is unavailable.
    pub async fn select(preference: StorageBackend, local: LocalStore) -> Arc<Self> {
        let store = match preference {
            StorageBackend::Keyring => Self::keyring(),
            StorageBackend::Local => Self::local(local),
            StorageBackend::Memory => Self::in_memory(),
            StorageBackend::Auto => {
                if keyring_available().await {
                    Self::keyring()
                } else {
                    Self::local(local)
                }
            }
        };
        info!(backend = store.backend_name(), "Credential store selected");
        Arc::new(store)
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Keyring => "keyring",
            Backend::Local(_) => "local",
            Backend::Memory(_) => "memory",
        }
    }

    /// Read the stored token, `None` when absent or unreadable.
    pub async fn get(&self) -> Option<String> {
        let _guard = self.lock.lock().await;
        match self.read().await {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(backend = self.backend_name(), error = %e, "Failed to read token");
                None
            }
        }
    }

    /// Persist a token. Returns whether it was stored; an empty token is
    /// never stored and clears any previous one instead.
    pub async fn set(&self, token: &str) -> bool {
        if token.is_empty() {
            self.clear().await;
            return false;
        }

        let _guard = self.lock.lock().await;
        match self.write(token).await {
            Ok(()) => {
                debug!(backend = self.backend_name(), "Token stored");
                true
            }
            Err(e) => {
                warn!(backend = self.backend_name(), error = %e, "Failed to store token");
                false
            }
        }
    }

    /// Remove the stored token. Clearing an empty store is a no-op.
    pub async fn clear(&self) {
        let _guard = self.lock.lock().await;
        match self.remove().await {
            Ok(()) => debug!(backend = self.backend_name(), "Token cleared"),
            Err(e) => {
                warn!(backend = self.backend_name(), error = %e, "Failed to clear token")
            }
        }
    }

    /// Remove the stored token only while it is still `expected`.
    ///
    /// Returns true when `expected` was the stored token (or the store could
    /// not be read), false when it has since been replaced or cleared.
    pub async fn clear_if(&self, expected: &str) -> bool {
        let _guard = self.lock.lock().await;
        match self.read().await {
            Ok(Some(current)) if current == expected => {}
            Ok(_) => {
                debug!(backend = self.backend_name(), "Stored token changed, keeping it");
                return false;
            }
            Err(e) => {
                warn!(backend = self.backend_name(), error = %e, "Failed to read token");
            }
        }

        match self.remove().await {
            Ok(()) => debug!(backend = self.backend_name(), "Token cleared"),
            Err(e) => {
                warn!(backend = self.backend_name(), error = %e, "Failed to clear token")
            }
        }
        true
    }

    async fn read(&self) -> Result<Option<String>, StorageError> {
        match &self.backend {
            Backend::Keyring => {
                tokio::task::spawn_blocking(|| -> Result<Option<String>, StorageError> {
                    match token_entry()?.get_password() {
                        Ok(token) => Ok(Some(token)),
                        Err(keyring::Error::NoEntry) => Ok(None),
                        Err(e) => Err(StorageError::from(e)),
                    }
                })
                .await?
            }
            Backend::Local(store) => Ok(store.load::<String>(TOKEN_KEY).await?.map(|s| s.value)),
            Backend::Memory(slot) => {
                let token = lock_slot(slot).clone();
                Ok(token)
            }
        }
    }

    async fn write(&self, token: &str) -> Result<(), StorageError> {
        match &self.backend {
            Backend::Keyring => {
                let token = token.to_string();
                tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
                    token_entry()?.set_password(&token)?;
                    Ok(())
                })
                .await?
            }
            Backend::Local(store) => store.save(TOKEN_KEY, &token).await,
            Backend::Memory(slot) => {
                *lock_slot(slot) = Some(token.to_string());
                Ok(())
            }
        }
    }

    async fn remove(&self) -> Result<(), StorageError> {
        match &self.backend {
            Backend::Keyring => {
                tokio::task::spawn_blocking(|| -> Result<(), StorageError> {
                    match token_entry()?.delete_credential() {
                        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                        Err(e) => Err(StorageError::from(e)),
                    }
                })
                .await?
            }
            Backend::Local(store) => store.remove(TOKEN_KEY).await,
            Backend::Memory(slot) => {
                *lock_slot(slot) = None;
                Ok(())
            }
        }
    }
}

fn token_entry() -> Result<Entry, StorageError> {
    Ok(Entry::new(SERVICE_NAME, TOKEN_KEY)?)
}

fn lock_slot(slot: &std::sync::Mutex<Option<String>>) -> std::sync::MutexGuard<'_, Option<String>> {
    // The slot holds a plain value; a poisoned lock still has usable data.
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The keychain is usable when a read either finds the entry or reports that
/// there is none.
async fn keyring_available() -> bool {
    let probe = tokio::task::spawn_blocking(|| {
        token_entry().and_then(|entry| match entry.get_password() {
            Ok(_) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StorageError::from(e)),
        })
    })
    .await;

    match probe {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!(error = %e, "Keychain unavailable, using local storage");
            false
        }
        Err(e) => {
            debug!(error = %e, "Keychain probe failed, using local storage");
            false
        }
    }
}

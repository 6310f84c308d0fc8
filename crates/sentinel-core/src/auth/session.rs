use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::api::{ApiClient, ApiError, RequestFailure};

use super::CredentialStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Startup, before the stored token has been checked
    Loading,
    Authenticated,
    Unauthenticated,
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Loading => "loading",
            SessionState::Authenticated => "authenticated",
            SessionState::Unauthenticated => "unauthenticated",
        }
    }
}

/// Shared view of the session state.
///
/// The `SessionManager` drives every transition. The API client holds a clone
/// so a rejected token can revoke the session immediately; everything else
/// only reads or subscribes.
#[derive(Debug, Clone)]
pub struct SessionSignal {
    tx: Arc<watch::Sender<SessionState>>,
}

impl Default for SessionSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::Loading);
        Self { tx: Arc::new(tx) }
    }

    pub fn state(&self) -> SessionState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    fn set(&self, state: SessionState) {
        let previous = self.tx.send_replace(state);
        if previous != state {
            info!(from = previous.label(), to = state.label(), "Session state changed");
        }
    }

    /// Force the session to unauthenticated after the backend rejected the token.
    pub(crate) fn revoke(&self) {
        self.set(SessionState::Unauthenticated);
    }
}

#[derive(Error, Debug)]
pub enum LoginError {
    #[error("Fill in both your username and password")]
    MissingCredentials,

    #[error("A login is already in progress")]
    InProgress,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Login request failed: {0}")]
    Request(#[source] ApiError),

    #[error("Could not save the session token")]
    Storage,
}

impl LoginError {
    /// Message suitable for showing next to the login form
    pub fn user_message(&self) -> String {
        match self {
            LoginError::Request(ApiError::RequestFailed(RequestFailure::Network(e)))
                if e.is_timeout() =>
            {
                "Connection timed out. Please try again.".to_string()
            }
            LoginError::Request(ApiError::RequestFailed(RequestFailure::Network(_))) => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            LoginError::Request(_) => "Something went wrong with logging in".to_string(),
            other => other.to_string(),
        }
    }
}

/// Owns the authentication state and drives login, logout and startup
/// validation.
pub struct SessionManager {
    api: ApiClient,
    store: Arc<CredentialStore>,
    signal: SessionSignal,
    validate_on_restore: bool,
    login_lock: Mutex<()>,
}

impl SessionManager {
    /// Build a manager over the API client's credential store and session
    /// signal, so a 401 seen by the client revokes this session.
    pub fn new(api: ApiClient) -> Self {
        let store = Arc::clone(api.credential_store());
        let signal = api.session_signal().clone();
        Self {
            api,
            store,
            signal,
            validate_on_restore: true,
            login_lock: Mutex::new(()),
        }
    }

    /// Whether `restore` checks a stored token against `/auth/me`
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate_on_restore = validate;
        self
    }

    pub fn state(&self) -> SessionState {
        self.signal.state()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == SessionState::Authenticated
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.signal.subscribe()
    }

    pub fn signal(&self) -> &SessionSignal {
        &self.signal
    }

    /// Startup transition out of `Loading`.
    ///
    /// A 401 from validation clears the token. Any other validation failure
    /// keeps the session: a briefly unreachable backend should not log the
    /// user out.
    pub async fn restore(&self) -> SessionState {
        self.signal.set(SessionState::Loading);

        if self.store.get().await.is_none() {
            debug!("No stored token");
            self.signal.set(SessionState::Unauthenticated);
            return self.state();
        }

        if !self.validate_on_restore {
            self.signal.set(SessionState::Authenticated);
            return self.state();
        }

        let state = match self.api.fetch_profile().await {
            Ok(_) => {
                debug!("Stored token validated");
                SessionState::Authenticated
            }
            Err(ApiError::AuthRejected) | Err(ApiError::Unauthenticated) => {
                info!("Stored token is no longer valid");
                SessionState::Unauthenticated
            }
            Err(e) => {
                warn!(error = %e, "Could not validate stored token, keeping session");
                SessionState::Authenticated
            }
        };
        self.signal.set(state);
        state
    }

    /// Exchange credentials for a token and persist it.
    ///
    /// The state only changes on success, after the token is stored. A second
    /// call while one is in flight fails with `LoginError::InProgress`.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), LoginError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(LoginError::MissingCredentials);
        }

        let _guard = self.login_lock.try_lock().map_err(|_| LoginError::InProgress)?;

        let response = match self.api.login(username.trim(), password).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Login failed");
                return Err(match e {
                    ApiError::AuthRejected => LoginError::InvalidCredentials,
                    ApiError::RequestFailed(RequestFailure::Status { status, .. })
                        if (400..500).contains(&status) =>
                    {
                        LoginError::InvalidCredentials
                    }
                    other => LoginError::Request(other),
                });
            }
        };

        let Some(token) = response.token() else {
            warn!(status = ?response.status, "Login response carried no token");
            return Err(LoginError::InvalidCredentials);
        };

        if !self.store.set(token).await {
            return Err(LoginError::Storage);
        }

        self.signal.set(SessionState::Authenticated);
        info!("Login successful");
        Ok(())
    }

    /// Clear the token and end the session. Needs no backend call and is safe
    /// to repeat.
    pub async fn logout(&self) {
        self.store.clear().await;
        self.signal.set(SessionState::Unauthenticated);
    }

    /// Re-read the store. A missing token forces `Unauthenticated`; a present
    /// one leaves the state as it is.
    pub async fn check(&self) -> SessionState {
        if self.store.get().await.is_none() {
            self.signal.set(SessionState::Unauthenticated);
        }
        self.state()
    }
}

//! Authentication module for managing the bearer token and session state.
//!
//! This module provides:
//! - `CredentialStore`: persistence of the single bearer token in the OS
//!   keychain, a local file, or memory
//! - `SessionManager`: the loading/authenticated/unauthenticated state machine
//! - `PasswordRecovery`: forgot/reset password flows
//!
//! The token is persisted before a session is reported as authenticated, and
//! a cleared token always leads back to unauthenticated.

pub mod credentials;
pub mod recovery;
pub mod session;

pub use credentials::CredentialStore;
pub use recovery::{PasswordRecovery, RecoveryError};
pub use session::{LoginError, SessionManager, SessionSignal, SessionState};

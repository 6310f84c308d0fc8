//! Forgot/reset password flows.
//!
//! Both calls are unauthenticated. Form validation happens locally so an
//! incomplete form never reaches the backend.

use thiserror::Error;
use tracing::{error, info};

use crate::api::{ApiClient, ApiError, RequestFailure};

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("Please fill out all fields.")]
    MissingFields,

    #[error("Invalid or missing reset token.")]
    MissingResetToken,

    #[error("Passwords do not match.")]
    PasswordMismatch,

    #[error("{0}")]
    Rejected(String),

    #[error("Password reset request failed: {0}")]
    Request(#[source] ApiError),
}

pub struct PasswordRecovery {
    api: ApiClient,
}

impl PasswordRecovery {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Ask the backend to email reset instructions.
    pub async fn request_reset(&self, email: &str) -> Result<(), RecoveryError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(RecoveryError::MissingFields);
        }

        self.api.request_password_reset(email).await.map_err(|e| {
            error!(error = %e, "Password reset request failed");
            RecoveryError::Request(e)
        })?;
        info!("Password reset requested");
        Ok(())
    }

    /// Set a new password using the token from the reset email.
    pub async fn reset(
        &self,
        token: Option<&str>,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<(), RecoveryError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(RecoveryError::MissingResetToken)?;
        if new_password.is_empty() || confirm_password.is_empty() {
            return Err(RecoveryError::MissingFields);
        }
        if new_password != confirm_password {
            return Err(RecoveryError::PasswordMismatch);
        }

        match self.api.reset_password(token, new_password).await {
            Ok(()) => {
                info!("Password reset");
                Ok(())
            }
            Err(ApiError::RequestFailed(RequestFailure::Status { body, .. })) if !body.is_empty() => {
                Err(RecoveryError::Rejected(body))
            }
            Err(ApiError::AuthRejected) => {
                Err(RecoveryError::Rejected("Password reset failed".to_string()))
            }
            Err(e) => {
                error!(error = %e, "Password reset failed");
                Err(RecoveryError::Request(e))
            }
        }
    }
}

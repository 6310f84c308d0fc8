use thiserror::Error;

/// Errors from the Sentinel backend client.
///
/// `AuthRejected` is kept apart from `RequestFailed` so callers can choose
/// between sending the user back to login and quietly showing fallback data.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not logged in")]
    Unauthenticated,

    #[error("Authentication failed - token rejected by the server")]
    AuthRejected,

    #[error("Request failed: {0}")]
    RequestFailed(#[from] RequestFailure),

    #[error("Invalid date range: start must be before end")]
    InvalidDateRange,

    #[error("Device id must not be blank")]
    MissingDeviceId,
}

#[derive(Error, Debug)]
pub enum RequestFailure {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            401 => ApiError::AuthRejected,
            code => RequestFailure::Status {
                status: code,
                body: Self::truncate_body(body),
            }
            .into(),
        }
    }

    pub(crate) fn invalid_response(message: impl Into<String>) -> Self {
        RequestFailure::InvalidResponse(message.into()).into()
    }

    pub fn is_auth_rejected(&self) -> bool {
        matches!(self, ApiError::AuthRejected)
    }

    pub fn is_request_failure(&self) -> bool {
        matches!(self, ApiError::RequestFailed(_))
    }

    /// HTTP status of a failed request, when the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::AuthRejected => Some(401),
            ApiError::RequestFailed(RequestFailure::Status { status, .. }) => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        RequestFailure::Network(e).into()
    }
}

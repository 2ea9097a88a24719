//! Error Types

use thiserror::Error;

/// Result type alias for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;

/// Backend error types
#[derive(Error, Debug)]
pub enum BackendError {
    /// Request failed validation before being forwarded
    #[error("{0}")]
    Validation(String),

    /// No base URL configured for the service
    #[error("Backend not configured: {0}")]
    NotConfigured(String),

    /// Transport failure talking to the backend
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend could not be reached
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Backend answered with a non-2xx status
    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Backend body was not what we expected
    #[error("Invalid response from backend: {0}")]
    InvalidResponse(String),

    /// Backend answered `success: false`
    #[error("{0}")]
    Rejected(String),
}

impl BackendError {
    /// Whether the caller is at fault (maps to a 400)
    pub fn is_client_error(&self) -> bool {
        matches!(self, BackendError::Validation(_))
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::InvalidResponse(err.to_string())
    }
}

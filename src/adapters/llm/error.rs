//! Error types for the Anthropic client.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when calling the provider API.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Invalid request - malformed request body or parameters (400)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid API key - authentication failed (401)
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Forbidden - valid API key but insufficient permissions (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Resource not found")]
    NotFound,

    /// Rate limit exceeded - too many requests (429)
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Server error - transient server-side error (500, 502, 503, 504, 529)
    #[error("Server error ({0}): {1}")]
    ServerError(StatusCode, String),

    /// Network error - connection failed, timeout, etc.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Unknown error - unexpected status code
    #[error("Unknown error ({0}): {1}")]
    UnknownError(StatusCode, String),
}

impl ProviderError {
    /// Create an error from HTTP status code and response body.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status.as_u16() {
            400 => Self::InvalidRequest(body),
            401 => Self::InvalidApiKey,
            403 => Self::Forbidden(body),
            404 => Self::NotFound,
            429 => Self::RateLimitExceeded,
            500 | 502 | 503 | 504 | 529 => Self::ServerError(status, body),
            _ => Self::UnknownError(status, body),
        }
    }

    /// Check if the error is transient and should be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimitExceeded | Self::ServerError(_, _) | Self::NetworkError(_)
        )
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        Self::NetworkError(err.to_string())
    }
}

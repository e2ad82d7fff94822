//! Error types for hitl-backend

use thiserror::Error;

/// Result type alias using hitl-backend Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the agent backend
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed before a response was received
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Backend answered with a non-success status
    #[error("Backend request failed: {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not have the expected shape
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a status error from a code and response body
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Whether the failure happened before the backend could act on the request.
    ///
    /// A run that fails with a status or shape error may already have advanced
    /// the backend session, so only connection-level failures qualify. The
    /// gateway never retries on its own; this is advice for callers.
    pub fn is_connectivity(&self) -> bool {
        match self {
            Error::Http(e) => e.is_connect() || e.is_timeout(),
            Error::Status { status, .. } => *status == 502 || *status == 503 || *status == 504,
            _ => false,
        }
    }
}

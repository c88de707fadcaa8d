//! Client error types

use reqwest::StatusCode;
use thiserror::Error;

/// Errors returned by SPAN RPC clients
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service-level error response
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from the response body
        message: String,
    },
}

impl ClientError {
    /// Whether this failure is an availability problem rather than a
    /// rejection: the peer was unreachable, timed out, or answered 503.
    ///
    /// Unavailable failures drive the retry-on-reconnect paths; anything
    /// else is treated as permanent.
    pub fn is_unavailable(&self) -> bool {
        match self {
            ClientError::Http(e) => e.is_connect() || e.is_timeout(),
            ClientError::Api { status, .. } => {
                *status == StatusCode::SERVICE_UNAVAILABLE.as_u16()
            }
        }
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

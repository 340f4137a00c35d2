/*
[INPUT]:  Error sources (network, API, serialization, session, WebSocket, storage)
[OUTPUT]: Structured error types with context and retry hints
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use reqwest::StatusCode;
use thiserror::Error;

/// Main error type for the trading view adapter
#[derive(Error, Debug)]
pub enum SyncError {
    /// No connectivity, DNS failure, timeout or reset while talking to the backend
    #[error("network: {0}")]
    Network(#[from] reqwest::Error),

    /// API returned a non-2xx response
    #[error("API error (code {code}): {message}")]
    Api { code: u16, message: String },

    /// Credential was rejected and could not be refreshed
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// Refresh was attempted and failed; the session has been cleared
    #[error("Session expired, please log in again")]
    SessionExpired,

    /// Caller supplied parameters the backend would reject
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Durable session storage failed
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Invalid response from server
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Network(_) | SyncError::WebSocket(_) | SyncError::InvalidResponse(_)
        ) || matches!(self, SyncError::Api { code, .. } if *code >= 500 || *code == 429)
    }

    /// Check if error indicates authentication failure
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            SyncError::Unauthorized { .. } | SyncError::SessionExpired
        )
    }

    /// Check if the failure was caused by missing connectivity
    pub fn is_network(&self) -> bool {
        matches!(self, SyncError::Network(_))
    }

    /// Create an API error from status code and message
    pub fn api_error(status: StatusCode, message: impl Into<String>) -> Self {
        if status == StatusCode::UNAUTHORIZED {
            return SyncError::Unauthorized {
                message: message.into(),
            };
        }
        SyncError::Api {
            code: status.as_u16(),
            message: message.into(),
        }
    }
}

/// Result type alias for adapter operations
pub type Result<T> = std::result::Result<T, SyncError>;

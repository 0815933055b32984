//! Error types for a3s-cron-relay

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors that can occur while validating, relaying, or consuming a stream
#[derive(Debug, Error)]
pub enum RelayError {
    /// Caller input failed validation; no upstream call was made
    #[error("Invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// The upstream provider could not be reached
    #[error("Failed to connect to upstream: {0}")]
    UpstreamConnect(#[source] reqwest::Error),

    /// The upstream provider answered with a non-success status
    #[error("Upstream returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    /// The stream broke after data had started flowing
    #[error("Stream aborted: {0}")]
    StreamAborted(String),

    /// The relay server refused a client request
    #[error("Relay rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The relay server could not be reached
    #[error("Failed to connect to relay server: {0}")]
    RelayUnreachable(#[source] reqwest::Error),

    /// The session was cancelled or superseded by a newer one
    #[error("Session cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;

impl RelayError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// HTTP status used when this error is returned from a handler.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::Validation { .. } => StatusCode::BAD_REQUEST,
            RelayError::UpstreamConnect(_) | RelayError::UpstreamStatus { .. } => {
                StatusCode::BAD_GATEWAY
            }
            RelayError::StreamAborted(_) => StatusCode::BAD_GATEWAY,
            RelayError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            RelayError::Validation { field, message } => serde_json::json!({
                "error": {
                    "type": "validation",
                    "field": field,
                    "message": message,
                }
            }),
            RelayError::UpstreamConnect(_) | RelayError::UpstreamStatus { .. } => {
                serde_json::json!({
                    "error": {
                        "type": "upstream",
                        "message": self.to_string(),
                    }
                })
            }
            _ => serde_json::json!({
                "error": {
                    "type": "server",
                    "message": self.to_string(),
                }
            }),
        };

        (status, axum::Json(body)).into_response()
    }
}

//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use repo_relay_core::DispatchError;

/// Webhook handler errors with HTTP status code mapping
///
/// The webhook sender does not act on the response, so only the status code
/// is returned; the detail goes to the log and the operator alert channel.
///
/// - `400 Bad Request`: missing event header or undecodable payload
/// - `503 Service Unavailable`: subscription store or chat system unreachable
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    /// None of the Gitea, Gogs or GitHub event headers was present.
    #[error("Missing event type header")]
    MissingEventHeader,

    #[error("Webhook dropped: {0}")]
    Dispatch(#[from] DispatchError),
}

impl WebhookHandlerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingEventHeader | Self::Dispatch(DispatchError::Event(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Dispatch(DispatchError::SubscriptionStore(_))
            | Self::Dispatch(DispatchError::Redirect(_)) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        self.status_code().into_response()
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

//! API error type and its JSON rendering.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::whatsapp::WhatsAppError;

/// Error text for a send request lacking phone or message.
pub const MISSING_FIELDS: &str = "Phone and message are required";

/// Error text when the session is not ready.
pub const NOT_CONNECTED: &str = "WhatsApp not connected";

/// Errors surfaced by the HTTP API.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Missing or wrong shared secret.
    #[error("Unauthorized")]
    Unauthorized,

    /// The request is malformed or incomplete.
    #[error("{0}")]
    Validation(String),

    /// The session is not `Ready`.
    #[error("{NOT_CONNECTED}")]
    NotConnected,

    /// The transport failed to deliver.
    #[error("Failed to send message: {0}")]
    Transport(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable error.
    pub error: String,
}

impl GatewayError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Validation(_) | Self::NotConnected => StatusCode::BAD_REQUEST,
            Self::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<WhatsAppError> for GatewayError {
    fn from(err: WhatsAppError) -> Self {
        match err {
            WhatsAppError::NotConnected => Self::NotConnected,
            WhatsAppError::InvalidPhone(_) => Self::Validation(err.to_string()),
            other => Self::Transport(other.to_string()),
        }
    }
}

//! Route handlers.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::auth::RequireApiKey;
use super::error::{GatewayError, MISSING_FIELDS};
use super::GatewayState;
use crate::heartbeat::daily_report::{RunOutcome, Trigger};
use crate::whatsapp::state::StatusSnapshot;

/// Body of `POST /api/whatsapp/send`.
#[derive(Debug, Default, Deserialize)]
pub struct SendRequest {
    /// Destination phone in any human format.
    #[serde(default)]
    pub phone: Option<String>,
    /// Message text.
    #[serde(default)]
    pub message: Option<String>,
}

/// Generic success body.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    /// Always `true`.
    pub success: bool,
    /// What happened.
    pub message: String,
}

impl SuccessResponse {
    fn new(message: &str) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.to_owned(),
        })
    }
}

/// Liveness probe body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `ok`.
    pub status: &'static str,
}

/// `GET /health`, unauthenticated.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// `GET /api/whatsapp/status`.
pub async fn status(
    _auth: RequireApiKey,
    State(state): State<GatewayState>,
) -> Json<StatusSnapshot> {
    Json(state.manager.status())
}

/// `POST /api/whatsapp/restart`. Returns once the old session is torn down;
/// reconnection continues in the background.
pub async fn restart(
    _auth: RequireApiKey,
    State(state): State<GatewayState>,
) -> Json<SuccessResponse> {
    info!("restart requested via API");
    state.manager.restart().await;
    SuccessResponse::new("WhatsApp session restarting")
}

/// `POST /api/whatsapp/send`.
pub async fn send(
    _auth: RequireApiKey,
    State(state): State<GatewayState>,
    body: Bytes,
) -> Result<Json<SuccessResponse>, GatewayError> {
    let request = parse_send_request(&body)?;

    let (Some(phone), Some(message)) = (non_empty(request.phone), non_empty(request.message))
    else {
        return Err(GatewayError::Validation(MISSING_FIELDS.to_owned()));
    };

    if !state.manager.is_connected() {
        return Err(GatewayError::NotConnected);
    }

    state.manager.send(&phone, &message).await?;
    Ok(SuccessResponse::new("Message sent"))
}

/// `POST /api/whatsapp/report`: run the daily report now.
pub async fn report(_auth: RequireApiKey, State(state): State<GatewayState>) -> Json<RunOutcome> {
    info!("daily report requested via API");
    Json(state.report.run(Trigger::Manual).await)
}

/// An empty or blank body means no fields were sent.
fn parse_send_request(body: &[u8]) -> Result<SendRequest, GatewayError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(SendRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| GatewayError::Validation(format!("Invalid JSON body: {e}")))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

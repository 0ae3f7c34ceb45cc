//! Shared-secret authentication.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::warn;

use super::error::GatewayError;
use super::GatewayState;

/// Header carrying the shared secret.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Extractor that requires a matching `x-api-key` header.
///
/// The key is compared verbatim. Without a configured key every request is
/// rejected.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected(_auth: RequireApiKey) -> &'static str {
///     "ok"
/// }
/// ```
pub struct RequireApiKey;

impl FromRequestParts<GatewayState> for RequireApiKey {
    type Rejection = GatewayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &GatewayState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.api_key.as_deref().filter(|key| !key.is_empty()) else {
            warn!(path = %parts.uri.path(), "API key not configured, rejecting request");
            return Err(GatewayError::Unauthorized);
        };

        let provided = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok());

        if provided == Some(expected) {
            Ok(Self)
        } else {
            warn!(path = %parts.uri.path(), "rejected request with missing or invalid API key");
            Err(GatewayError::Unauthorized)
        }
    }
}

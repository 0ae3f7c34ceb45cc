//! Render pairing QR payloads as data-URI images for the dashboard.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use qrcode::render::svg;
use qrcode::QrCode;

use super::WhatsAppError;

/// Minimum rendered edge length in pixels.
const MIN_DIMENSION: u32 = 256;

/// Render a QR payload as an `image/svg+xml` data URI.
///
/// # Errors
///
/// Returns [`WhatsAppError::QrRender`] if the payload does not fit in a QR code.
pub fn render_data_uri(payload: &str) -> Result<String, WhatsAppError> {
    let code =
        QrCode::new(payload.as_bytes()).map_err(|e| WhatsAppError::QrRender(e.to_string()))?;
    let image = code
        .render::<svg::Color<'_>>()
        .min_dimensions(MIN_DIMENSION, MIN_DIMENSION)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build();
    Ok(format!(
        "data:image/svg+xml;base64,{}",
        STANDARD.encode(image.as_bytes())
    ))
}

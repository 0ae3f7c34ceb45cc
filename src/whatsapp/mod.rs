//! WhatsApp session: bridge client, event listener, session lifecycle and sidecar setup.
//!
//! The network protocol itself lives in a WhatsApp Web bridge sidecar reached
//! over HTTP. [`connection::ConnectionManager`] owns the single client instance
//! and is the only component allowed to mutate session state.

pub mod client;
pub mod connection;
pub mod events;
pub mod phone;
pub mod qr;
pub mod session_store;
pub mod setup;
pub mod state;

/// Errors from the WhatsApp session layer.
#[derive(Debug, thiserror::Error)]
pub enum WhatsAppError {
    /// HTTP request to the bridge failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The session is not in the `Ready` state.
    #[error("not connected to WhatsApp")]
    NotConnected,

    /// The phone number contains no digits.
    #[error("invalid phone number: {0:?}")]
    InvalidPhone(String),

    /// The bridge answered with a non-success status or error envelope.
    #[error("bridge rejected request ({status}): {message}")]
    Bridge {
        /// HTTP status returned by the bridge.
        status: u16,
        /// Error text reported by the bridge.
        message: String,
    },

    /// A bridge operation did not finish within its deadline.
    #[error("{operation} timed out after {secs}s")]
    Timeout {
        /// Operation that timed out.
        operation: &'static str,
        /// Deadline in seconds.
        secs: u64,
    },

    /// The QR payload could not be rendered as an image.
    #[error("failed to render QR code: {0}")]
    QrRender(String),

    /// Removing persisted session data failed.
    #[error("session store error: {0}")]
    SessionStore(#[from] std::io::Error),

    /// Container setup or lifecycle operation failed.
    #[error("setup failed: {0}")]
    SetupFailed(String),
}

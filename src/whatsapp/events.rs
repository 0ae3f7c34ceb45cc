//! Event listener for bridge lifecycle events.
//!
//! Connects to the bridge's `/events/poll` HTTP long-polling endpoint and
//! forwards lifecycle events to the connection manager via an mpsc channel.

use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::client::ClientEvent;

/// An event as serialized by the bridge.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum BridgeEvent {
    /// A pairing code was generated.
    #[serde(rename = "qr")]
    Qr {
        /// QR payload string.
        qr: String,
    },
    /// The session is authenticated and ready.
    #[serde(rename = "ready")]
    Ready,
    /// WhatsApp connection lost.
    #[serde(rename = "disconnected")]
    Disconnected {
        /// Human-readable reason, if available.
        #[serde(default)]
        reason: Option<String>,
    },
    /// Anything else the bridge emits (messages, acks, loading progress).
    #[serde(other)]
    Other,
}

impl BridgeEvent {
    /// Map to a lifecycle event, dropping events the gateway does not track.
    pub fn into_client_event(self) -> Option<ClientEvent> {
        match self {
            Self::Qr { qr } => Some(ClientEvent::Qr(qr)),
            Self::Ready => Some(ClientEvent::Ready),
            Self::Disconnected { reason } => Some(ClientEvent::Disconnected { reason }),
            Self::Other => None,
        }
    }
}

/// Long-poll timeout for the HTTP client (seconds).
const POLL_TIMEOUT_SECS: u64 = 60;

/// Initial reconnect backoff (milliseconds).
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Maximum reconnect backoff (milliseconds).
const MAX_BACKOFF_MS: u64 = 30_000;

/// Spawn an event listener that forwards events to the given channel.
///
/// Returns immediately. The listener runs as a background Tokio task,
/// reconnects with exponential backoff on network errors, and exits once the
/// receiving side of `event_tx` is dropped.
pub fn spawn_event_listener(
    base_url: String,
    event_tx: mpsc::Sender<ClientEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let poll_url = format!("{base_url}/events/poll");
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            info!(url = %poll_url, "connecting to bridge event stream");

            match poll_events(&poll_url, &event_tx).await {
                Ok(()) => {
                    info!("bridge event stream closed");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, backoff_ms, "bridge event stream error, reconnecting");
                    tokio::time::sleep(std::time::Duration::from_millis(backoff_ms)).await;
                    backoff_ms = backoff_ms.saturating_mul(2).min(MAX_BACKOFF_MS);
                }
            }
        }
    })
}

/// Poll the bridge for events in a loop. Returns `Err` on non-timeout
/// network errors so the caller can reconnect with backoff.
async fn poll_events(
    poll_url: &str,
    event_tx: &mpsc::Sender<ClientEvent>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(POLL_TIMEOUT_SECS))
        .build()?;

    loop {
        if event_tx.is_closed() {
            return Ok(());
        }
        match client.get(poll_url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let events = resp.json::<Vec<BridgeEvent>>().await?;
                for event in events.into_iter().filter_map(BridgeEvent::into_client_event) {
                    debug!(?event, "received bridge event");
                    if event_tx.send(event).await.is_err() {
                        return Ok(());
                    }
                }
            }
            Ok(resp) => {
                debug!(status = %resp.status(), "event poll returned non-200");
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            }
            Err(e) if e.is_timeout() => {
                // Long-poll window expired with nothing to report.
                continue;
            }
            Err(e) => {
                return Err(e.into());
            }
        }
    }
}

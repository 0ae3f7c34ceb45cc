//! Messaging client capability and its HTTP bridge implementation.
//!
//! [`MessagingClient`] is the seam between session lifecycle and the network.
//! [`BridgeClient`] implements it against a WhatsApp Web bridge sidecar that
//! speaks a small JSON-over-HTTP protocol.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::events;
use super::WhatsAppError;

/// Default port the bridge listens on.
pub const DEFAULT_BRIDGE_PORT: u16 = 3002;

/// HTTP connect timeout for the reqwest client.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// HTTP request timeout for normal operations.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Number of health-check retries before giving up.
const HEALTH_CHECK_RETRIES: u32 = 10;

/// Delay between health-check attempts in milliseconds.
const HEALTH_CHECK_DELAY_MS: u64 = 2000;

/// Lifecycle events emitted by a messaging client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A pairing code is ready to be scanned.
    Qr(String),
    /// The session authenticated.
    Ready,
    /// The connection dropped.
    Disconnected {
        /// Reason, if the client knows one.
        reason: Option<String>,
    },
}

/// Connection to the chat network for one session.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Start connecting. Lifecycle events are delivered on `events` until the
    /// client is destroyed.
    async fn initialize(&self, events: mpsc::Sender<ClientEvent>) -> Result<(), WhatsAppError>;

    /// Send a text message to a chat identifier.
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), WhatsAppError>;

    /// Tear the client down. No events are delivered afterwards.
    async fn destroy(&self) -> Result<(), WhatsAppError>;
}

/// Creates a fresh client for every (re)initialization.
pub trait MessagingClientFactory: Send + Sync {
    /// Build a new, uninitialized client.
    fn create(&self) -> Arc<dyn MessagingClient>;
}

/// Client for the WhatsApp Web HTTP bridge.
pub struct BridgeClient {
    client: reqwest::Client,
    base_url: String,
    listener: Mutex<Option<JoinHandle<()>>>,
}

/// Response envelope from the bridge HTTP API.
#[derive(Deserialize)]
struct BridgeResponse {
    success: Option<bool>,
    error: Option<String>,
}

impl BridgeClient {
    /// Create a new client pointing at the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to build HTTP client with timeouts, using default");
                reqwest::Client::default()
            });
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            listener: Mutex::new(None),
        }
    }

    /// Create a client connecting to `http://127.0.0.1:{port}`.
    pub fn with_port(port: u16) -> Self {
        Self::new(format!("http://127.0.0.1:{port}"))
    }

    /// Returns the base URL of the bridge.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check whether the bridge process answers its health endpoint.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        matches!(self.client.get(&url).send().await, Ok(resp) if resp.status().is_success())
    }

    /// Wait for the bridge to become healthy, retrying with a fixed delay.
    ///
    /// # Errors
    ///
    /// Returns [`WhatsAppError::SetupFailed`] if the bridge never answers.
    pub async fn wait_healthy(&self) -> Result<(), WhatsAppError> {
        for attempt in 0..HEALTH_CHECK_RETRIES {
            if self.health_check().await {
                return Ok(());
            }
            if attempt < HEALTH_CHECK_RETRIES.saturating_sub(1) {
                tokio::time::sleep(Duration::from_millis(HEALTH_CHECK_DELAY_MS)).await;
            }
        }
        Err(WhatsAppError::SetupFailed(format!(
            "bridge at {} did not become healthy",
            self.base_url
        )))
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<(), WhatsAppError> {
        let url = format!("{}{path}", self.base_url);
        let resp = self.client.post(&url).json(&body).send().await?;
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        let envelope = serde_json::from_str::<BridgeResponse>(&text).ok();

        if status.is_success() && envelope.as_ref().and_then(|e| e.success).unwrap_or(true) {
            return Ok(());
        }

        let message = envelope
            .and_then(|e| e.error)
            .unwrap_or_else(|| truncate(&text, 500));
        warn!(%status, path, "bridge request failed: {message}");
        Err(WhatsAppError::Bridge {
            status: status.as_u16(),
            message,
        })
    }

    fn replace_listener(&self, handle: Option<JoinHandle<()>>) {
        let mut slot = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = std::mem::replace(&mut *slot, handle) {
            old.abort();
        }
    }
}

#[async_trait]
impl MessagingClient for BridgeClient {
    async fn initialize(&self, events: mpsc::Sender<ClientEvent>) -> Result<(), WhatsAppError> {
        // Listen before starting so the first QR code is not missed.
        let handle = events::spawn_event_listener(self.base_url.clone(), events);
        self.replace_listener(Some(handle));
        self.post("/session/start", serde_json::json!({})).await?;
        debug!(base_url = %self.base_url, "bridge session start requested");
        Ok(())
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), WhatsAppError> {
        self.post(
            "/send",
            serde_json::json!({ "chatId": chat_id, "text": text }),
        )
        .await?;
        debug!(chat_id, "message sent via bridge");
        Ok(())
    }

    async fn destroy(&self) -> Result<(), WhatsAppError> {
        self.replace_listener(None);
        self.post("/session/destroy", serde_json::json!({})).await
    }
}

impl Drop for BridgeClient {
    fn drop(&mut self) {
        self.replace_listener(None);
    }
}

/// Factory producing [`BridgeClient`]s for a fixed bridge URL.
#[derive(Debug, Clone)]
pub struct BridgeClientFactory {
    base_url: String,
}

impl BridgeClientFactory {
    /// Create a factory for the bridge at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl MessagingClientFactory for BridgeClientFactory {
    fn create(&self) -> Arc<dyn MessagingClient> {
        Arc::new(BridgeClient::new(self.base_url.clone()))
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_owned(),
    }
}

//! Session lifecycle: owns the single [`MessagingClient`] and its state.
//!
//! Every client instance gets a generation number. Events and delayed
//! re-initializations carry the generation they were created for and are
//! dropped once a newer client exists, so a torn-down client can never move
//! the session. Client creation and teardown are serialized by the
//! `lifecycle` lock; state reads and transitions use a short synchronous lock
//! that is never held across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::client::{ClientEvent, MessagingClient, MessagingClientFactory};
use super::session_store::SessionStore;
use super::state::{ConnectionState, LifecycleEvent, PendingQr, StatusSnapshot};
use super::{phone, qr, WhatsAppError};
use crate::config::WhatsAppConfig;

/// Buffered client events per client instance.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Timing knobs for the session lifecycle.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Pause between teardown and re-initialization on restart.
    pub restart_delay: Duration,
    /// Restart automatically if a pairing code stays unscanned this long.
    pub scan_timeout: Option<Duration>,
    /// Deadline for a single outbound send.
    pub send_timeout: Duration,
    /// Deadline for destroying a client.
    pub destroy_timeout: Duration,
    /// First reconnect delay after a disconnect.
    pub reconnect_initial: Duration,
    /// Upper bound for the reconnect delay.
    pub reconnect_max: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            restart_delay: Duration::from_secs(1),
            scan_timeout: Some(Duration::from_secs(300)),
            send_timeout: Duration::from_secs(30),
            destroy_timeout: Duration::from_secs(10),
            reconnect_initial: Duration::from_secs(1),
            reconnect_max: Duration::from_secs(30),
        }
    }
}

impl ConnectionSettings {
    /// Build settings from the `[whatsapp]` config section.
    pub fn from_config(config: &WhatsAppConfig) -> Self {
        Self {
            restart_delay: Duration::from_millis(config.restart_delay_ms),
            scan_timeout: (config.scan_timeout_secs > 0)
                .then(|| Duration::from_secs(config.scan_timeout_secs)),
            send_timeout: Duration::from_secs(config.send_timeout_secs),
            destroy_timeout: Duration::from_secs(config.destroy_timeout_secs),
            reconnect_initial: Duration::from_millis(config.reconnect_initial_ms),
            reconnect_max: Duration::from_millis(config.reconnect_max_ms),
        }
    }
}

struct Inner {
    state: ConnectionState,
    client: Option<Arc<dyn MessagingClient>>,
    generation: u64,
    backoff: Duration,
}

/// Owner of the WhatsApp session.
///
/// Callers only see behavior: [`status`](Self::status),
/// [`send`](Self::send) and [`restart`](Self::restart).
pub struct ConnectionManager {
    factory: Arc<dyn MessagingClientFactory>,
    store: SessionStore,
    settings: ConnectionSettings,
    inner: Mutex<Inner>,
    lifecycle: tokio::sync::Mutex<()>,
}

impl ConnectionManager {
    /// Create a manager in the `Initializing` state. Call [`start`](Self::start)
    /// to create the first client.
    pub fn new(
        factory: Arc<dyn MessagingClientFactory>,
        store: SessionStore,
        settings: ConnectionSettings,
    ) -> Arc<Self> {
        let backoff = settings.reconnect_initial;
        Arc::new(Self {
            factory,
            store,
            settings,
            inner: Mutex::new(Inner {
                state: ConnectionState::Initializing,
                client: None,
                generation: 0,
                backoff,
            }),
            lifecycle: tokio::sync::Mutex::new(()),
        })
    }

    /// Current status as reported over HTTP.
    pub fn status(&self) -> StatusSnapshot {
        self.lock().state.snapshot()
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.lock().state.clone()
    }

    /// Whether the session is `Ready`.
    pub fn is_connected(&self) -> bool {
        self.lock().state.is_ready()
    }

    /// Session credential storage.
    pub fn session_store(&self) -> &SessionStore {
        &self.store
    }

    /// Create and initialize the first client.
    pub async fn start(self: &Arc<Self>) {
        let _guard = self.lifecycle.lock().await;
        self.bring_up().await;
    }

    /// Tear down the client, wipe saved credentials and re-initialize after
    /// the configured delay.
    ///
    /// Safe in any state: a connected session is forced to re-pair and a
    /// pending pairing gets a fresh code. Returns once teardown and wipe are
    /// done; re-initialization happens in the background.
    pub async fn restart(self: &Arc<Self>) {
        let _guard = self.lifecycle.lock().await;

        self.transition(None, &LifecycleEvent::Reset);
        let (client, generation) = {
            let mut inner = self.lock();
            inner.generation = inner.generation.wrapping_add(1);
            inner.backoff = self.settings.reconnect_initial;
            (inner.client.take(), inner.generation)
        };

        if let Some(client) = client {
            self.teardown(client).await;
        }
        if let Err(e) = self.store.wipe().await {
            error!(error = %e, "failed to wipe session data, re-initializing anyway");
        }

        let weak = Arc::downgrade(self);
        let delay = self.settings.restart_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(manager) = weak.upgrade() {
                manager.reinitialize_after_reset(generation).await;
            }
        });
    }

    /// Send `text` to the chat derived from `phone_raw`.
    ///
    /// # Errors
    ///
    /// - [`WhatsAppError::NotConnected`] if the session is not `Ready`; the
    ///   transport is not touched.
    /// - [`WhatsAppError::InvalidPhone`] if the phone has no digits.
    /// - [`WhatsAppError::Timeout`] if the send exceeds its deadline.
    /// - Any transport error reported by the client.
    pub async fn send(&self, phone_raw: &str, text: &str) -> Result<(), WhatsAppError> {
        let client = {
            let inner = self.lock();
            if !inner.state.is_ready() {
                return Err(WhatsAppError::NotConnected);
            }
            inner.client.clone().ok_or(WhatsAppError::NotConnected)?
        };
        let chat_id = phone::to_chat_id(phone_raw)?;

        match tokio::time::timeout(
            self.settings.send_timeout,
            client.send_message(&chat_id, text),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(WhatsAppError::Timeout {
                    operation: "send",
                    secs: self.settings.send_timeout.as_secs(),
                })
            }
        }
        info!(%chat_id, "WhatsApp message sent");
        Ok(())
    }

    /// Destroy the client on process exit.
    pub async fn shutdown(&self) {
        let _guard = self.lifecycle.lock().await;
        let client = {
            let mut inner = self.lock();
            inner.generation = inner.generation.wrapping_add(1);
            inner.state = ConnectionState::Disconnected {
                reason: Some("shutdown".to_owned()),
            };
            inner.client.take()
        };
        if let Some(client) = client {
            self.teardown(client).await;
            info!("WhatsApp client shut down");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `event`. Events tagged with an old generation are ignored.
    fn transition(
        &self,
        generation: Option<u64>,
        event: &LifecycleEvent,
    ) -> Option<ConnectionState> {
        let mut inner = self.lock();
        if let Some(event_generation) = generation {
            if event_generation != inner.generation {
                debug!(
                    event_generation,
                    current = inner.generation,
                    "ignoring event from stale client"
                );
                return None;
            }
        }
        let next = inner.state.apply(event)?;
        info!(from = %inner.state, to = %next, "connection state changed");
        inner.state = next.clone();
        Some(next)
    }

    /// Replace the current client with a fresh one and initialize it.
    /// Caller holds the lifecycle lock.
    async fn bring_up(self: &Arc<Self>) {
        let previous = self.lock().client.take();
        if let Some(previous) = previous {
            self.teardown(previous).await;
        }

        let client = self.factory.create();
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let generation = {
            let mut inner = self.lock();
            inner.generation = inner.generation.wrapping_add(1);
            inner.client = Some(Arc::clone(&client));
            inner.generation
        };
        self.spawn_event_pump(generation, rx);

        info!(generation, "initializing WhatsApp client");
        if let Err(e) = client.initialize(tx).await {
            warn!(generation, error = %e, "WhatsApp client failed to initialize");
            self.handle_client_event(
                generation,
                ClientEvent::Disconnected {
                    reason: Some(e.to_string()),
                },
            );
        }
    }

    async fn teardown(&self, client: Arc<dyn MessagingClient>) {
        match tokio::time::timeout(self.settings.destroy_timeout, client.destroy()).await {
            Ok(Ok(())) => debug!("WhatsApp client destroyed"),
            Ok(Err(e)) => warn!(error = %e, "failed to destroy WhatsApp client, continuing"),
            Err(_) => warn!(
                timeout_secs = self.settings.destroy_timeout.as_secs(),
                "timed out destroying WhatsApp client, continuing"
            ),
        }
    }

    fn spawn_event_pump(self: &Arc<Self>, generation: u64, mut rx: mpsc::Receiver<ClientEvent>) {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let Some(manager) = weak.upgrade() else {
                    break;
                };
                if manager.lock().generation != generation {
                    break;
                }
                manager.handle_client_event(generation, event);
            }
            debug!(generation, "client event stream ended");
        });
    }

    fn handle_client_event(self: &Arc<Self>, generation: u64, event: ClientEvent) {
        let event = match event {
            ClientEvent::Qr(payload) => match qr::render_data_uri(&payload) {
                Ok(image) => LifecycleEvent::Qr(PendingQr {
                    payload,
                    image,
                    issued_at: Utc::now(),
                }),
                Err(e) => {
                    warn!(error = %e, "discarding pairing code that cannot be rendered");
                    return;
                }
            },
            ClientEvent::Ready => LifecycleEvent::Ready,
            ClientEvent::Disconnected { reason } => LifecycleEvent::Disconnected { reason },
        };

        match self.transition(Some(generation), &event) {
            Some(ConnectionState::AwaitingScan { qr, since }) => {
                // Only the first code of a pairing attempt starts the timer.
                if qr.issued_at == since {
                    self.schedule_scan_timeout(generation, since);
                }
            }
            Some(ConnectionState::Ready) => {
                self.lock().backoff = self.settings.reconnect_initial;
                info!(generation, "WhatsApp client ready");
            }
            Some(ConnectionState::Disconnected { reason }) => {
                warn!(generation, reason = ?reason, "WhatsApp client disconnected");
                self.schedule_reconnect(generation);
            }
            _ => {}
        }
    }

    fn schedule_reconnect(self: &Arc<Self>, generation: u64) {
        let delay = {
            let mut inner = self.lock();
            let delay = inner.backoff;
            inner.backoff = delay
                .saturating_mul(2)
                .min(self.settings.reconnect_max);
            delay
        };
        info!(
            generation,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "scheduling reconnect"
        );

        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(manager) = weak.upgrade() {
                manager.reconnect(generation).await;
            }
        });
    }

    async fn reconnect(self: &Arc<Self>, generation: u64) {
        let _guard = self.lifecycle.lock().await;
        let still_down = {
            let inner = self.lock();
            inner.generation == generation
                && matches!(inner.state, ConnectionState::Disconnected { .. })
        };
        if !still_down {
            debug!(generation, "reconnect superseded");
            return;
        }
        if self.transition(None, &LifecycleEvent::Reinitialize).is_some() {
            self.bring_up().await;
        }
    }

    async fn reinitialize_after_reset(self: &Arc<Self>, generation: u64) {
        let _guard = self.lifecycle.lock().await;
        let still_resetting = {
            let inner = self.lock();
            inner.generation == generation && inner.state == ConnectionState::Resetting
        };
        if !still_resetting {
            debug!(generation, "re-initialization superseded by a newer restart");
            return;
        }
        if self.transition(None, &LifecycleEvent::Reinitialize).is_some() {
            self.bring_up().await;
        }
    }

    fn schedule_scan_timeout(self: &Arc<Self>, generation: u64, since: DateTime<Utc>) {
        let Some(timeout) = self.settings.scan_timeout else {
            return;
        };
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(manager) = weak.upgrade() else {
                return;
            };
            let expired = {
                let inner = manager.lock();
                inner.generation == generation
                    && matches!(
                        &inner.state,
                        ConnectionState::AwaitingScan { since: started, .. } if *started == since
                    )
            };
            if expired {
                warn!(
                    timeout_secs = timeout.as_secs(),
                    "pairing code not scanned in time, restarting session"
                );
                manager.restart().await;
            }
        });
    }
}

//! Connection state machine for the single WhatsApp session.
//!
//! All transitions go through [`ConnectionState::apply`]. The pending QR code
//! only exists inside [`ConnectionState::AwaitingScan`], so a status that is
//! both connected and showing a code cannot be constructed.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A pairing code waiting to be scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingQr {
    /// Raw payload emitted by the bridge.
    pub payload: String,
    /// Data-URI image rendered from `payload`.
    pub image: String,
    /// When this code was received.
    pub issued_at: DateTime<Utc>,
}

/// Lifecycle state of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Client created, `initialize()` in progress.
    Initializing,
    /// Waiting for the operator to scan a pairing code.
    AwaitingScan {
        /// Most recent code.
        qr: PendingQr,
        /// When the session first started waiting for a scan.
        since: DateTime<Utc>,
    },
    /// Authenticated and able to send.
    Ready,
    /// Connection lost; a re-initialization is scheduled.
    Disconnected {
        /// Reason reported by the bridge, if any.
        reason: Option<String>,
    },
    /// Operator restart in progress: client teardown and credential wipe.
    Resetting,
}

/// Inputs to the state machine.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    /// The client produced a new pairing code.
    Qr(PendingQr),
    /// The client authenticated.
    Ready,
    /// The client lost its connection or failed to initialize.
    Disconnected {
        /// Reason, if known.
        reason: Option<String>,
    },
    /// Operator requested a restart.
    Reset,
    /// A fresh client is about to be initialized.
    Reinitialize,
}

/// What the HTTP API reports for the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    /// Whether the session is `Ready`.
    pub connected: bool,
    /// Pending pairing code as a data URI, only while awaiting a scan.
    pub qr: Option<String>,
}

impl ConnectionState {
    /// Compute the next state for `event`, or `None` if the event is ignored here.
    pub fn apply(&self, event: &LifecycleEvent) -> Option<ConnectionState> {
        use ConnectionState as S;
        use LifecycleEvent as E;

        match (self, event) {
            (_, E::Reset) => Some(S::Resetting),
            (S::Resetting, E::Reinitialize) | (S::Disconnected { .. }, E::Reinitialize) => {
                Some(S::Initializing)
            }
            (_, E::Reinitialize) => None,
            // Events from a client that is being torn down.
            (S::Resetting, _) => None,
            (S::AwaitingScan { since, .. }, E::Qr(qr)) => Some(S::AwaitingScan {
                qr: qr.clone(),
                since: *since,
            }),
            (_, E::Qr(qr)) => Some(S::AwaitingScan {
                qr: qr.clone(),
                since: qr.issued_at,
            }),
            (S::Ready, E::Ready) => None,
            (_, E::Ready) => Some(S::Ready),
            (S::Disconnected { .. }, E::Disconnected { .. }) => None,
            (_, E::Disconnected { reason }) => Some(S::Disconnected {
                reason: reason.clone(),
            }),
        }
    }

    /// Whether sends are permitted.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Status as exposed over HTTP.
    pub fn snapshot(&self) -> StatusSnapshot {
        match self {
            Self::Ready => StatusSnapshot {
                connected: true,
                qr: None,
            },
            Self::AwaitingScan { qr, .. } => StatusSnapshot {
                connected: false,
                qr: Some(qr.image.clone()),
            },
            _ => StatusSnapshot {
                connected: false,
                qr: None,
            },
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::AwaitingScan { .. } => "awaiting_scan",
            Self::Ready => "ready",
            Self::Disconnected { .. } => "disconnected",
            Self::Resetting => "resetting",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

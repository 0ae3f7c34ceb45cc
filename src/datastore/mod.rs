//! Read-only access to the hosted row store.
//!
//! The gateway reads two row sets it does not own: notification configs
//! (`communication_configs`) and team members (`team`). [`DataStore`] is the
//! seam; [`rest::RestDataStore`] implements it over a PostgREST API.

pub mod rest;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A recipient-selection and message-template row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Notification kind, e.g. `daily_report`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Whether the config is switched on.
    #[serde(default)]
    pub is_active: bool,
    /// Roles that receive this notification.
    #[serde(default)]
    pub target_roles: Option<Vec<String>>,
    /// Text sent instead of the default template.
    #[serde(default)]
    pub custom_message: Option<String>,
}

impl NotificationConfig {
    /// Target roles, or `defaults` when unset or empty.
    pub fn roles_or<'a>(&'a self, defaults: &'a [String]) -> &'a [String] {
        match self.target_roles.as_deref() {
            Some(roles) if !roles.is_empty() => roles,
            _ => defaults,
        }
    }

    /// Custom message, if set to something other than whitespace.
    pub fn message(&self) -> Option<&str> {
        self.custom_message
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }
}

/// A team member who may receive notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Display name.
    pub name: String,
    /// Team role, e.g. `Manager`.
    #[serde(default)]
    pub role: String,
    /// Phone number in any human format.
    #[serde(default)]
    pub phone: Option<String>,
}

impl Recipient {
    /// Phone number, if set to something other than whitespace.
    pub fn phone(&self) -> Option<&str> {
        self.phone
            .as_deref()
            .map(str::trim)
            .filter(|phone| !phone.is_empty())
    }
}

/// Errors from the row store.
#[derive(Debug, thiserror::Error)]
pub enum DataStoreError {
    /// Transport failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("data store returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// The configured base URL is unusable.
    #[error("invalid data store URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The response body did not match the expected row shape.
    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Queries the core needs from the row store.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Active notification configs of the given kind.
    async fn active_configs(&self, kind: &str) -> Result<Vec<NotificationConfig>, DataStoreError>;

    /// Team members whose role is one of `roles`.
    async fn recipients_with_roles(
        &self,
        roles: &[String],
    ) -> Result<Vec<Recipient>, DataStoreError>;
}

//! Daily team report: read notification configs and fan out WhatsApp messages.
//!
//! Each send is isolated. A bad number or transport error is recorded in the
//! run summary and the remaining recipients are still served.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ReportConfig;
use crate::datastore::{DataStore, NotificationConfig, Recipient};
use crate::whatsapp::connection::ConnectionManager;

/// What started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Fired by the cron schedule.
    Scheduled,
    /// Requested through the API.
    Manual,
}

/// Why a run did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The session is not `Ready`.
    NotConnected,
    /// No active config of the report type exists.
    NoActiveConfigs,
    /// The config query failed.
    DataStoreUnavailable,
    /// Another run is in progress.
    AlreadyRunning,
}

/// A recipient whose message could not be sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendFailure {
    /// Recipient name.
    pub recipient: String,
    /// Error description.
    pub error: String,
}

/// Aggregate result of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    /// Correlates log lines of one run.
    pub run_id: Uuid,
    /// Configs processed.
    pub configs: usize,
    /// Configs whose recipient query failed.
    pub config_errors: usize,
    /// Messages handed to the transport successfully.
    pub sent: usize,
    /// Recipients without a phone number.
    pub skipped_no_phone: usize,
    /// Sends that failed.
    pub failures: Vec<SendFailure>,
}

impl ReportSummary {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            configs: 0,
            config_errors: 0,
            sent: 0,
            skipped_no_phone: 0,
            failures: Vec::new(),
        }
    }
}

/// Result of [`DailyReport::run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Nothing was sent.
    Skipped {
        /// Why.
        reason: SkipReason,
    },
    /// Configs were processed.
    Completed(ReportSummary),
}

/// Settings for the report job.
#[derive(Debug, Clone)]
pub struct ReportSettings {
    /// `type` of the config rows to read.
    pub config_type: String,
    /// Roles used when a config names none.
    pub default_roles: Vec<String>,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self::from_config(&ReportConfig::default())
    }
}

impl ReportSettings {
    /// Build settings from the `[report]` config section.
    pub fn from_config(config: &ReportConfig) -> Self {
        Self {
            config_type: config.config_type.clone(),
            default_roles: config.default_roles.clone(),
        }
    }
}

/// The daily report job. Callable on demand and from the scheduler.
pub struct DailyReport {
    manager: Arc<ConnectionManager>,
    store: Arc<dyn DataStore>,
    settings: ReportSettings,
    running: Mutex<()>,
}

impl DailyReport {
    /// Create the job.
    pub fn new(
        manager: Arc<ConnectionManager>,
        store: Arc<dyn DataStore>,
        settings: ReportSettings,
    ) -> Self {
        Self {
            manager,
            store,
            settings,
            running: Mutex::new(()),
        }
    }

    /// Run the report once. Never fails: every error is logged and reflected
    /// in the outcome.
    pub async fn run(&self, trigger: Trigger) -> RunOutcome {
        let Ok(_running) = self.running.try_lock() else {
            info!(?trigger, "daily report already running, skipping");
            return RunOutcome::Skipped {
                reason: SkipReason::AlreadyRunning,
            };
        };
        let run_id = Uuid::new_v4();

        if !self.manager.is_connected() {
            info!(%run_id, ?trigger, "WhatsApp not connected, skipping daily report");
            return RunOutcome::Skipped {
                reason: SkipReason::NotConnected,
            };
        }

        let configs = match self.store.active_configs(&self.settings.config_type).await {
            Ok(configs) => configs
                .into_iter()
                .filter(|c| c.is_active && c.kind == self.settings.config_type)
                .collect::<Vec<_>>(),
            Err(e) => {
                error!(%run_id, error = %e, "failed to load notification configs");
                return RunOutcome::Skipped {
                    reason: SkipReason::DataStoreUnavailable,
                };
            }
        };
        if configs.is_empty() {
            info!(%run_id, "no active daily report configs");
            return RunOutcome::Skipped {
                reason: SkipReason::NoActiveConfigs,
            };
        }

        info!(%run_id, ?trigger, configs = configs.len(), "daily report started");
        let mut summary = ReportSummary::new(run_id);
        for config in &configs {
            self.run_config(config, &mut summary).await;
        }

        info!(
            %run_id,
            configs = summary.configs,
            sent = summary.sent,
            skipped_no_phone = summary.skipped_no_phone,
            failed = summary.failures.len(),
            "daily report finished"
        );
        RunOutcome::Completed(summary)
    }

    async fn run_config(&self, config: &NotificationConfig, summary: &mut ReportSummary) {
        summary.configs = summary.configs.saturating_add(1);
        let roles = config.roles_or(&self.settings.default_roles);

        let recipients = match self.store.recipients_with_roles(roles).await {
            Ok(recipients) => recipients,
            Err(e) => {
                warn!(run_id = %summary.run_id, ?roles, error = %e, "failed to load recipients");
                summary.config_errors = summary.config_errors.saturating_add(1);
                return;
            }
        };

        for recipient in &recipients {
            let Some(phone) = recipient.phone() else {
                debug!(recipient = %recipient.name, "no phone number, skipping");
                summary.skipped_no_phone = summary.skipped_no_phone.saturating_add(1);
                continue;
            };
            let text = compose_message(config, recipient);
            match self.manager.send(phone, &text).await {
                Ok(()) => summary.sent = summary.sent.saturating_add(1),
                Err(e) => {
                    warn!(
                        run_id = %summary.run_id,
                        recipient = %recipient.name,
                        error = %e,
                        "daily report send failed"
                    );
                    summary.failures.push(SendFailure {
                        recipient: recipient.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
    }
}

/// Message text for a recipient: the config's custom message, or the default
/// greeting.
pub fn compose_message(config: &NotificationConfig, recipient: &Recipient) -> String {
    match config.message() {
        Some(text) => text.to_owned(),
        None => default_greeting(&recipient.name),
    }
}

/// Default report greeting naming the recipient.
pub fn default_greeting(name: &str) -> String {
    format!(
        "Olá {name}! 👋\n\n\
         Este é o seu relatório diário da equipe.\n\
         Acesse o painel para ver os detalhes do dia.\n\n\
         Tenha uma ótima noite!"
    )
}

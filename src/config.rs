//! Configuration loading and validation.
//!
//! Loads `gateway.toml` (or `--config`, or `$WHATSAPP_GATEWAY_CONFIG`).
//! Environment variables override file values; file values override defaults.
//! Secrets never live in this file: it names the environment variables that
//! hold them (see [`crate::credentials`]).

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::heartbeat::scheduler::CronTrigger;
use crate::whatsapp::client::DEFAULT_BRIDGE_PORT;
use crate::whatsapp::session_store::{DEFAULT_AUTH_DIR, DEFAULT_CACHE_DIR};

/// Default config file name, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "gateway.toml";

/// Environment variable naming an alternative config file.
pub const CONFIG_PATH_ENV: &str = "WHATSAPP_GATEWAY_CONFIG";

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listener.
    pub server: ServerConfig,
    /// WhatsApp bridge and session lifecycle.
    pub whatsapp: WhatsAppConfig,
    /// External row store.
    pub datastore: DataStoreConfig,
    /// Scheduled daily report.
    pub report: ReportConfig,
    /// API authentication and secrets file.
    pub auth: AuthConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to bind, e.g. `0.0.0.0:3001`.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3001".to_owned(),
        }
    }
}

/// WhatsApp bridge and session lifecycle settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    /// Base URL of the WhatsApp Web bridge.
    pub bridge_url: String,
    /// Directory holding the saved session credentials.
    pub auth_dir: PathBuf,
    /// Browser cache directory used by the bridge.
    pub cache_dir: PathBuf,
    /// Delay between teardown and re-initialization on restart.
    pub restart_delay_ms: u64,
    /// Restart when a pairing code stays unscanned this long. `0` disables.
    pub scan_timeout_secs: u64,
    /// Deadline for a single send.
    pub send_timeout_secs: u64,
    /// Deadline for destroying a client.
    pub destroy_timeout_secs: u64,
    /// First reconnect delay after a disconnect.
    pub reconnect_initial_ms: u64,
    /// Upper bound for the reconnect delay.
    pub reconnect_max_ms: u64,
    /// Docker-managed bridge container.
    pub sidecar: SidecarConfig,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            bridge_url: format!("http://127.0.0.1:{DEFAULT_BRIDGE_PORT}"),
            auth_dir: PathBuf::from(DEFAULT_AUTH_DIR),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            restart_delay_ms: 1000,
            scan_timeout_secs: 300,
            send_timeout_secs: 30,
            destroy_timeout_secs: 10,
            reconnect_initial_ms: 1000,
            reconnect_max_ms: 30_000,
            sidecar: SidecarConfig::default(),
        }
    }
}

/// Bridge container managed through Docker.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SidecarConfig {
    /// Create/start the container on `start`.
    pub manage: bool,
    /// Container image.
    pub image: String,
    /// Host port published for the bridge.
    pub host_port: u16,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            manage: false,
            image: "whatsapp-gateway-bridge:latest".to_owned(),
            host_port: DEFAULT_BRIDGE_PORT,
        }
    }
}

/// External row store settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataStoreConfig {
    /// Environment variable holding the store base URL.
    pub url_env: String,
    /// Environment variable holding the service credential.
    pub service_key_env: String,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
}

impl Default for DataStoreConfig {
    fn default() -> Self {
        Self {
            url_env: "SUPABASE_URL".to_owned(),
            service_key_env: "SUPABASE_SERVICE_ROLE_KEY".to_owned(),
            request_timeout_secs: 30,
        }
    }
}

/// Daily report schedule.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Run on the cron schedule.
    pub enabled: bool,
    /// Six-field cron expression in server-local time.
    pub cron: String,
    /// How often the schedule is evaluated.
    pub tick_secs: u64,
    /// `type` of the notification config rows to read.
    pub config_type: String,
    /// Roles notified when a config has no target roles.
    pub default_roles: Vec<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: "0 0 18 * * *".to_owned(),
            tick_secs: 30,
            config_type: "daily_report".to_owned(),
            default_roles: vec!["Manager".to_owned(), "Owner".to_owned()],
        }
    }
}

/// API authentication settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Environment variable holding the shared API key.
    pub api_key_env: String,
    /// `.env` file with secrets.
    pub env_file: PathBuf,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_key_env: "WHATSAPP_API_KEY".to_owned(),
            env_file: PathBuf::from(".env"),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for rotated JSON logs.
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
        }
    }
}

impl Config {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// An explicit `path` must exist. Without one, `$WHATSAPP_GATEWAY_CONFIG`
    /// or `./gateway.toml` is used and a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or the result
    /// fails [`validate`](Self::validate).
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Load using a custom env resolver (for testing).
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub fn load_with(
        path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => load_config(path)?,
            None => {
                let path = env(CONFIG_PATH_ENV)
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
                if path.exists() {
                    load_config(&path)?
                } else {
                    tracing::info!(path = %path.display(), "no config file found, using defaults");
                    Self::default()
                }
            }
        };
        config.apply_overrides(env);
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML string into config (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> anyhow::Result<Self> {
        toml::from_str(toml_str).context("failed to parse config TOML")
    }

    /// Apply environment variable overrides.
    ///
    /// Takes a resolver function for testability (avoids `set_var` in tests).
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("WHATSAPP_GATEWAY_BIND") {
            self.server.bind = v;
        }
        if let Some(v) = env("WHATSAPP_BRIDGE_URL") {
            self.whatsapp.bridge_url = v;
        }
        if let Some(v) = env("WHATSAPP_AUTH_DIR") {
            self.whatsapp.auth_dir = PathBuf::from(v);
        }
        if let Some(v) = env("WHATSAPP_REPORT_CRON") {
            self.report.cron = v;
        }
    }

    /// Check values that serde cannot.
    ///
    /// # Errors
    ///
    /// Returns an error for an unparsable bind address or cron expression, or
    /// zero-length timeouts.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.bind_addr()?;
        CronTrigger::parse("daily_report", &self.report.cron)?;
        if self.whatsapp.send_timeout_secs == 0 {
            anyhow::bail!("whatsapp.send_timeout_secs must be greater than zero");
        }
        if self.report.tick_secs == 0 {
            anyhow::bail!("report.tick_secs must be greater than zero");
        }
        let whatsapp = &self.whatsapp;
        if whatsapp.destroy_timeout_secs == 0 {
            anyhow::bail!("whatsapp.destroy_timeout_secs must be greater than zero");
        }
        if whatsapp.reconnect_initial_ms == 0 {
            anyhow::bail!("whatsapp.reconnect_initial_ms must be greater than zero");
        }
        if whatsapp.reconnect_max_ms < whatsapp.reconnect_initial_ms {
            anyhow::bail!(
                "whatsapp.reconnect_max_ms ({}) must not be below reconnect_initial_ms ({})",
                whatsapp.reconnect_max_ms,
                whatsapp.reconnect_initial_ms
            );
        }
        Ok(())
    }

    /// Parsed listener address.
    ///
    /// # Errors
    ///
    /// Returns an error if `server.bind` is not a socket address.
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        self.server
            .bind
            .parse()
            .with_context(|| format!("invalid server.bind address: {}", self.server.bind))
    }
}

/// Load the config from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config at {}: {e}", path.display()))?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config at {}: {e}", path.display()))?;
    tracing::info!(path = %path.display(), "loaded config");
    Ok(config)
}

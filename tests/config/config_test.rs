//! Coverage for config parsing, env overrides and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use whatsapp_gateway::config::{Config, CONFIG_PATH_ENV};
use whatsapp_gateway::whatsapp::connection::ConnectionSettings;

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn default_values() {
    let config = Config::default();
    assert_eq!(config.server.bind, "0.0.0.0:3001");
    assert_eq!(config.whatsapp.bridge_url, "http://127.0.0.1:3002");
    assert_eq!(config.whatsapp.auth_dir, PathBuf::from(".wwebjs_auth"));
    assert_eq!(config.whatsapp.cache_dir, PathBuf::from(".wwebjs_cache"));
    assert_eq!(config.whatsapp.scan_timeout_secs, 300);
    assert!(!config.whatsapp.sidecar.manage);
    assert_eq!(config.report.cron, "0 0 18 * * *");
    assert_eq!(config.report.config_type, "daily_report");
    assert_eq!(config.report.default_roles, vec!["Manager", "Owner"]);
    assert_eq!(config.auth.api_key_env, "WHATSAPP_API_KEY");
    assert_eq!(config.datastore.url_env, "SUPABASE_URL");
}

#[test]
fn partial_toml_keeps_defaults() {
    let config = Config::from_toml(
        r#"
[server]
bind = "127.0.0.1:8080"

[report]
cron = "0 30 19 * * Mon-Fri"
default_roles = ["Owner"]

[whatsapp.sidecar]
manage = true
host_port = 4002
"#,
    )
    .expect("valid TOML");

    assert_eq!(config.server.bind, "127.0.0.1:8080");
    assert_eq!(config.report.cron, "0 30 19 * * Mon-Fri");
    assert_eq!(config.report.default_roles, vec!["Owner"]);
    assert!(config.report.enabled);
    assert!(config.whatsapp.sidecar.manage);
    assert_eq!(config.whatsapp.sidecar.host_port, 4002);
    assert_eq!(config.whatsapp.restart_delay_ms, 1000);
    assert!(config.validate().is_ok());
}

#[test]
fn unknown_types_are_rejected() {
    assert!(Config::from_toml("[server]\nbind = 3001\n").is_err());
}

#[test]
fn missing_default_file_yields_defaults() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let absent = tmp.path().join("gateway.toml");
    let absent_str = absent.display().to_string();

    let config = Config::load_with(None, |key| {
        (key == CONFIG_PATH_ENV).then(|| absent_str.clone())
    })
    .expect("defaults should load");

    assert_eq!(config.server.bind, "0.0.0.0:3001");
}

#[test]
fn explicit_path_must_exist() {
    let result = Config::load_with(Some(Path::new("/nonexistent/gateway.toml")), no_env);
    assert!(result.is_err());
}

#[test]
fn env_overrides_file_values() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let path = tmp.path().join("gateway.toml");
    std::fs::write(
        &path,
        "[server]\nbind = \"127.0.0.1:8080\"\n[whatsapp]\nbridge_url = \"http://bridge:3000\"\n",
    )
    .expect("write config");

    let config = Config::load_with(Some(&path), |key| match key {
        "WHATSAPP_GATEWAY_BIND" => Some("127.0.0.1:9090".to_owned()),
        "WHATSAPP_AUTH_DIR" => Some("/var/lib/gateway/auth".to_owned()),
        _ => None,
    })
    .expect("config should load");

    assert_eq!(config.server.bind, "127.0.0.1:9090");
    assert_eq!(config.whatsapp.bridge_url, "http://bridge:3000");
    assert_eq!(
        config.whatsapp.auth_dir,
        PathBuf::from("/var/lib/gateway/auth")
    );
}

#[test]
fn invalid_values_fail_validation() {
    let mut config = Config::default();
    config.server.bind = "localhost".to_owned();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.whatsapp.send_timeout_secs = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.report.cron = "18:00".to_owned();
    assert!(config.validate().is_err());
}

#[test]
fn reconnect_backoff_must_grow() {
    let mut config = Config::default();
    config.whatsapp.reconnect_initial_ms = 0;
    let err = config.validate().expect_err("zero backoff should be rejected");
    assert!(err.to_string().contains("reconnect_initial_ms"), "got {err}");

    let mut config = Config::default();
    config.whatsapp.reconnect_initial_ms = 5000;
    config.whatsapp.reconnect_max_ms = 1000;
    let err = config.validate().expect_err("inverted bounds should be rejected");
    assert!(err.to_string().contains("reconnect_max_ms"), "got {err}");

    let mut config = Config::default();
    config.whatsapp.reconnect_initial_ms = 2000;
    config.whatsapp.reconnect_max_ms = 2000;
    assert!(config.validate().is_ok());
}

#[test]
fn zero_destroy_timeout_fails_validation() {
    let mut config = Config::default();
    config.whatsapp.destroy_timeout_secs = 0;
    let err = config.validate().expect_err("zero destroy timeout should be rejected");
    assert!(err.to_string().contains("destroy_timeout_secs"), "got {err}");
}

#[test]
fn zero_scan_timeout_disables_it() {
    let mut config = Config::default();
    assert_eq!(
        ConnectionSettings::from_config(&config.whatsapp).scan_timeout,
        Some(Duration::from_secs(300))
    );

    config.whatsapp.scan_timeout_secs = 0;
    let settings = ConnectionSettings::from_config(&config.whatsapp);
    assert_eq!(settings.scan_timeout, None);
    assert_eq!(settings.restart_delay, Duration::from_millis(1000));
    assert_eq!(settings.reconnect_max, Duration::from_secs(30));
}

//! Tests for `src/logging.rs`.

use whatsapp_gateway::logging::{LoggingGuard, LOG_FILE_PREFIX};

#[test]
fn logging_guard_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<LoggingGuard>();
}

#[test]
fn log_files_use_the_gateway_prefix() {
    assert_eq!(LOG_FILE_PREFIX, "whatsapp-gateway.log");
}

#[test]
fn init_production_creates_logs_dir() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let logs_dir = tmp.path().join("logs");
    assert!(!logs_dir.exists());

    // Only one global subscriber per process; the directory is created
    // before installation is attempted.
    let _result = whatsapp_gateway::logging::init_production(&logs_dir);
    assert!(logs_dir.exists(), "logs directory should be created");
}

#[test]
fn init_cli_tolerates_an_existing_subscriber() {
    whatsapp_gateway::logging::init_cli();
    whatsapp_gateway::logging::init_cli();
}

//! Coverage for credential loading and permission checks.

use std::fs;
use std::path::{Path, PathBuf};

use whatsapp_gateway::credentials::load_credentials;

fn write_env(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join(".env");
    fs::write(&path, contents).expect("write .env");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).expect("chmod 600");
    }
    path
}

#[test]
fn loads_env_credentials() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let path = write_env(
        tmp.path(),
        "WHATSAPP_API_KEY=test-key\nSUPABASE_URL=https://project.supabase.co\n# comment\n",
    );

    let credentials = load_credentials(&path).expect("credentials should load");

    assert_eq!(credentials.get("WHATSAPP_API_KEY"), Some("test-key"));
    assert_eq!(
        credentials.get("SUPABASE_URL"),
        Some("https://project.supabase.co")
    );
    assert!(credentials.require("SUPABASE_SERVICE_ROLE_KEY").is_err());
}

#[test]
fn missing_file_yields_empty_credentials() {
    let tmp = tempfile::tempdir().expect("should create temp dir");

    let credentials = load_credentials(&tmp.path().join(".env")).expect("missing file is fine");

    assert_eq!(credentials.get("WHATSAPP_API_KEY"), None);
}

#[test]
fn quoted_values_are_unquoted() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let path = write_env(tmp.path(), "WHATSAPP_API_KEY=\"with spaces\"\n");

    let credentials = load_credentials(&path).expect("credentials should load");

    assert_eq!(credentials.get("WHATSAPP_API_KEY"), Some("with spaces"));
}

#[cfg(unix)]
#[test]
fn rejects_world_readable_env_file() {
    use std::os::unix::fs::PermissionsExt;

    let tmp = tempfile::tempdir().expect("should create temp dir");
    let path = write_env(tmp.path(), "WHATSAPP_API_KEY=test-key\n");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).expect("chmod 644");

    let err = load_credentials(&path).expect_err("broad permissions must be rejected");

    assert!(err.to_string().contains("must be 0600"), "got {err}");
}

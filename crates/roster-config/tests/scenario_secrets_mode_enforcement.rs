//! Admin secret resolution per mode.
//!
//! GREEN when:
//! - SYNC fails naming the env var when it is unset or blank
//! - PLAN tolerates a missing secret
//! - a configured env var name overrides the default
//! - a value pasted where the NAME belongs is refused without echoing it
//!
//! Each test uses its own env var name so tests can run in parallel.

use roster_config::{resolve_secrets, ConfigMode, DEFAULT_ADMIN_SECRET_ENV};
use serde_json::json;

fn config_naming(var: &str) -> serde_json::Value {
    json!({ "remote": { "admin_secret_env": var } })
}

#[test]
fn sync_requires_the_secret() {
    let var = "ROSTER_TEST_SECRET_SYNC_MISSING";
    std::env::remove_var(var);
    let err = resolve_secrets(&config_naming(var), ConfigMode::Sync)
        .unwrap_err()
        .to_string();
    assert!(err.contains("SECRETS_MISSING mode=SYNC"), "got: {err}");
    assert!(err.contains(var));
}

#[test]
fn blank_value_counts_as_missing() {
    let var = "ROSTER_TEST_SECRET_BLANK";
    std::env::set_var(var, "   ");
    assert!(resolve_secrets(&config_naming(var), ConfigMode::Sync).is_err());
    std::env::remove_var(var);
}

#[test]
fn plan_tolerates_missing_secret() {
    let var = "ROSTER_TEST_SECRET_PLAN_MISSING";
    std::env::remove_var(var);
    let s = resolve_secrets(&config_naming(var), ConfigMode::Plan).unwrap();
    assert!(s.admin_secret.is_none());
    assert_eq!(s.admin_secret_env, var);
}

#[test]
fn configured_name_is_resolved() {
    let var = "ROSTER_TEST_SECRET_PRESENT";
    std::env::set_var(var, "value-from-env");
    let s = resolve_secrets(&config_naming(var), ConfigMode::Sync).unwrap();
    assert_eq!(s.admin_secret.as_deref(), Some("value-from-env"));
    assert!(!format!("{s:?}").contains("value-from-env"));
    std::env::remove_var(var);
}

#[test]
fn default_name_used_when_unconfigured() {
    let s = resolve_secrets(&json!({}), ConfigMode::Plan).unwrap();
    assert_eq!(s.admin_secret_env, DEFAULT_ADMIN_SECRET_ENV);
}

#[test]
fn pasted_value_in_name_slot_is_refused() {
    let err = resolve_secrets(&config_naming("my secret value"), ConfigMode::Plan)
        .unwrap_err()
        .to_string();
    assert!(err.contains("CONFIG_SECRET_DETECTED"), "got: {err}");
    assert!(!err.contains("my secret value"));
}

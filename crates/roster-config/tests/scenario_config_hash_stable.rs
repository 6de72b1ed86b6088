//! Config hash stability.
//!
//! GREEN when:
//! - the same inputs hash identically
//! - key order inside YAML does not change the hash
//! - a different value changes the hash
//! - layering from files equals layering from strings

use roster_config::{load_layered_yaml, load_layered_yaml_from_strings, RosterConfig};
use std::fs;
use tempfile::tempdir;

const BASE_YAML: &str = r#"
remote:
  endpoint: "https://roster.example.edu/v1/graphql"
  admin_secret_env: "ROSTER_ADMIN_SECRET"
  timeout_secs: 30
reconcile:
  section_prefixes: ["LA"]
  max_concurrent_students: 4
"#;

const BASE_YAML_REORDERED: &str = r#"
reconcile:
  max_concurrent_students: 4
  section_prefixes: ["LA"]
remote:
  timeout_secs: 30
  admin_secret_env: "ROSTER_ADMIN_SECRET"
  endpoint: "https://roster.example.edu/v1/graphql"
"#;

const OVERLAY_YAML: &str = r#"
reconcile:
  max_concurrent_students: 1
  default_semester: 2110
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
    assert_eq!(a.config_hash.len(), 64, "sha-256 hex digest");
}

#[test]
fn key_order_does_not_change_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(
        a.config_hash, b.config_hash,
        "reordered keys must canonicalize to the same hash"
    );
}

#[test]
fn overlay_changes_hash_and_values() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let layered = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(base.config_hash, layered.config_hash);

    let cfg = RosterConfig::from_json(&layered.config_json).unwrap();
    assert_eq!(cfg.reconcile.max_concurrent_students, 1);
    assert_eq!(cfg.reconcile.default_semester, Some(2110));
    // Untouched by the overlay.
    assert_eq!(cfg.remote.timeout_secs, 30);
    assert_eq!(
        cfg.remote.endpoint.as_deref(),
        Some("https://roster.example.edu/v1/graphql")
    );
}

#[test]
fn empty_layer_is_ignored() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, ""]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
}

#[test]
fn file_layers_match_string_layers() {
    let dir = tempdir().unwrap();
    let base = dir.path().join("base.yaml");
    let overlay = dir.path().join("prod.yaml");
    fs::write(&base, BASE_YAML).unwrap();
    fs::write(&overlay, OVERLAY_YAML).unwrap();

    let from_files = load_layered_yaml(&[&base, &overlay]).unwrap();
    let from_strings = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(from_files.config_hash, from_strings.config_hash);
}

#[test]
fn missing_file_is_reported_by_path() {
    let err = load_layered_yaml(&["/definitely/not/here.yaml"]).unwrap_err();
    assert!(format!("{err:#}").contains("/definitely/not/here.yaml"));
}

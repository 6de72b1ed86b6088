//! Unused-key report.
//!
//! Validates:
//! 1) unused keys are reported in WARN without erroring
//! 2) they fail the load in FAIL
//! 3) keys a mode reads are never flagged
//! 4) a key read in SYNC but not in PLAN is flagged only in PLAN

use roster_config::{
    load_layered_yaml_from_strings, report_unused_keys, ConfigMode, UnusedKeyPolicy,
};

const YAML: &str = r#"
remote:
  endpoint: "https://roster.example.edu/v1/graphql"
reconcile:
  section_prefixes: ["LA"]
  max_concurrent_students: 2
catalog:
  url: "https://catalog.example.edu/courses"
legacy:
  webhook_port: 3000
  notify: true
"#;

#[test]
fn warn_mode_reports_without_error() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let report =
        report_unused_keys(ConfigMode::Sync, &loaded.config_json, UnusedKeyPolicy::Warn).unwrap();

    assert!(!report.is_clean());
    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/legacy/notify".to_string(), "/legacy/webhook_port".to_string()]
    );
    assert_eq!(report.mode, "SYNC");
}

#[test]
fn fail_mode_errors_on_unused_keys() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let err = report_unused_keys(ConfigMode::Sync, &loaded.config_json, UnusedKeyPolicy::Fail)
        .unwrap_err()
        .to_string();
    assert!(err.contains("CONFIG_UNUSED_KEYS (mode=SYNC)"), "got: {err}");
    assert!(err.contains("/legacy/webhook_port"));
}

#[test]
fn clean_config_passes_fail_mode() {
    let yaml = r#"
remote:
  endpoint: "https://roster.example.edu/v1/graphql"
  timeout_secs: 10
reconcile:
  default_semester: 2110
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report =
        report_unused_keys(ConfigMode::Plan, &loaded.config_json, UnusedKeyPolicy::Fail).unwrap();
    assert!(report.is_clean());
}

#[test]
fn sync_only_keys_are_unused_in_plan() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let report =
        report_unused_keys(ConfigMode::Plan, &loaded.config_json, UnusedKeyPolicy::Warn).unwrap();
    assert!(report
        .unused_leaf_pointers
        .contains(&"/reconcile/max_concurrent_students".to_string()));
    assert!(report.unused_leaf_pointers.contains(&"/catalog/url".to_string()));
    assert!(!report
        .unused_leaf_pointers
        .iter()
        .any(|p| p.starts_with("/reconcile/section_prefixes")));
}

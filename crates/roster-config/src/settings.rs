use anyhow::{bail, Context, Result};
use roster_reconcile::{SectionFilter, SemesterId};
use serde::Deserialize;
use serde_json::Value;

use crate::secrets::DEFAULT_ADMIN_SECRET_ENV;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteSettings {
    /// GraphQL endpoint URL. Not needed for paper runs.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_admin_secret_env")]
    pub admin_secret_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReconcileSettings {
    #[serde(default = "default_section_prefixes")]
    pub section_prefixes: Vec<String>,
    #[serde(default = "default_max_concurrent_students")]
    pub max_concurrent_students: usize,
    #[serde(default)]
    pub default_semester: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CatalogSettings {
    #[serde(default)]
    pub url: Option<String>,
}

/// Typed view over the merged config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RosterConfig {
    #[serde(default)]
    pub remote: RemoteSettings,
    #[serde(default)]
    pub reconcile: ReconcileSettings,
    #[serde(default)]
    pub catalog: CatalogSettings,
}

fn default_admin_secret_env() -> String {
    DEFAULT_ADMIN_SECRET_ENV.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_section_prefixes() -> Vec<String> {
    vec!["LA".to_string()]
}

fn default_max_concurrent_students() -> usize {
    1
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            admin_secret_env: default_admin_secret_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            section_prefixes: default_section_prefixes(),
            max_concurrent_students: default_max_concurrent_students(),
            default_semester: None,
        }
    }
}

impl RosterConfig {
    pub fn from_json(config_json: &Value) -> Result<Self> {
        let cfg: RosterConfig =
            serde_json::from_value(config_json.clone()).context("config has unexpected shape")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.reconcile.max_concurrent_students == 0 {
            bail!("CONFIG_INVALID /reconcile/max_concurrent_students must be at least 1");
        }
        if self.section_filter().prefixes().is_empty() {
            bail!("CONFIG_INVALID /reconcile/section_prefixes must name at least one prefix");
        }
        if self.remote.timeout_secs == 0 {
            bail!("CONFIG_INVALID /remote/timeout_secs must be positive");
        }
        if let Some(ep) = &self.remote.endpoint {
            if !(ep.starts_with("http://") || ep.starts_with("https://")) {
                bail!("CONFIG_INVALID /remote/endpoint must be an http(s) URL, got '{ep}'");
            }
        }
        Ok(())
    }

    pub fn section_filter(&self) -> SectionFilter {
        SectionFilter::with_prefixes(&self.reconcile.section_prefixes)
    }

    /// `explicit` if given, else the configured default.
    pub fn semester(&self, explicit: Option<u32>) -> Result<SemesterId> {
        match explicit.or(self.reconcile.default_semester) {
            Some(id) => Ok(SemesterId(id)),
            None => bail!("no semester given and /reconcile/default_semester is not set"),
        }
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.remote.timeout_secs)
    }
}

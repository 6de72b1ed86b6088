//! Runtime secret resolution.
//!
//! # Contract
//! - YAML stores only the env var NAME (`remote.admin_secret_env`).
//! - Callers resolve secrets once at startup and pass [`ResolvedSecrets`] on.
//! - `Debug` redacts values; errors name the variable, never its value.
//!
//! # Mode-aware enforcement
//! - `SYNC`: the admin secret is **required**.
//! - `PLAN`: optional; reads against an open endpoint still work.

use anyhow::{bail, Result};
use serde_json::Value;

use crate::ConfigMode;

/// Env var consulted when the config names none.
pub const DEFAULT_ADMIN_SECRET_ENV: &str = "ROSTER_ADMIN_SECRET";

#[derive(Clone)]
pub struct ResolvedSecrets {
    /// Remote admin secret. `None` if the named env var was absent or empty.
    pub admin_secret: Option<String>,
    /// Name of the env var it was read from.
    pub admin_secret_env: String,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("admin_secret", &self.admin_secret.as_ref().map(|_| "<REDACTED>"))
            .field("admin_secret_env", &self.admin_secret_env)
            .finish()
    }
}

/// Non-empty trimmed string at `pointer`, if any.
pub(crate) fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// `true` for names shaped like `ROSTER_ADMIN_SECRET`.
pub(crate) fn is_env_var_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase() || c == '_')
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Resolve the admin secret for `mode` from the environment.
///
/// # Errors
/// - `remote.admin_secret_env` does not look like an env var name
///   (usually a pasted secret value)
/// - `SYNC` mode and the named variable is unset or blank
pub fn resolve_secrets(config_json: &Value, mode: ConfigMode) -> Result<ResolvedSecrets> {
    let var = read_str_at(config_json, "/remote/admin_secret_env")
        .unwrap_or_else(|| DEFAULT_ADMIN_SECRET_ENV.to_string());

    if !is_env_var_name(&var) {
        bail!(
            "CONFIG_SECRET_DETECTED leaf=/remote/admin_secret_env value=REDACTED \
             (expected an env var NAME such as {DEFAULT_ADMIN_SECRET_ENV})"
        );
    }

    let admin_secret = resolve_env(&var);
    if mode == ConfigMode::Sync && admin_secret.is_none() {
        bail!(
            "SECRETS_MISSING mode={}: required env var '{}' (remote admin secret) is not set or empty",
            mode.as_str(),
            var,
        );
    }

    Ok(ResolvedSecrets {
        admin_secret,
        admin_secret_env: var,
    })
}

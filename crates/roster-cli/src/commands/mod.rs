//! Command handlers for the `roster` binary.
//!
//! Shared loading helpers live here; command logic lives in the submodules.

pub mod diff;
pub mod sync;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use roster_client::{GraphqlRosterClient, RosterClient};
use roster_config::{
    report_unused_keys, resolve_secrets, ConfigMode, LoadedConfig, RosterConfig, UnusedKeyPolicy,
};
use roster_paper::PaperRoster;
use roster_reconcile::feed::{self, FeedEnrollment};
use tracing::{info, warn};

/// Arguments shared by `sync` and `plan`.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Layered config paths in merge order
    #[arg(long = "config", required = true)]
    pub config_paths: Vec<String>,

    /// Semester id (YYSS, e.g. 2110). Defaults to reconcile.default_semester
    #[arg(long)]
    pub semester: Option<u32>,

    /// Registrar feed: `.json` for structured rows, otherwise the text export
    #[arg(long)]
    pub feed: String,

    /// Keep good feed lines and warn about malformed ones instead of failing
    #[arg(long, default_value_t = false)]
    pub lenient: bool,

    /// Run against an in-memory roster loaded from this JSON file instead of the remote
    #[arg(long = "paper-state")]
    pub paper_state: Option<String>,

    /// Fail when the config holds keys this command does not read
    #[arg(long = "strict-config", default_value_t = false)]
    pub strict_config: bool,
}

pub struct Prepared {
    pub loaded: LoadedConfig,
    pub config: RosterConfig,
    pub feed: Vec<FeedEnrollment>,
    pub client: Arc<dyn RosterClient>,
    /// Set when running against a paper roster.
    pub paper: Option<Arc<PaperRoster>>,
}

/// Load config, feed and client for `mode`.
pub fn prepare(args: &RunArgs, mode: ConfigMode) -> Result<Prepared> {
    let loaded = roster_config::load_layered_yaml(&args.config_paths)?;
    let policy = if args.strict_config {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let unused = report_unused_keys(mode, &loaded.config_json, policy)?;
    for ptr in &unused.unused_leaf_pointers {
        warn!(mode = mode.as_str(), pointer = %ptr, "unused config key");
    }

    let config = RosterConfig::from_json(&loaded.config_json)?;
    let feed = load_feed(Path::new(&args.feed), args.lenient)?;

    let (client, paper): (Arc<dyn RosterClient>, Option<Arc<PaperRoster>>) = match &args.paper_state {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("read paper state failed: {path}"))?;
            let paper = Arc::new(
                PaperRoster::from_json(&raw)
                    .with_context(|| format!("paper state is not valid JSON: {path}"))?,
            );
            let client: Arc<dyn RosterClient> = paper.clone();
            (client, Some(paper))
        }
        None => {
            let secrets = resolve_secrets(&loaded.config_json, mode)?;
            let endpoint = config
                .remote
                .endpoint
                .clone()
                .context("/remote/endpoint is required unless --paper-state is given")?;
            let mut client =
                GraphqlRosterClient::with_timeout(endpoint, secrets.admin_secret, config.timeout())?;
            if let Some(url) = &config.catalog.url {
                client = client.with_catalog(url.clone());
            }
            (Arc::new(client) as Arc<dyn RosterClient>, None)
        }
    };

    info!(
        config_hash = %loaded.config_hash,
        client = client.client_name(),
        feed_rows = feed.len(),
        "run prepared"
    );

    Ok(Prepared {
        loaded,
        config,
        feed,
        client,
        paper,
    })
}

pub fn load_feed(path: &Path, lenient: bool) -> Result<Vec<FeedEnrollment>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read feed failed: {}", path.display()))?;

    let is_json = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if is_json {
        return Ok(feed::parse_json(&raw)?);
    }
    if !lenient {
        return Ok(feed::parse_text(&raw)?);
    }

    let (rows, errors) = feed::parse_text_lenient(&raw);
    for e in &errors {
        warn!(error = %e, "feed line skipped");
    }
    if rows.is_empty() && !errors.is_empty() {
        bail!("feed {} has no usable lines ({} malformed)", path.display(), errors.len());
    }
    Ok(rows)
}

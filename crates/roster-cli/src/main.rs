use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "roster")]
#[command(about = "Course roster reconciliation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, diff and apply: bring the remote roster in line with a registrar feed
    Sync {
        #[command(flatten)]
        run: commands::RunArgs,

        /// Write the paper roster back here after the run (only with --paper-state)
        #[arg(long = "save-paper-state", requires = "paper_state")]
        save_paper_state: Option<String>,
    },

    /// Fetch and diff only; print the deltas a sync would apply
    Plan {
        #[command(flatten)]
        run: commands::RunArgs,
    },

    /// Offline diff of two JSON snapshot files
    Diff {
        #[arg(long)]
        old: String,

        #[arg(long)]
        new: String,

        /// Section prefix under reconciliation (repeatable). Default: LA
        #[arg(long = "prefix", conflicts_with = "all_sections")]
        prefixes: Vec<String>,

        /// Reconcile every section, not just filtered ones
        #[arg(long = "all-sections", default_value_t = false)]
        all_sections: bool,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> overrides)
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();
    match cli.cmd {
        Commands::Sync {
            run,
            save_paper_state,
        } => commands::sync::run_sync(run, save_paper_state).await,
        Commands::Plan { run } => commands::sync::run_plan(run).await,
        Commands::Diff {
            old,
            new,
            prefixes,
            all_sections,
        } => commands::diff::run_diff(&old, &new, &prefixes, all_sections),
        Commands::ConfigHash { paths } => {
            let loaded = roster_config::load_layered_yaml(&paths)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

//! ovn-nb-batch - apply Northbound command batches
//!
//! Loads the row store snapshot, applies a JSON batch of topology commands
//! in one transaction and writes the snapshot back.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ovn_nb_cmd::{build_commands, log_results, parse_batch, NbApi, NbConfig, DEFAULT_CONFIG_PATH};
use ovn_nb_store::MemoryStore;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

/// Apply OVN Northbound topology command batches
#[derive(Parser, Debug)]
#[command(name = "ovn-nb-batch")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Snapshot file, overriding the configured one
    #[arg(short = 's', long)]
    snapshot: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Attempts per batch when a concurrent change aborts it
    #[arg(long, default_value = "3")]
    retries: usize,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Apply a JSON batch file
    Apply {
        /// Batch file
        batch: PathBuf,

        /// Run the batch without saving the snapshot
        #[arg(long)]
        dry_run: bool,
    },
    /// Print switches and routers as JSON
    Show,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("ovn-nb-batch: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: Args) -> Result<()> {
    let mut config = NbConfig::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(snapshot) = args.snapshot {
        config.connection.snapshot_path = snapshot;
    }
    let snapshot_path = config.connection.snapshot_path.clone();

    let store = Arc::new(
        MemoryStore::load_or_empty(&snapshot_path)
            .with_context(|| format!("loading snapshot {}", snapshot_path.display()))?,
    );
    let api = NbApi::with_config(Arc::clone(&store), config);

    match args.command {
        Action::Apply { batch, dry_run } => {
            let json = std::fs::read_to_string(&batch)
                .with_context(|| format!("reading {}", batch.display()))?;
            let ops = parse_batch(&json)?;
            info!("Applying {} operation(s) from {}", ops.len(), batch.display());

            let results = api
                .commit_with_retry(args.retries, |api| build_commands(api, &ops))
                .await?;
            log_results(&results);

            if dry_run {
                info!("Dry run, snapshot not saved");
            } else {
                store
                    .save(&snapshot_path)
                    .with_context(|| format!("saving snapshot {}", snapshot_path.display()))?;
                info!("Snapshot saved to {}", snapshot_path.display());
            }
        }
        Action::Show => {
            let view = serde_json::json!({
                "switches": api.all_switches_with_ports()?,
                "routers": api.all_routers_with_ports_and_routes()?,
            });
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
    }
    Ok(())
}

//! cryptcombat - run one encounter from a handoff file

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cryptcombat::handoff::CombatHandoff;
use cryptcombat::party::AutoPilot;
use cryptcombat::timers::TokioPacer;
use cryptcombat::{Config, EncounterRunner};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Turn-based combat engine
#[derive(Parser, Debug)]
#[command(name = "cryptcombat", version, about = "Run a combat encounter from a handoff file")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Combat handoff JSON from the exploration layer
    #[arg(long)]
    handoff: PathBuf,

    /// Catalog directory (overrides the config file)
    #[arg(long)]
    catalog_dir: Option<PathBuf>,

    /// RNG seed for a reproducible fight
    #[arg(long)]
    seed: Option<u64>,

    /// Skip presentation delays
    #[arg(long)]
    no_pacing: bool,

    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Auto-pilot flees once the player's HP ratio drops below this
    #[arg(long)]
    flee_below: Option<f64>,

    /// Write the combat result here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cryptcombat=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    // Logs go to stderr so the result JSON can own stdout
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let mut config = Config::load(args.config.as_deref())?;
    if args.catalog_dir.is_some() {
        config.catalog_dir = args.catalog_dir.clone();
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if args.no_pacing {
        config.pacing.enabled = false;
    }

    let catalog = Arc::new(config.load_catalog()?);
    let handoff = CombatHandoff::load(&args.handoff)
        .with_context(|| format!("Failed to load handoff {}", args.handoff.display()))?;
    let session = config.session(&handoff, catalog)?;

    let mut runner = EncounterRunner::new(session, TokioPacer::new(config.pacing.clone()));
    let mut autopilot = AutoPilot::new(args.flee_below);
    let result = runner.run(&mut autopilot).await?;
    info!(
        "{} after {} rounds, {} XP awarded",
        result.outcome, result.rounds, result.xp_awarded
    );

    let json = serde_json::to_string_pretty(&result)?;
    match &args.output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{}", json),
    }

    Ok(())
}

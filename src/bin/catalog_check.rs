//! catalog_check - One-shot catalog consistency check
//!
//! Loads a catalog directory (or the built-in catalog) and reports dangling
//! references. Exits non-zero when anything is wrong.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use cryptcombat::catalog::{validate, Catalog};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Catalog consistency checker
#[derive(Parser, Debug)]
#[command(name = "catalog_check", version, about = "Check a combat catalog for broken references")]
struct Args {
    /// Directory with abilities.json, status_effects.json, enemies.json and summons.json
    #[arg(short, long)]
    dir: Option<PathBuf>,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cryptcombat=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let catalog = match &args.dir {
        Some(dir) => Catalog::load_dir(dir)
            .with_context(|| format!("Failed to load {}", dir.display()))?,
        None => Catalog::builtin().context("Failed to load built-in catalog")?,
    };
    info!(
        "Loaded {} abilities, {} statuses, {} enemies, {} summons",
        catalog.abilities().count(),
        catalog.statuses().count(),
        catalog.enemies().count(),
        catalog.summons().count()
    );

    let issues = validate(&catalog);
    if issues.is_empty() {
        println!("catalog ok");
        return Ok(ExitCode::SUCCESS);
    }
    for issue in &issues {
        println!("{}", issue);
    }
    println!("{} problem(s)", issues.len());
    Ok(ExitCode::FAILURE)
}

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use sd_core::DitherConfig;

pub mod cli;
pub mod hotreload;
pub mod search;
pub mod simulate;

fn main() -> Result<()> {
    // 1. Parser CLI
    let cli = cli::Cli::parse();

    // 2. Initialiser le logging
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn))
        .init();

    // 3. Charger la config
    let config = resolve_config(&cli.config)?;

    // 4. Sous-commande
    match cli.command {
        cli::Command::Search(ref args) => search::run(args, &config),
        cli::Command::Simulate(ref args) => simulate::run(args, &cli.config, config),
    }
}

/// Config file if present, defaults otherwise.
fn resolve_config(path: &Path) -> Result<DitherConfig> {
    if path.exists() {
        sd_core::config::load_config(path)
    } else {
        log::warn!("Config introuvable : {}. Utilisation des défauts.", path.display());
        Ok(DitherConfig::default())
    }
}

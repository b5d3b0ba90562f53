#[macro_use]
extern crate log;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use town_splitter::config::Config;

/// Splits municipal GeoJSON datasets into one file per town.
#[derive(Parser)]
#[command(name = "town-splitter", version)]
struct Args {
    /// JSON file describing the town layer and the datasets to split.
    /// Without it the built-in dataset table is used.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory the built-in dataset paths resolve against.
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,

    /// Town boundary GeoJSON, overriding the config.
    #[arg(long)]
    towns: Option<PathBuf>,

    /// Property holding the town name, overriding the config.
    #[arg(long)]
    town_column: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::builtin(&args.base_dir),
    };
    if let Some(towns) = args.towns {
        config.towns = towns;
    }
    if let Some(town_column) = args.town_column {
        config.town_column = town_column;
    }

    let summary = town_splitter::run(&config)?;
    info!(
        "done: {} datasets split across {} towns ({} skipped), {} files written",
        summary.datasets_processed, summary.towns, summary.datasets_skipped, summary.files_written
    );
    Ok(())
}

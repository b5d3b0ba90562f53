//! Splits municipal GeoJSON datasets into one file per town.
//!
//! The town boundary layer is dissolved into one polygon per town name, then
//! every configured dataset is joined to the towns by intersection and each
//! town's matches are written to their own file under the dataset's output
//! directory.

#[macro_use]
extern crate log;

pub mod config;
pub mod crs;
pub mod io;
pub mod split;
pub mod towns;

use anyhow::Result;

use crate::config::Config;
use crate::towns::TownIndex;

#[derive(Debug, Default)]
pub struct RunSummary {
    pub towns: usize,
    pub datasets_processed: usize,
    pub datasets_skipped: usize,
    pub files_written: usize,
}

/// Runs every configured dataset against the town layer. Datasets whose
/// input file is missing are skipped; any other failure aborts the run.
pub fn run(config: &Config) -> Result<RunSummary> {
    let towns = TownIndex::load(&config.towns, &config.town_column)?;
    info!("{} towns in {}", towns.len(), config.towns.display());

    let mut summary = RunSummary {
        towns: towns.len(),
        ..RunSummary::default()
    };
    for dataset in &config.datasets {
        let outcome = split::split_dataset(&towns, dataset, &config.town_column)?;
        if outcome.skipped {
            summary.datasets_skipped += 1;
        } else {
            summary.datasets_processed += 1;
        }
        summary.files_written += outcome.files_written;
    }
    Ok(summary)
}

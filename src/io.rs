use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{bail, Context, Result};
use fs_err::File;
use geojson::{FeatureCollection, GeoJson};

pub fn read_collection(path: &Path) -> Result<FeatureCollection> {
    let file = File::open(path)?;
    let geojson = GeoJson::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing {}", path.display()))?;
    match geojson {
        GeoJson::FeatureCollection(collection) => Ok(collection),
        _ => bail!("{} is not a FeatureCollection", path.display()),
    }
}

pub fn write_collection(path: &Path, collection: &FeatureCollection) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), collection)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Town names become file names; separators and spaces get flattened.
pub fn safe_file_name(town: &str) -> String {
    town.replace('/', "_").replace('\\', "_").replace(' ', "_")
}

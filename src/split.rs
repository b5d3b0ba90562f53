use std::collections::BTreeMap;

use anyhow::{Context, Result};
use geo::Geometry;
use geojson::{Feature, FeatureCollection};
use proj::{Proj, Transform};
use serde_json::Value;

use crate::config::DatasetConfig;
use crate::crs::{self, Crs};
use crate::io;
use crate::towns::TownIndex;

/// What one dataset pass did, for the end-of-run summary.
#[derive(Debug, Default)]
pub struct SplitOutcome {
    pub files_written: usize,
    pub features_matched: usize,
    pub skipped: bool,
}

/// Splits one dataset by town boundary: load, align the CRS, join features
/// to towns by intersection, write one file per town. A missing input file
/// is the only failure this recovers from.
pub fn split_dataset(
    towns: &TownIndex,
    dataset: &DatasetConfig,
    town_column: &str,
) -> Result<SplitOutcome> {
    if !dataset.input.exists() {
        warn!(
            "[{}] {}: {} not found, skipping",
            dataset.key,
            dataset.label,
            dataset.input.display()
        );
        return Ok(SplitOutcome {
            skipped: true,
            ..SplitOutcome::default()
        });
    }

    info!("[{}] {}: loading {}", dataset.key, dataset.label, dataset.input.display());
    let collection = io::read_collection(&dataset.input)?;
    if collection.features.is_empty() {
        warn!("[{}] {}: input is empty", dataset.key, dataset.label);
        return Ok(SplitOutcome::default());
    }

    let source_crs = Crs::of_collection(&collection)
        .with_context(|| format!("{}", dataset.input.display()))?;
    let transformer = if source_crs == *towns.crs() {
        None
    } else {
        info!(
            "[{}] {}: reprojecting {} -> {}",
            dataset.key, dataset.label, source_crs, towns.crs()
        );
        Some(crs::transformer(&source_crs, towns.crs())?)
    };

    let (groups, features_matched) =
        group_by_town(towns, collection.features, town_column, transformer.as_ref())
            .with_context(|| format!("{}", dataset.input.display()))?;
    if groups.is_empty() {
        warn!(
            "[{}] {}: no feature intersects any town",
            dataset.key, dataset.label
        );
        return Ok(SplitOutcome::default());
    }

    fs_err::create_dir_all(&dataset.out_dir)?;
    let mut files_written = 0;
    for (town, features) in groups {
        let count = features.len();
        let out_path = dataset
            .out_dir
            .join(format!("{}.geojson", io::safe_file_name(&town)));
        let collection = FeatureCollection {
            bbox: None,
            features,
            foreign_members: towns.crs().foreign_members(),
        };
        io::write_collection(&out_path, &collection)?;
        files_written += 1;
        info!(
            "[{}] {} / {}: {} features -> {}",
            dataset.key,
            dataset.label,
            town,
            count,
            out_path.display()
        );
    }

    Ok(SplitOutcome {
        files_written,
        features_matched,
        skipped: false,
    })
}

/// The join itself: every feature lands in the bucket of every town it
/// intersects, stamped with that town's name. Buckets come back in town
/// name order.
fn group_by_town(
    towns: &TownIndex,
    features: Vec<Feature>,
    town_column: &str,
    transformer: Option<&Proj>,
) -> Result<(BTreeMap<String, Vec<Feature>>, usize)> {
    let mut groups: BTreeMap<String, Vec<Feature>> = BTreeMap::new();
    let mut features_matched = 0;
    for feature in features {
        let Some(geometry) = feature.geometry else {
            continue;
        };
        let mut geometry =
            Geometry::<f64>::try_from(geometry.value).context("unsupported geometry")?;
        if let Some(transformer) = transformer {
            geometry
                .transform(transformer)
                .context("reprojection failed")?;
        }
        let matched = towns.matches(&geometry);
        if matched.is_empty() {
            continue;
        }
        features_matched += 1;
        let out_geometry = geojson::Geometry::new(geojson::Value::from(&geometry));
        for town in matched {
            let mut properties = feature.properties.clone().unwrap_or_default();
            properties.insert(town_column.to_string(), Value::String(town.to_string()));
            groups.entry(town.to_string()).or_default().push(Feature {
                bbox: None,
                geometry: Some(out_geometry.clone()),
                id: feature.id.clone(),
                properties: Some(properties),
                foreign_members: None,
            });
        }
    }
    Ok((groups, features_matched))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geojson::GeoJson;

    fn collection(raw: &str) -> FeatureCollection {
        let GeoJson::FeatureCollection(fc) = raw.parse().unwrap() else {
            panic!("expected a FeatureCollection");
        };
        fc
    }

    fn two_towns() -> TownIndex {
        let raw = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {"TOWN": "East"},
             "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]]]}},
            {"type": "Feature", "properties": {"TOWN": "West"},
             "geometry": {"type": "Polygon", "coordinates": [[[-10, 0], [0, 0], [0, 10], [-10, 10], [-10, 0]]]}}
        ]}"#;
        TownIndex::from_collection(collection(raw), "TOWN").unwrap()
    }

    #[test]
    fn features_are_bucketed_and_stamped() {
        let towns = two_towns();
        let features = collection(
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"name": "library"},
                 "geometry": {"type": "Point", "coordinates": [3, 3]}},
                {"type": "Feature", "properties": {"name": "pool"},
                 "geometry": {"type": "Point", "coordinates": [-3, 3]}},
                {"type": "Feature", "properties": {"name": "lighthouse"},
                 "geometry": {"type": "Point", "coordinates": [99, 99]}}
            ]}"#,
        )
        .features;

        let (groups, matched) = group_by_town(&towns, features, "TOWN", None).unwrap();
        assert_eq!(matched, 2);
        assert_eq!(
            groups.keys().collect::<Vec<_>>(),
            vec!["East", "West"]
        );
        let east = &groups["East"];
        assert_eq!(east.len(), 1);
        let properties = east[0].properties.as_ref().unwrap();
        assert_eq!(properties["name"], "library");
        assert_eq!(properties["TOWN"], "East");
    }

    #[test]
    fn straddling_feature_is_written_to_both_towns() {
        let towns = two_towns();
        let features = collection(
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"name": "route 1"},
                 "geometry": {"type": "LineString", "coordinates": [[-5, 5], [5, 5]]}}
            ]}"#,
        )
        .features;

        let (groups, matched) = group_by_town(&towns, features, "TOWN", None).unwrap();
        assert_eq!(matched, 1);
        assert_eq!(groups["East"].len(), 1);
        assert_eq!(groups["West"].len(), 1);
        assert_eq!(
            groups["East"][0].properties.as_ref().unwrap()["TOWN"],
            "East"
        );
        assert_eq!(
            groups["West"][0].properties.as_ref().unwrap()["TOWN"],
            "West"
        );
    }

    #[test]
    fn features_without_geometry_or_match_are_dropped() {
        let towns = two_towns();
        let features = collection(
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"name": "ghost"}, "geometry": null}
            ]}"#,
        )
        .features;

        let (groups, matched) = group_by_town(&towns, features, "TOWN", None).unwrap();
        assert_eq!(matched, 0);
        assert!(groups.is_empty());
    }
}

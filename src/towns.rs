use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use geo::{BooleanOps, BoundingRect, Geometry, Intersects, MultiPolygon};
use geojson::FeatureCollection;
use rstar::{RTree, RTreeObject, AABB};
use serde_json::Value;

use crate::crs::Crs;
use crate::io;

/// One dissolved town boundary, indexable by bounding box.
struct Town {
    name: String,
    boundary: MultiPolygon<f64>,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for Town {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// The dissolved town layer: one boundary per distinct town name, in an
/// r-tree so dataset features only get the precise intersection test
/// against nearby towns.
pub struct TownIndex {
    crs: Crs,
    tree: RTree<Town>,
    count: usize,
}

impl TownIndex {
    pub fn load(path: &Path, town_column: &str) -> Result<TownIndex> {
        let collection = io::read_collection(path)?;
        TownIndex::from_collection(collection, town_column)
            .with_context(|| format!("town layer {}", path.display()))
    }

    pub fn from_collection(collection: FeatureCollection, town_column: &str) -> Result<TownIndex> {
        let crs = Crs::of_collection(&collection)?;
        if collection.features.is_empty() {
            bail!("town layer has no features");
        }

        let mut dissolved: BTreeMap<String, MultiPolygon<f64>> = BTreeMap::new();
        for feature in collection.features {
            let name = feature
                .properties
                .as_ref()
                .and_then(|properties| properties.get(town_column))
                .and_then(property_to_name)
                .ok_or_else(|| anyhow!("feature has no usable '{town_column}' property"))?;
            let geometry = feature
                .geometry
                .ok_or_else(|| anyhow!("town '{name}' has a feature without geometry"))?;
            let geometry = Geometry::<f64>::try_from(geometry.value)
                .with_context(|| format!("town '{name}'"))?;
            let boundary = match geometry {
                Geometry::Polygon(polygon) => MultiPolygon(vec![polygon]),
                Geometry::MultiPolygon(multi) => multi,
                _ => bail!("town '{name}' has non-areal geometry"),
            };
            match dissolved.entry(name) {
                Entry::Vacant(slot) => {
                    slot.insert(boundary);
                }
                Entry::Occupied(mut slot) => {
                    let merged = slot.get().union(&boundary);
                    *slot.get_mut() = merged;
                }
            }
        }

        let towns = dissolved
            .into_iter()
            .map(|(name, boundary)| {
                let rect = boundary
                    .bounding_rect()
                    .ok_or_else(|| anyhow!("town '{name}' has an empty boundary"))?;
                Ok(Town {
                    name,
                    boundary,
                    envelope: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                })
            })
            .collect::<Result<Vec<Town>>>()?;
        let count = towns.len();
        Ok(TownIndex {
            crs,
            tree: RTree::bulk_load(towns),
            count,
        })
    }

    /// Names of every town the geometry intersects, in name order. The
    /// envelope lookup prunes candidates, the precise test decides.
    pub fn matches(&self, geometry: &Geometry<f64>) -> Vec<&str> {
        let Some(rect) = geometry.bounding_rect() else {
            return Vec::new();
        };
        let query = AABB::from_corners(
            [rect.min().x, rect.min().y],
            [rect.max().x, rect.max().y],
        );
        let mut names: Vec<&str> = self
            .tree
            .locate_in_envelope_intersecting(&query)
            .filter(|town| geometry.intersects(&town.boundary))
            .map(|town| town.name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

fn property_to_name(value: &Value) -> Option<String> {
    match value {
        Value::String(name) => Some(name.clone()),
        Value::Number(code) => Some(code.to_string()),
        _ => None,
    }
}

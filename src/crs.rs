use std::fmt;

use anyhow::{anyhow, bail, Context, Result};
use geojson::FeatureCollection;
use proj::Proj;
use serde_json::{json, Map, Value};

/// A coordinate reference system, normalized to its EPSG code.
///
/// GeoJSON files are plain RFC 7946 (always WGS84 longitude/latitude) unless
/// they carry the legacy `crs` foreign member, which the municipal datasets
/// this tool was built for still do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crs {
    code: u32,
}

impl Crs {
    pub const WGS84: Crs = Crs { code: 4326 };

    /// The CRS a FeatureCollection's coordinates are expressed in. No `crs`
    /// member means RFC 7946 applies and the answer is WGS84; a member that
    /// can't be interpreted is an error.
    pub fn of_collection(collection: &FeatureCollection) -> Result<Crs> {
        match collection
            .foreign_members
            .as_ref()
            .and_then(|members| members.get("crs"))
        {
            Some(member) => Crs::from_member(member),
            None => Ok(Crs::WGS84),
        }
    }

    fn from_member(member: &Value) -> Result<Crs> {
        let name = member
            .get("properties")
            .and_then(|properties| properties.get("name"))
            .and_then(|name| name.as_str())
            .ok_or_else(|| anyhow!("crs member has no properties.name: {member}"))?;
        Crs::parse(name)
    }

    /// Accepts `urn:ogc:def:crs:EPSG::6668`, `EPSG:6668` and the CRS84
    /// spellings. CRS84 is what RFC 7946 mandates, so it maps to WGS84.
    pub fn parse(name: &str) -> Result<Crs> {
        let compact = match name.strip_prefix("urn:ogc:def:crs:") {
            // authority:version:code, the version segment is usually empty
            Some(rest) => {
                let parts: Vec<&str> = rest.split(':').collect();
                match parts.as_slice() {
                    [authority, _, code] => format!("{authority}:{code}"),
                    _ => bail!("unsupported CRS urn: {name}"),
                }
            }
            None => name.to_string(),
        };
        if compact == "CRS84" {
            return Ok(Crs::WGS84);
        }
        match compact.split_once(':') {
            Some(("EPSG", code)) => {
                let code = code
                    .parse()
                    .with_context(|| format!("bad EPSG code in {name}"))?;
                Ok(Crs { code })
            }
            Some(("OGC", "CRS84")) => Ok(Crs::WGS84),
            _ => bail!("unsupported CRS definition: {name}"),
        }
    }

    /// The legacy `crs` member for an output collection. WGS84 output stays
    /// bare RFC 7946.
    pub fn foreign_members(&self) -> Option<Map<String, Value>> {
        if *self == Crs::WGS84 {
            return None;
        }
        let mut members = Map::new();
        members.insert(
            "crs".to_string(),
            json!({
                "type": "name",
                "properties": { "name": format!("urn:ogc:def:crs:EPSG::{}", self.code) }
            }),
        );
        Some(members)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.code)
    }
}

/// Transformer taking dataset coordinates into the town layer's system.
/// Only built when the two differ.
pub fn transformer(from: &Crs, to: &Crs) -> Result<Proj> {
    Proj::new_known_crs(&from.to_string(), &to.to_string(), None)
        .with_context(|| format!("no transformation from {from} to {to}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geojson::GeoJson;

    #[test]
    fn parse_spellings() {
        assert_eq!(Crs::parse("EPSG:6668").unwrap(), Crs { code: 6668 });
        assert_eq!(
            Crs::parse("urn:ogc:def:crs:EPSG::6668").unwrap(),
            Crs { code: 6668 }
        );
        assert_eq!(
            Crs::parse("urn:ogc:def:crs:OGC:1.3:CRS84").unwrap(),
            Crs::WGS84
        );
        assert_eq!(Crs::parse("urn:ogc:def:crs:OGC::CRS84").unwrap(), Crs::WGS84);
        assert_eq!(Crs::parse("OGC:CRS84").unwrap(), Crs::WGS84);
        assert_eq!(Crs::parse("CRS84").unwrap(), Crs::WGS84);
    }

    #[test]
    fn reject_unknown_definitions() {
        assert!(Crs::parse("ESRI:102100").is_err());
        assert!(Crs::parse("EPSG:not-a-code").is_err());
        assert!(Crs::parse("wgs84").is_err());
    }

    #[test]
    fn collection_without_member_is_wgs84() {
        let geojson: GeoJson = r#"{"type": "FeatureCollection", "features": []}"#
            .parse()
            .unwrap();
        let GeoJson::FeatureCollection(fc) = geojson else {
            panic!("expected a FeatureCollection");
        };
        assert_eq!(Crs::of_collection(&fc).unwrap(), Crs::WGS84);
    }

    #[test]
    fn collection_with_member() {
        let geojson: GeoJson = r#"{
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::6677"}},
            "features": []
        }"#
        .parse()
        .unwrap();
        let GeoJson::FeatureCollection(fc) = geojson else {
            panic!("expected a FeatureCollection");
        };
        assert_eq!(Crs::of_collection(&fc).unwrap(), Crs { code: 6677 });
    }

    #[test]
    fn malformed_member_is_an_error() {
        let geojson: GeoJson = r#"{
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {}},
            "features": []
        }"#
        .parse()
        .unwrap();
        let GeoJson::FeatureCollection(fc) = geojson else {
            panic!("expected a FeatureCollection");
        };
        assert!(Crs::of_collection(&fc).is_err());
    }

    #[test]
    fn foreign_members_round_trip() {
        let crs = Crs::parse("EPSG:6668").unwrap();
        let members = crs.foreign_members().unwrap();
        assert_eq!(Crs::from_member(&members["crs"]).unwrap(), crs);
        assert!(Crs::WGS84.foreign_members().is_none());
    }
}

//! GeoJSON-like feature collection input.
//!
//! Only `features[].geometry` is read. Feature `type`, `properties` and
//! geometry `bbox` members are tolerated and ignored, so both strict GeoJSON
//! and the minimal `{ "features": [ { "geometry": ... } ] }` form load.
//!
//! Geometries are kept as raw JSON until [`FeatureCollection::geometries`]
//! is called. That way one malformed feature is reported with its index
//! instead of failing the whole document parse.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{StitchError, StitchResult};

/// A longitude/latitude position. Extra members (altitude) are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "[f64; 2]")]
pub struct Position {
    pub lon: f64,
    pub lat: f64,
}

impl Position {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

impl TryFrom<Vec<f64>> for Position {
    type Error = String;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        match values.as_slice() {
            [lon, lat, ..] => Ok(Self::new(*lon, *lat)),
            _ => Err(format!(
                "position needs at least 2 values, got {}",
                values.len()
            )),
        }
    }
}

impl From<Position> for [f64; 2] {
    fn from(position: Position) -> Self {
        [position.lon, position.lat]
    }
}

/// Geometry types accepted by the coverage resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Position),
    MultiPoint(Vec<Position>),
    LineString(Vec<Position>),
    MultiLineString(Vec<Vec<Position>>),
    Polygon(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

impl Geometry {
    /// GeoJSON type name of this geometry.
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::MultiPoint(_) => "MultiPoint",
            Geometry::LineString(_) => "LineString",
            Geometry::MultiLineString(_) => "MultiLineString",
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPolygon(_) => "MultiPolygon",
        }
    }
}

/// One input feature.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub geometry: Option<Value>,
}

/// Ordered, immutable collection of input features.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Builds a collection from typed geometries.
    pub fn from_geometries(geometries: impl IntoIterator<Item = Geometry>) -> Self {
        let features = geometries
            .into_iter()
            .map(|geometry| Feature {
                geometry: serde_json::to_value(geometry).ok(),
            })
            .collect();
        Self { features }
    }

    /// Parses a collection from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Loads a collection from a file.
    pub fn load(path: &Path) -> StitchResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| StitchError::InvalidInput {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_json(&content).map_err(|e| StitchError::InvalidInput {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the collection has no features.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Decodes every feature geometry, failing on the first bad one.
    pub fn geometries(&self) -> StitchResult<Vec<Geometry>> {
        self.features
            .iter()
            .enumerate()
            .map(|(index, feature)| {
                let raw = feature
                    .geometry
                    .as_ref()
                    .ok_or_else(|| StitchError::InvalidGeometry {
                        index,
                        reason: "feature has no geometry".to_string(),
                    })?;

                Geometry::deserialize(raw).map_err(|e| StitchError::InvalidGeometry {
                    index,
                    reason: e.to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_collection() {
        let fc = FeatureCollection::from_json(
            r#"{"features":[{"geometry":{"type":"Point","coordinates":[0,0]}}]}"#,
        )
        .unwrap();
        assert_eq!(fc.len(), 1);
        assert_eq!(
            fc.geometries().unwrap(),
            vec![Geometry::Point(Position::new(0.0, 0.0))]
        );
    }

    #[test]
    fn test_strict_geojson_with_extras() {
        let fc = FeatureCollection::from_json(
            r#"{
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "properties": {"name": "ridge"},
                    "geometry": {
                        "type": "LineString",
                        "bbox": [0, 0, 1, 1],
                        "coordinates": [[0, 0, 1200.5], [1, 1, 1300.0]]
                    }
                }]
            }"#,
        )
        .unwrap();
        let geometries = fc.geometries().unwrap();
        assert_eq!(
            geometries,
            vec![Geometry::LineString(vec![
                Position::new(0.0, 0.0),
                Position::new(1.0, 1.0)
            ])]
        );
    }

    #[test]
    fn test_missing_geometry_reports_index() {
        let fc = FeatureCollection::from_json(
            r#"{"features":[
                {"geometry":{"type":"Point","coordinates":[0,0]}},
                {"properties":{}}
            ]}"#,
        )
        .unwrap();
        let err = fc.geometries().unwrap_err();
        assert!(matches!(err, StitchError::InvalidGeometry { index: 1, .. }));
    }

    #[test]
    fn test_unsupported_geometry_type() {
        let fc = FeatureCollection::from_json(
            r#"{"features":[{"geometry":{"type":"GeometryCollection","geometries":[]}}]}"#,
        )
        .unwrap();
        assert!(matches!(
            fc.geometries(),
            Err(StitchError::InvalidGeometry { index: 0, .. })
        ));
    }

    #[test]
    fn test_short_position_rejected() {
        let fc = FeatureCollection::from_json(
            r#"{"features":[{"geometry":{"type":"Point","coordinates":[5]}}]}"#,
        )
        .unwrap();
        let err = fc.geometries().unwrap_err();
        assert!(err.to_string().contains("at least 2"));
    }

    #[test]
    fn test_from_geometries_roundtrips() {
        let polygon = Geometry::Polygon(vec![vec![
            Position::new(0.0, 0.0),
            Position::new(1.0, 0.0),
            Position::new(1.0, 1.0),
            Position::new(0.0, 0.0),
        ]]);
        let fc = FeatureCollection::from_geometries([polygon.clone()]);
        assert_eq!(fc.geometries().unwrap(), vec![polygon]);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = FeatureCollection::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, StitchError::InvalidInput { .. }));
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ features: ").unwrap();
        let err = FeatureCollection::load(&path).unwrap_err();
        assert!(matches!(err, StitchError::InvalidInput { .. }));
    }
}

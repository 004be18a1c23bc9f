use crate::core::geo::{LatLng, LatLngBounds};
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// GeoJSON geometry types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeoJsonGeometry {
    Point {
        coordinates: Vec<f64>,
    },
    LineString {
        coordinates: Vec<Vec<f64>>,
    },
    Polygon {
        coordinates: Vec<Vec<Vec<f64>>>,
    },
    MultiPoint {
        coordinates: Vec<Vec<f64>>,
    },
    MultiLineString {
        coordinates: Vec<Vec<Vec<f64>>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Vec<f64>>>>,
    },
    GeometryCollection {
        geometries: Vec<GeoJsonGeometry>,
    },
}

/// GeoJSON feature with geometry and properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoJsonFeature {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    pub geometry: Option<GeoJsonGeometry>,
    #[serde(default)]
    pub properties: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
enum GeoJsonDocument {
    FeatureCollection { features: Vec<GeoJsonFeature> },
}

/// A point of interest: position plus the popup-facing properties
#[derive(Debug, Clone, PartialEq)]
pub struct PointFeature {
    pub lat_lng: LatLng,
    pub name: String,
    pub description: Option<String>,
    pub properties: HashMap<String, serde_json::Value>,
}

impl PointFeature {
    pub fn new(lat_lng: LatLng, name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            lat_lng,
            name: name.into(),
            description,
            properties: HashMap::new(),
        }
    }

    /// `<strong>name</strong>`, plus `<br>description` when the description
    /// has non-whitespace content. Text is inserted verbatim.
    pub fn popup_content(&self) -> String {
        popup_content(&self.name, self.description.as_deref())
    }
}

pub fn popup_content(name: &str, description: Option<&str>) -> String {
    match description {
        Some(desc) if !desc.trim().is_empty() => {
            format!("<strong>{}</strong><br>{}", name, desc)
        }
        _ => format!("<strong>{}</strong>", name),
    }
}

/// The point features of a FeatureCollection, in document order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureCollection {
    pub features: Vec<PointFeature>,
}

impl FeatureCollection {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PointFeature> {
        self.features.iter()
    }

    pub fn bounds(&self) -> Option<LatLngBounds> {
        let points: Vec<LatLng> = self.features.iter().map(|f| f.lat_lng).collect();
        LatLngBounds::from_points(&points)
    }
}

/// Parses a FeatureCollection document.
///
/// Every feature must carry a string `name` property; a feature without one
/// fails the whole document. Features whose geometry is not a Point are
/// skipped.
pub fn parse_feature_collection(bytes: &[u8]) -> Result<FeatureCollection> {
    let GeoJsonDocument::FeatureCollection { features } = serde_json::from_slice(bytes)?;

    let mut points = Vec::with_capacity(features.len());
    for (index, feature) in features.into_iter().enumerate() {
        let properties = feature.properties.unwrap_or_default();

        let name = match properties.get("name") {
            Some(serde_json::Value::String(name)) => name.clone(),
            Some(other) => {
                return Err(MapError::Decode(format!(
                    "feature {} has a non-string name: {}",
                    index, other
                )))
            }
            None => {
                return Err(MapError::Decode(format!(
                    "feature {} has no name property",
                    index
                )))
            }
        };

        let description = match properties.get("description") {
            Some(serde_json::Value::String(desc)) => Some(desc.clone()),
            _ => None,
        };

        let lat_lng = match feature.geometry {
            Some(GeoJsonGeometry::Point { coordinates }) if coordinates.len() >= 2 => {
                LatLng::new(coordinates[1], coordinates[0])
            }
            Some(GeoJsonGeometry::Point { .. }) => {
                return Err(MapError::InvalidCoordinates(format!(
                    "feature {} ({}) has fewer than two coordinates",
                    index, name
                )))
            }
            _ => {
                log::debug!("skipping non-point feature {} ({})", index, name);
                continue;
            }
        };

        points.push(PointFeature {
            lat_lng,
            name,
            description,
            properties,
        });
    }

    Ok(FeatureCollection { features: points })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOULDERS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [-74.1915, 46.027] },
                "properties": { "name": "Boulder A", "description": "" }
            },
            {
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [-74.19, 46.028, 312.5] },
                "properties": { "name": "Boulder B", "description": "Crimpy start", "grade": "V4" }
            },
            {
                "type": "Feature",
                "geometry": { "type": "LineString", "coordinates": [[-74.1, 46.0], [-74.2, 46.1]] },
                "properties": { "name": "Approach trail" }
            }
        ]
    }"#;

    #[test]
    fn test_parse_points_in_order() {
        let collection = parse_feature_collection(BOULDERS.as_bytes()).unwrap();
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.features[0].name, "Boulder A");
        assert_eq!(collection.features[0].lat_lng, LatLng::new(46.027, -74.1915));
        assert_eq!(collection.features[1].properties["grade"], "V4");
    }

    #[test]
    fn test_popup_content() {
        let collection = parse_feature_collection(BOULDERS.as_bytes()).unwrap();
        assert_eq!(collection.features[0].popup_content(), "<strong>Boulder A</strong>");
        assert_eq!(
            collection.features[1].popup_content(),
            "<strong>Boulder B</strong><br>Crimpy start"
        );
    }

    #[test]
    fn test_blank_descriptions_are_omitted() {
        assert_eq!(popup_content("X", None), "<strong>X</strong>");
        assert_eq!(popup_content("X", Some("")), "<strong>X</strong>");
        assert_eq!(popup_content("X", Some(" \t\n ")), "<strong>X</strong>");
        assert_eq!(popup_content("X", Some(" sit start ")), "<strong>X</strong><br> sit start ");
    }

    #[test]
    fn test_missing_name_is_an_error() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "geometry": { "type": "Point", "coordinates": [0, 0] }, "properties": {} }
            ]
        }"#;
        assert!(matches!(
            parse_feature_collection(json.as_bytes()),
            Err(MapError::Decode(_))
        ));
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(
            parse_feature_collection(b"not json"),
            Err(MapError::Serialization(_))
        ));
        assert!(parse_feature_collection(br#"{"type": "Point", "coordinates": [0, 0]}"#).is_err());
    }

    #[test]
    fn test_empty_collection() {
        let collection =
            parse_feature_collection(br#"{"type": "FeatureCollection", "features": []}"#).unwrap();
        assert!(collection.is_empty());
        assert!(collection.bounds().is_none());
    }
}

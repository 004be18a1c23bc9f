//! Mapbox Vector Tile decoding
//!
//! Tiles are decoded with geozero's protobuf bindings. Geometry command
//! streams are expanded into `geo-types` geometries in tile-local units
//! (`0..extent`, y pointing down).

use crate::{MapError, Result};
use geo_types::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use geozero::mvt::tile::{self, GeomType};
use geozero::mvt::{Message, Tile};
use std::collections::HashMap;

pub const DEFAULT_EXTENT: u32 = 4096;

const CMD_MOVE_TO: u32 = 1;
const CMD_LINE_TO: u32 = 2;
const CMD_CLOSE_PATH: u32 = 7;

/// One decoded feature of one tile layer
#[derive(Debug, Clone, PartialEq)]
pub struct VectorFeature {
    /// Name of the tile layer the feature belongs to
    pub layer: String,
    pub id: Option<u64>,
    pub properties: HashMap<String, serde_json::Value>,
    pub geometry: Option<Geometry<f64>>,
    pub extent: u32,
}

impl VectorFeature {
    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }

    /// Position of a tile-local coordinate as a fraction of the tile
    pub fn tile_fraction(&self, coord: Coord<f64>) -> (f64, f64) {
        let extent = self.extent.max(1) as f64;
        (coord.x / extent, coord.y / extent)
    }
}

fn zigzag(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

fn property_value(value: &tile::Value) -> serde_json::Value {
    if let Some(s) = &value.string_value {
        serde_json::Value::from(s.clone())
    } else if let Some(f) = value.float_value {
        serde_json::Value::from(f as f64)
    } else if let Some(d) = value.double_value {
        serde_json::Value::from(d)
    } else if let Some(i) = value.int_value {
        serde_json::Value::from(i)
    } else if let Some(u) = value.uint_value {
        serde_json::Value::from(u)
    } else if let Some(s) = value.sint_value {
        serde_json::Value::from(s)
    } else if let Some(b) = value.bool_value {
        serde_json::Value::from(b)
    } else {
        serde_json::Value::Null
    }
}

/// Expands a command stream into its paths. Each MoveTo starts a new path;
/// ClosePath repeats the path's first vertex.
fn decode_paths(commands: &[u32]) -> Result<Vec<Vec<Coord<f64>>>> {
    let mut paths: Vec<Vec<Coord<f64>>> = Vec::new();
    let (mut x, mut y) = (0i32, 0i32);
    let mut i = 0;

    while i < commands.len() {
        let command = commands[i];
        let id = command & 0x7;
        let count = (command >> 3) as usize;
        i += 1;

        match id {
            CMD_MOVE_TO | CMD_LINE_TO => {
                if i + count * 2 > commands.len() {
                    return Err(MapError::VectorTile(
                        "geometry command runs past the end of the stream".to_string(),
                    ));
                }
                for _ in 0..count {
                    x = x.checked_add(zigzag(commands[i])).ok_or_else(cursor_overflow)?;
                    y = y.checked_add(zigzag(commands[i + 1])).ok_or_else(cursor_overflow)?;
                    i += 2;
                    let coord = Coord {
                        x: x as f64,
                        y: y as f64,
                    };
                    if id == CMD_MOVE_TO {
                        paths.push(vec![coord]);
                    } else {
                        match paths.last_mut() {
                            Some(path) => path.push(coord),
                            None => {
                                return Err(MapError::VectorTile(
                                    "LineTo before MoveTo".to_string(),
                                ))
                            }
                        }
                    }
                }
            }
            CMD_CLOSE_PATH => {
                if let Some(path) = paths.last_mut() {
                    if let Some(first) = path.first().copied() {
                        path.push(first);
                    }
                }
            }
            other => {
                return Err(MapError::VectorTile(format!(
                    "unknown geometry command {}",
                    other
                )))
            }
        }
    }

    Ok(paths)
}

fn cursor_overflow() -> MapError {
    MapError::VectorTile("geometry cursor overflows i32".to_string())
}

/// Shoelace sum; positive for clockwise rings in y-down tile space
fn signed_area(ring: &[Coord<f64>]) -> f64 {
    ring.windows(2)
        .map(|w| w[0].x * w[1].y - w[1].x * w[0].y)
        .sum::<f64>()
        / 2.0
}

fn build_geometry(geom_type: GeomType, commands: &[u32]) -> Result<Option<Geometry<f64>>> {
    let paths = decode_paths(commands)?;
    if paths.is_empty() {
        return Ok(None);
    }

    let geometry = match geom_type {
        GeomType::Point => {
            let points: Vec<Point<f64>> = paths.into_iter().flatten().map(Point::from).collect();
            if points.len() == 1 {
                Geometry::Point(points[0])
            } else {
                Geometry::MultiPoint(MultiPoint(points))
            }
        }
        GeomType::Linestring => {
            let mut lines: Vec<LineString<f64>> = paths.into_iter().map(LineString).collect();
            if lines.len() == 1 {
                Geometry::LineString(lines.remove(0))
            } else {
                Geometry::MultiLineString(MultiLineString(lines))
            }
        }
        GeomType::Polygon => {
            // Exterior rings are clockwise; each following counter-clockwise
            // ring is a hole of the latest exterior
            let mut polygons: Vec<Polygon<f64>> = Vec::new();
            for ring in paths {
                let area = signed_area(&ring);
                if area == 0.0 {
                    continue;
                }
                let ring = LineString(ring);
                match polygons.last_mut() {
                    Some(polygon) if area < 0.0 => polygon.interiors_push(ring),
                    _ => polygons.push(Polygon::new(ring, Vec::new())),
                }
            }
            match polygons.len() {
                0 => return Ok(None),
                1 => Geometry::Polygon(polygons.remove(0)),
                _ => Geometry::MultiPolygon(MultiPolygon(polygons)),
            }
        }
        GeomType::Unknown => return Ok(None),
    };

    Ok(Some(geometry))
}

/// Decodes every feature of every layer in a tile payload
pub fn decode_tile(bytes: &[u8]) -> Result<Vec<VectorFeature>> {
    let tile = Tile::decode(bytes).map_err(|e| MapError::VectorTile(e.to_string()))?;

    let mut features = Vec::new();
    for layer in tile.layers {
        let extent = layer.extent.unwrap_or(DEFAULT_EXTENT);
        for feature in &layer.features {
            let mut properties = HashMap::new();
            for pair in feature.tags.chunks_exact(2) {
                let key = layer.keys.get(pair[0] as usize);
                let value = layer.values.get(pair[1] as usize);
                match (key, value) {
                    (Some(key), Some(value)) => {
                        properties.insert(key.clone(), property_value(value));
                    }
                    _ => log::debug!(
                        "layer {}: tag pair {:?} out of range",
                        layer.name,
                        pair
                    ),
                }
            }

            let geometry = match build_geometry(feature.r#type(), &feature.geometry) {
                Ok(geometry) => geometry,
                Err(err) => {
                    log::debug!("layer {}: skipping geometry: {}", layer.name, err);
                    None
                }
            };

            features.push(VectorFeature {
                layer: layer.name.clone(),
                id: feature.id,
                properties,
                geometry,
                extent,
            });
        }
    }

    Ok(features)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn command(id: u32, count: u32) -> u32 {
        (count << 3) | id
    }

    pub fn zz(value: i32) -> u32 {
        ((value << 1) ^ (value >> 31)) as u32
    }

    /// A tile with one layer holding a point and a square polygon
    pub fn sample_tile() -> Vec<u8> {
        let layer = tile::Layer {
            version: 2,
            name: "boulders".to_string(),
            keys: vec!["id".to_string(), "name".to_string()],
            values: vec![
                tile::Value {
                    string_value: Some("b-1".to_string()),
                    ..Default::default()
                },
                tile::Value {
                    string_value: Some("Boulder A".to_string()),
                    ..Default::default()
                },
                tile::Value {
                    int_value: Some(7),
                    ..Default::default()
                },
            ],
            extent: Some(4096),
            features: vec![
                tile::Feature {
                    id: Some(1),
                    tags: vec![0, 0, 1, 1],
                    r#type: Some(GeomType::Point as i32),
                    geometry: vec![command(CMD_MOVE_TO, 1), zz(25), zz(17)],
                },
                tile::Feature {
                    id: Some(2),
                    tags: vec![0, 2],
                    r#type: Some(GeomType::Polygon as i32),
                    geometry: vec![
                        command(CMD_MOVE_TO, 1),
                        zz(0),
                        zz(0),
                        command(CMD_LINE_TO, 3),
                        zz(10),
                        zz(0),
                        zz(0),
                        zz(10),
                        zz(-10),
                        zz(0),
                        command(CMD_CLOSE_PATH, 1),
                    ],
                },
            ],
        };
        Tile {
            layers: vec![layer],
        }
        .encode_to_vec()
    }
}

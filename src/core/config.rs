//! Viewer configuration
//!
//! Every section carries `#[serde(default)]`, so a JSON file only needs the
//! keys it wants to override. The defaults reproduce the stock composition:
//! Québec orthoimagery base map, slope-shaded DTM overlay, boulder pins, and
//! the ESRI vector overlay switched off.

use crate::core::constants::{
    DEFAULT_CENTER, DEFAULT_MAX_NATIVE_ZOOM, DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM,
    DEFAULT_RASTER_OPACITY, DEFAULT_ZOOM, MAX_TILE_ZOOM,
};
use crate::core::geo::{LatLng, Point};
use crate::rendering::colormap::ColorScaleKind;
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub view: ViewConfig,
    pub base_layer: BaseLayerConfig,
    pub raster: RasterOverlayConfig,
    pub points: PointOverlayConfig,
    pub vector: VectorOverlayConfig,
    pub assets: AssetConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub center: LatLng,
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Initial surface size in pixels
    pub size: Point,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            center: LatLng::new(DEFAULT_CENTER.0, DEFAULT_CENTER.1),
            zoom: DEFAULT_ZOOM,
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            size: Point::new(1200.0, 800.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseLayerConfig {
    pub url: String,
    pub attribution: Option<String>,
    pub subdomains: Vec<String>,
    pub max_native_zoom: u8,
    pub max_zoom: u8,
}

impl Default for BaseLayerConfig {
    fn default() -> Self {
        Self {
            url: "https://servicesmatriciels.mern.gouv.qc.ca/erdas-iws/ogc/wmts/Imagerie_Continue/Imagerie_GQ/default/GoogleMapsCompatibleExt2:epsg:3857/{z}/{y}/{x}.jpg".to_string(),
            attribution: Some("© Gouvernement du Québec".to_string()),
            subdomains: Vec::new(),
            max_native_zoom: DEFAULT_MAX_NATIVE_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM as u8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterOverlayConfig {
    pub enabled: bool,
    pub path: String,
    pub opacity: f32,
    pub color_scale: ColorScaleKind,
    /// Band whose min/max drive the color scale
    pub band: usize,
}

impl Default for RasterOverlayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/data/dtm/morin_heights_dtm_slope.tif".to_string(),
            opacity: DEFAULT_RASTER_OPACITY,
            color_scale: ColorScaleKind::Viridis,
            band: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointOverlayConfig {
    pub enabled: bool,
    pub path: String,
}

impl Default for PointOverlayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/data/all_boulders.geojson".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorOverlayConfig {
    pub enabled: bool,
    pub url: String,
    pub attribution: Option<String>,
    pub interactive: bool,
    /// Feature property used as the feature identity
    pub id_property: String,
    pub max_native_zoom: u8,
}

impl Default for VectorOverlayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "https://basemaps.arcgis.com/arcgis/rest/services/World_Basemap_v2/VectorTileServer/tile/{z}/{y}/{x}.pbf".to_string(),
            attribution: Some("© ESRI".to_string()),
            interactive: true,
            id_property: "id".to_string(),
            max_native_zoom: 16,
        }
    }
}

/// Where static assets (pins, rasters) come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetSource {
    /// Paths are resolved against an HTTP base URL
    Http { base_url: String },
    /// Paths are resolved under a local directory
    Directory { root: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub source: AssetSource,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            source: AssetSource::Http {
                base_url: "http://localhost:5173".to_string(),
            },
            timeout_secs: 30,
            user_agent: concat!("cragmap/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ViewerConfig {
    /// Parses and validates a JSON configuration document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        log::info!("loaded viewer configuration from {}", path.display());
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        let view = &self.view;
        if view.min_zoom > view.max_zoom {
            return Err(MapError::Config(format!(
                "min_zoom {} exceeds max_zoom {}",
                view.min_zoom, view.max_zoom
            )));
        }
        if view.max_zoom > MAX_TILE_ZOOM as f64 {
            return Err(MapError::Config(format!(
                "max_zoom {} exceeds {}",
                view.max_zoom, MAX_TILE_ZOOM
            )));
        }
        let tile_zooms = [
            ("base layer max_zoom", self.base_layer.max_zoom),
            ("base layer max_native_zoom", self.base_layer.max_native_zoom),
            ("vector max_native_zoom", self.vector.max_native_zoom),
        ];
        for (name, zoom) in tile_zooms {
            if zoom > MAX_TILE_ZOOM {
                return Err(MapError::Config(format!(
                    "{} {} exceeds {}",
                    name, zoom, MAX_TILE_ZOOM
                )));
            }
        }
        if self.base_layer.max_native_zoom > self.base_layer.max_zoom {
            return Err(MapError::Config(format!(
                "base layer max_native_zoom {} exceeds max_zoom {}",
                self.base_layer.max_native_zoom, self.base_layer.max_zoom
            )));
        }
        if !(0.0..=1.0).contains(&self.raster.opacity) {
            return Err(MapError::Config(format!(
                "raster opacity {} outside 0..=1",
                self.raster.opacity
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_stock_composition() {
        let config = ViewerConfig::default();
        assert_eq!(config.view.center, LatLng::new(46.027, -74.1915));
        assert_eq!(config.view.zoom, 16.0);
        assert_eq!(config.view.min_zoom, 3.0);
        assert_eq!(config.view.max_zoom, 22.0);
        assert_eq!(config.base_layer.max_native_zoom, 18);
        assert!(config.raster.enabled);
        assert!(config.points.enabled);
        assert!(!config.vector.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ViewerConfig::from_json_str(
            r#"{
                "vector": { "enabled": true },
                "assets": { "source": { "kind": "directory", "root": "./public" } }
            }"#,
        )
        .unwrap();

        assert!(config.vector.enabled);
        assert!(config.vector.url.ends_with("{z}/{y}/{x}.pbf"));
        assert_eq!(
            config.assets.source,
            AssetSource::Directory {
                root: PathBuf::from("./public")
            }
        );
        assert_eq!(config.view.zoom, 16.0);
    }

    #[test]
    fn test_invalid_zoom_bounds_rejected() {
        let result = ViewerConfig::from_json_str(r#"{ "view": { "min_zoom": 10, "max_zoom": 5 } }"#);
        assert!(matches!(result, Err(MapError::Config(_))));

        let result = ViewerConfig::from_json_str(r#"{ "raster": { "opacity": 1.5 } }"#);
        assert!(matches!(result, Err(MapError::Config(_))));
    }

    #[test]
    fn test_zoom_beyond_tile_pyramid_rejected() {
        let result = ViewerConfig::from_json_str(
            r#"{
                "view": { "max_zoom": 64, "zoom": 64 },
                "base_layer": { "max_zoom": 64, "max_native_zoom": 64 }
            }"#,
        );
        assert!(matches!(result, Err(MapError::Config(_))));

        let result = ViewerConfig::from_json_str(
            r#"{ "base_layer": { "max_zoom": 31, "max_native_zoom": 18 } }"#,
        );
        assert!(matches!(result, Err(MapError::Config(_))));

        let result = ViewerConfig::from_json_str(r#"{ "vector": { "max_native_zoom": 40 } }"#);
        assert!(matches!(result, Err(MapError::Config(_))));

        let config = ViewerConfig::from_json_str(
            r#"{ "view": { "max_zoom": 30 }, "base_layer": { "max_zoom": 30, "max_native_zoom": 30 } }"#,
        )
        .unwrap();
        assert_eq!(config.base_layer.max_native_zoom, 30);
    }
}

//! URL-templated raster tile layer

use super::cache::TileCache;
use super::loader::TileLoader;
use super::source::{TileSource, UrlTemplate};
use crate::core::constants::{DEFAULT_MAX_NATIVE_ZOOM, MAX_TILE_ZOOM, TILE_SIZE};
use crate::core::geo::{Point, TileCoord};
use crate::core::map::Map;
use crate::core::viewport::Viewport;
use crate::data::fetch::AssetFetcher;
use crate::layers::base::{LayerProperties, LayerTrait, LayerType};
use crate::rendering::context::{RenderContext, ScreenBounds};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileLayerOptions {
    pub tile_size: u32,
    pub min_zoom: u8,
    pub max_zoom: u8,
    /// Deepest zoom the server has tiles for; deeper views upscale these
    pub max_native_zoom: u8,
    pub attribution: Option<String>,
    pub subdomains: Vec<String>,
    pub opacity: f32,
    pub z_index: i32,
}

impl Default for TileLayerOptions {
    fn default() -> Self {
        Self {
            tile_size: TILE_SIZE,
            min_zoom: 0,
            max_zoom: 22,
            max_native_zoom: DEFAULT_MAX_NATIVE_ZOOM,
            attribution: None,
            subdomains: Vec::new(),
            opacity: 1.0,
            z_index: 1,
        }
    }
}

impl TileLayerOptions {
    /// Zoom of the tiles drawn at view zoom `zoom`, or `None` when the layer
    /// is hidden at that zoom
    pub fn tile_zoom(&self, zoom: f64) -> Option<u8> {
        tile_zoom_for(zoom, self.min_zoom, self.max_zoom, self.max_native_zoom)
    }
}

/// Rounds the view zoom into `[min_zoom, max_native_zoom]`; `None` outside
/// `[min_zoom, max_zoom]`. The native cap wins when the bounds overlap.
pub fn tile_zoom_for(zoom: f64, min_zoom: u8, max_zoom: u8, max_native_zoom: u8) -> Option<u8> {
    if zoom < min_zoom as f64 || zoom > max_zoom as f64 {
        return None;
    }
    let native_cap = max_native_zoom.min(max_zoom).min(MAX_TILE_ZOOM);
    Some(zoom.round().max(min_zoom as f64).min(native_cap as f64) as u8)
}

/// Tiles covering the surface at `tile_zoom`, with their screen rectangles.
///
/// Columns wrap around the antimeridian; rows outside the pyramid are skipped.
pub fn visible_tiles(
    viewport: &Viewport,
    tile_size: u32,
    tile_zoom: u8,
) -> Vec<(TileCoord, ScreenBounds)> {
    if tile_zoom > MAX_TILE_ZOOM {
        return Vec::new();
    }
    let Some(tiles_per_axis) = 1i64.checked_shl(tile_zoom as u32) else {
        return Vec::new();
    };
    let tile_size = tile_size as f64;
    let upscale = 2_f64.powf(viewport.zoom - tile_zoom as f64);
    let (min, max) = viewport.pixel_bounds(tile_zoom as f64);

    let min_x = (min.x / tile_size).floor() as i64;
    let max_x = (max.x / tile_size).ceil() as i64 - 1;
    let min_y = (min.y / tile_size).floor() as i64;
    let max_y = (max.y / tile_size).ceil() as i64 - 1;

    let mut tiles = Vec::new();
    for y in min_y..=max_y {
        if y < 0 || y >= tiles_per_axis {
            continue;
        }
        for x in min_x..=max_x {
            let wrapped_x = x.rem_euclid(tiles_per_axis);
            let origin = Point::new(x as f64 * tile_size, y as f64 * tile_size);
            let top_left = origin.subtract(&min).multiply(upscale);
            let bottom_right = origin
                .add(&Point::new(tile_size, tile_size))
                .subtract(&min)
                .multiply(upscale);
            tiles.push((
                TileCoord::new(wrapped_x as u32, y as u32, tile_zoom),
                (top_left, bottom_right),
            ));
        }
    }
    tiles
}

pub struct TileLayer {
    properties: LayerProperties,
    options: TileLayerOptions,
    template: UrlTemplate,
    loader: TileLoader,
}

impl TileLayer {
    pub fn new(id: String, url_template: &str, options: TileLayerOptions) -> Self {
        Self::with_loader(id, url_template, options, TileLoader::http())
    }

    /// Tile layer fetching through a custom fetcher, e.g. a directory mirror
    pub fn with_fetcher(
        id: String,
        url_template: &str,
        options: TileLayerOptions,
        fetcher: Arc<dyn AssetFetcher>,
    ) -> Self {
        Self::with_loader(
            id,
            url_template,
            options,
            TileLoader::new(fetcher, TileCache::default()),
        )
    }

    fn with_loader(
        id: String,
        url_template: &str,
        options: TileLayerOptions,
        loader: TileLoader,
    ) -> Self {
        let properties = LayerProperties::new(id, "Tiles".to_string(), LayerType::Tile)
            .with_opacity(options.opacity)
            .with_z_index(options.z_index)
            .with_attribution(options.attribution.clone());
        let template = UrlTemplate::new(url_template).with_subdomains(options.subdomains.clone());
        Self {
            properties,
            options,
            template,
            loader,
        }
    }

    pub fn tile_options(&self) -> &TileLayerOptions {
        &self.options
    }

    pub fn template(&self) -> &UrlTemplate {
        &self.template
    }

    pub fn tile_loader(&self) -> &TileLoader {
        &self.loader
    }

    pub fn tile_url(&self, coord: TileCoord) -> String {
        self.template.url(coord)
    }
}

impl LayerTrait for TileLayer {
    crate::impl_layer_trait!(TileLayer, properties);

    fn options(&self) -> serde_json::Value {
        serde_json::to_value(&self.options).unwrap_or(serde_json::Value::Null)
    }

    fn on_add(&mut self, _map: &Map) -> Result<()> {
        log::debug!(
            "tile layer {} added ({})",
            self.properties.id,
            self.template.template()
        );
        Ok(())
    }

    fn on_remove(&mut self, _map: &Map) -> Result<()> {
        self.loader.reset();
        Ok(())
    }

    fn render(&mut self, context: &mut RenderContext, viewport: &Viewport) -> Result<()> {
        let Some(tile_zoom) = self.options.tile_zoom(viewport.zoom) else {
            return Ok(());
        };

        for (coord, bounds) in visible_tiles(viewport, self.options.tile_size, tile_zoom) {
            match self.loader.get(&coord) {
                Some(data) => {
                    context.render_tile(coord, data, bounds, self.properties.opacity)?;
                }
                None => self.loader.request(coord, self.template.url(coord)),
            }
        }
        Ok(())
    }

    fn is_loading(&self) -> bool {
        self.loader.pending_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::LatLng;

    #[test]
    fn test_tile_zoom_caps_at_native() {
        let options = TileLayerOptions {
            max_native_zoom: 18,
            max_zoom: 22,
            ..TileLayerOptions::default()
        };
        assert_eq!(options.tile_zoom(16.0), Some(16));
        assert_eq!(options.tile_zoom(16.6), Some(17));
        assert_eq!(options.tile_zoom(20.0), Some(18));
        assert_eq!(options.tile_zoom(22.0), Some(18));
        assert_eq!(options.tile_zoom(22.5), None);

        let shallow = TileLayerOptions {
            min_zoom: 3,
            ..TileLayerOptions::default()
        };
        assert_eq!(shallow.tile_zoom(2.0), None);
    }

    #[test]
    fn test_tile_zoom_with_min_above_native_cap() {
        let options = TileLayerOptions {
            min_zoom: 10,
            max_native_zoom: 8,
            ..TileLayerOptions::default()
        };
        assert_eq!(options.tile_zoom(12.0), Some(8));
        assert_eq!(options.tile_zoom(9.0), None);
        assert_eq!(tile_zoom_for(40.0, 0, 64, 64), Some(MAX_TILE_ZOOM));
    }

    #[test]
    fn test_zoom_past_pyramid_yields_no_tiles() {
        let viewport = Viewport::with_zoom_limits(
            LatLng::new(46.027, -74.1915),
            64.0,
            Point::new(256.0, 256.0),
            0.0,
            64.0,
        );
        assert!(visible_tiles(&viewport, 256, 64).is_empty());
        assert!(visible_tiles(&viewport, 256, 31).is_empty());
    }

    #[test]
    fn test_visible_tiles_cover_surface() {
        let viewport = Viewport::new(LatLng::new(0.0, 0.0), 1.0, Point::new(500.0, 500.0));
        let tiles = visible_tiles(&viewport, 256, 1);
        assert_eq!(tiles.len(), 4);
        for (coord, (min, max)) in &tiles {
            assert_eq!(coord.z, 1);
            assert!((max.x - min.x - 256.0).abs() < 1e-9);
            assert!(max.x > 0.0 && min.x < 500.0);
            assert!(max.y > 0.0 && min.y < 500.0);
        }
    }

    #[test]
    fn test_upscaled_tiles_grow() {
        let viewport = Viewport::new(LatLng::new(46.027, -74.1915), 20.0, Point::new(800.0, 600.0));
        let tiles = visible_tiles(&viewport, 256, 18);
        assert!(!tiles.is_empty());
        for (coord, (min, max)) in &tiles {
            assert_eq!(coord.z, 18);
            assert!((max.x - min.x - 1024.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_columns_wrap() {
        let viewport = Viewport::new(LatLng::new(0.0, 179.9), 2.0, Point::new(600.0, 300.0));
        let tiles = visible_tiles(&viewport, 256, 2);
        assert!(tiles.iter().any(|(coord, _)| coord.x == 0));
        assert!(tiles.iter().all(|(coord, _)| coord.is_valid()));
    }
}

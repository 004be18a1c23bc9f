//! Color-mapped raster grid overlay
//!
//! The grid is colorized once, when the layer is built: every valid sample
//! goes through the color scale bound to the band's `[min, max]`, and every
//! nodata sample becomes a fully transparent pixel. Rendering then only
//! positions the precomputed image.

use crate::{
    core::{
        constants::DEFAULT_RASTER_OPACITY,
        geo::{LatLng, LatLngBounds},
        viewport::Viewport,
    },
    data::georaster::RasterGrid,
    layers::base::{LayerProperties, LayerTrait, LayerType},
    rendering::{
        colormap::{ColorScale, ColorScaleKind, Rgb},
        context::{RenderContext, RgbaImage},
    },
    MapError, Result,
};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RasterLayerOptions {
    pub opacity: f32,
    pub color_scale: ColorScaleKind,
    /// Band that drives the colors
    pub band: usize,
    pub z_index: i32,
}

impl Default for RasterLayerOptions {
    fn default() -> Self {
        Self {
            opacity: DEFAULT_RASTER_OPACITY,
            color_scale: ColorScaleKind::Viridis,
            band: 0,
            z_index: 20,
        }
    }
}

pub struct RasterLayer {
    properties: LayerProperties,
    grid: Arc<RasterGrid>,
    band: usize,
    scale: ColorScale,
    image: Arc<RgbaImage>,
    bounds: LatLngBounds,
}

impl RasterLayer {
    pub fn new(id: String, grid: Arc<RasterGrid>, options: RasterLayerOptions) -> Result<Self> {
        if options.band >= grid.band_count() {
            return Err(MapError::Layer(format!(
                "band {} requested from a raster with {} band(s)",
                options.band,
                grid.band_count()
            )));
        }
        let bounds = grid.bounds()?;
        let scale = ColorScale::new(options.color_scale)
            .domain(grid.mins[options.band], grid.maxs[options.band]);

        let mut layer = Self {
            properties: LayerProperties::new(id, "Raster".to_string(), LayerType::Raster)
                .with_opacity(options.opacity)
                .with_z_index(options.z_index),
            grid,
            band: options.band,
            scale,
            image: Arc::new(RgbaImage::transparent(0, 0)),
            bounds,
        };
        layer.image = Arc::new(layer.colorize());
        Ok(layer)
    }

    /// Color of a sample, or `None` for nodata
    pub fn pixel_color(&self, value: f64) -> Option<Rgb> {
        if self.grid.is_no_data(value) {
            None
        } else {
            Some(self.scale.color(value))
        }
    }

    fn colorize(&self) -> RgbaImage {
        let mut image = RgbaImage::transparent(self.grid.width as u32, self.grid.height as u32);
        for row in 0..self.grid.height {
            for col in 0..self.grid.width {
                let color = self
                    .grid
                    .value(self.band, col, row)
                    .and_then(|value| self.pixel_color(value));
                if let Some(color) = color {
                    image.set_pixel(col as u32, row as u32, color.to_rgba(255));
                }
            }
        }
        image
    }

    pub fn image(&self) -> &Arc<RgbaImage> {
        &self.image
    }

    pub fn grid(&self) -> &Arc<RasterGrid> {
        &self.grid
    }

    pub fn color_scale(&self) -> &ColorScale {
        &self.scale
    }

    pub fn center(&self) -> LatLng {
        self.bounds.center()
    }
}

impl LayerTrait for RasterLayer {
    crate::impl_layer_trait!(RasterLayer, properties);
    crate::impl_default_options_serialization!(properties);

    fn render(&mut self, context: &mut RenderContext, viewport: &Viewport) -> Result<()> {
        let top_left = viewport.lat_lng_to_pixel(&self.bounds.north_west());
        let bottom_right = viewport.lat_lng_to_pixel(&self.bounds.south_east());
        let screen_bounds = (top_left, bottom_right);
        if !context.is_on_screen(&screen_bounds) {
            return Ok(());
        }
        context.render_image(
            &self.properties.id,
            self.image.clone(),
            screen_bounds,
            self.properties.opacity,
        )
    }

    fn bounds(&self) -> Option<LatLngBounds> {
        Some(self.bounds.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::Point;
    use crate::data::georaster::GeoTransform;

    fn grid() -> Arc<RasterGrid> {
        Arc::new(
            RasterGrid::from_bands(
                2,
                2,
                vec![vec![0.0, 50.0, -9999.0, 100.0]],
                Some(-9999.0),
            )
            .unwrap()
            .with_georeference(GeoTransform::new(-74.20, 46.03, 0.005, -0.005), Some(4326)),
        )
    }

    #[test]
    fn test_no_data_pixels_are_transparent() {
        let layer = RasterLayer::new("dtm".to_string(), grid(), RasterLayerOptions::default()).unwrap();
        let image = layer.image();

        assert_eq!(image.pixel(0, 1)[3], 0);
        assert_eq!(image.pixel(0, 0), [0x44, 0x01, 0x54, 255]);
        assert_eq!(image.pixel(1, 1), [0xfe, 0xe8, 0x25, 255]);
        assert!(layer.pixel_color(-9999.0).is_none());
        assert!(layer.pixel_color(f64::NAN).is_none());
    }

    #[test]
    fn test_default_opacity_and_bounds() {
        let layer = RasterLayer::new("dtm".to_string(), grid(), RasterLayerOptions::default()).unwrap();
        assert_eq!(layer.opacity(), 0.6);
        let bounds = layer.bounds().unwrap();
        assert!((bounds.south_west.lat - 46.02).abs() < 1e-9);
        assert!((bounds.north_east.lng + 74.19).abs() < 1e-9);
        assert_eq!(layer.color_scale().bounds(), (0.0, 100.0));
    }

    #[test]
    fn test_render_positions_image() {
        let mut layer = RasterLayer::new("dtm".to_string(), grid(), RasterLayerOptions::default()).unwrap();
        let viewport = Viewport::new(layer.center(), 14.0, Point::new(800.0, 600.0));
        let mut ctx = RenderContext::new(800, 600);
        layer.render(&mut ctx, &viewport).unwrap();
        assert_eq!(ctx.image_count(), 1);
    }

    #[test]
    fn test_missing_band_or_georeference() {
        let options = RasterLayerOptions {
            band: 3,
            ..RasterLayerOptions::default()
        };
        assert!(RasterLayer::new("dtm".to_string(), grid(), options).is_err());

        let bare = Arc::new(RasterGrid::from_bands(1, 1, vec![vec![1.0]], None).unwrap());
        assert!(RasterLayer::new("dtm".to_string(), bare, RasterLayerOptions::default()).is_err());
    }
}

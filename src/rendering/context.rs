use crate::core::geo::{LatLng, Point, TileCoord};
use crate::Result;
use std::sync::Arc;

/// Screen rectangle as (min, max) corners in container pixels
pub type ScreenBounds = (Point, Point);

/// An RGBA8 image, row-major, `width * height * 4` bytes
#[derive(Debug, Clone, PartialEq)]
pub struct RgbaImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RgbaImage {
    /// A fully transparent image
    pub fn transparent(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
            self.pixels[offset + 3],
        ]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        self.pixels[offset..offset + 4].copy_from_slice(&rgba);
    }
}

/// Commands that can be issued to the render context
#[derive(Debug, Clone)]
pub enum DrawCommand {
    /// Encoded raster tile (JPEG/PNG bytes), drawn scaled into `bounds`
    Tile {
        coord: TileCoord,
        data: Arc<Vec<u8>>,
        bounds: ScreenBounds,
        opacity: f32,
    },
    /// Undecoded vector tile payload, forwarded to the front end as-is
    VectorTile {
        coord: TileCoord,
        data: Arc<Vec<u8>>,
        bounds: ScreenBounds,
        opacity: f32,
    },
    /// Pre-colored image overlay, e.g. a color-mapped raster grid
    Image {
        layer_id: String,
        image: Arc<RgbaImage>,
        bounds: ScreenBounds,
        opacity: f32,
    },
    /// Interactive point marker with optional popup HTML
    Marker {
        layer_id: String,
        marker_id: String,
        position: Point,
        lat_lng: LatLng,
        popup: Option<String>,
    },
}

/// Collects draw commands for one frame; a front end consumes the queue
pub struct RenderContext {
    pub width: u32,
    pub height: u32,
    pub drawing_queue: Vec<DrawCommand>,
}

impl RenderContext {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            drawing_queue: Vec::new(),
        }
    }

    /// Begin a frame
    pub fn begin_frame(&mut self) {
        self.drawing_queue.clear();
    }

    pub fn render_tile(
        &mut self,
        coord: TileCoord,
        data: Arc<Vec<u8>>,
        bounds: ScreenBounds,
        opacity: f32,
    ) -> Result<()> {
        self.drawing_queue.push(DrawCommand::Tile {
            coord,
            data,
            bounds,
            opacity,
        });
        Ok(())
    }

    pub fn render_vector_tile(
        &mut self,
        coord: TileCoord,
        data: Arc<Vec<u8>>,
        bounds: ScreenBounds,
        opacity: f32,
    ) -> Result<()> {
        self.drawing_queue.push(DrawCommand::VectorTile {
            coord,
            data,
            bounds,
            opacity,
        });
        Ok(())
    }

    pub fn render_image(
        &mut self,
        layer_id: &str,
        image: Arc<RgbaImage>,
        bounds: ScreenBounds,
        opacity: f32,
    ) -> Result<()> {
        self.drawing_queue.push(DrawCommand::Image {
            layer_id: layer_id.to_string(),
            image,
            bounds,
            opacity,
        });
        Ok(())
    }

    pub fn render_marker(
        &mut self,
        layer_id: &str,
        marker_id: &str,
        position: Point,
        lat_lng: LatLng,
        popup: Option<&str>,
    ) -> Result<()> {
        self.drawing_queue.push(DrawCommand::Marker {
            layer_id: layer_id.to_string(),
            marker_id: marker_id.to_string(),
            position,
            lat_lng,
            popup: popup.map(str::to_string),
        });
        Ok(())
    }

    /// True when a screen rectangle overlaps the surface
    pub fn is_on_screen(&self, bounds: &ScreenBounds) -> bool {
        let (min, max) = bounds;
        max.x >= 0.0 && max.y >= 0.0 && min.x <= self.width as f64 && min.y <= self.height as f64
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.drawing_queue
    }

    pub fn marker_count(&self) -> usize {
        self.drawing_queue
            .iter()
            .filter(|command| matches!(command, DrawCommand::Marker { .. }))
            .count()
    }

    pub fn tile_count(&self) -> usize {
        self.drawing_queue
            .iter()
            .filter(|command| matches!(command, DrawCommand::Tile { .. }))
            .count()
    }

    pub fn image_count(&self) -> usize {
        self.drawing_queue
            .iter()
            .filter(|command| matches!(command, DrawCommand::Image { .. }))
            .count()
    }
}

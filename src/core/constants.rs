//! Engine-wide defaults, mostly taken from common web-map conventions.

/// Default square tile size in pixels.
pub const TILE_SIZE: u32 = 256;

/// Deepest tile pyramid level; tile columns and rows must fit in a `u32`.
pub const MAX_TILE_ZOOM: u8 = 30;

/// Default tile cache capacity (tiles).
pub const TILE_CACHE_CAPACITY: usize = 512;

/// Programmatic +/- zoom step for `zoom_in`/`zoom_out`.
pub const DEFAULT_ZOOM_DELTA: f64 = 1.0;

/// Marker hit radius in pixels used for click picking.
pub const MARKER_HIT_RADIUS: f64 = 12.0;

/// Default viewer center (Morin-Heights boulder field).
pub const DEFAULT_CENTER: (f64, f64) = (46.027, -74.1915);

/// Default viewer zoom and zoom bounds.
pub const DEFAULT_ZOOM: f64 = 16.0;
pub const DEFAULT_MIN_ZOOM: f64 = 3.0;
pub const DEFAULT_MAX_ZOOM: f64 = 22.0;

/// Highest zoom level served by the base imagery; deeper zooms upscale.
pub const DEFAULT_MAX_NATIVE_ZOOM: u8 = 18;

/// Opacity applied to the elevation overlay.
pub const DEFAULT_RASTER_OPACITY: f32 = 0.6;

use crate::core::constants::TILE_SIZE;
use crate::core::geo::{LatLng, LatLngBounds, Point, EARTH_RADIUS};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// The current view of the map: center, zoom, zoom bounds and surface size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// The center of the map view in geographical coordinates
    pub center: LatLng,
    /// The current zoom level
    pub zoom: f64,
    /// The size of the rendering surface in pixels
    pub size: Point,
    /// The minimum allowed zoom level
    pub min_zoom: f64,
    /// The maximum allowed zoom level
    pub max_zoom: f64,
}

impl Viewport {
    /// Creates a viewport with the default 0..=22 zoom range
    pub fn new(center: LatLng, zoom: f64, size: Point) -> Self {
        Self::with_zoom_limits(center, zoom, size, 0.0, 22.0)
    }

    /// Creates a viewport with explicit zoom bounds; `zoom` is clamped into them.
    /// A `max_zoom` below `min_zoom` is raised to `min_zoom`.
    pub fn with_zoom_limits(
        center: LatLng,
        zoom: f64,
        size: Point,
        min_zoom: f64,
        max_zoom: f64,
    ) -> Self {
        let mut viewport = Self {
            center,
            zoom,
            size,
            min_zoom,
            max_zoom: max_zoom.max(min_zoom),
        };
        viewport.zoom = viewport.limit_zoom(zoom);
        viewport
    }

    /// Sets the center without validation; latitude is only limited to what
    /// Web Mercator can represent
    pub fn set_center(&mut self, center: LatLng) {
        self.center = LatLng::new(LatLng::clamp_lat(center.lat), center.lng);
    }

    /// Sets the zoom level, clamping to the valid range
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = self.limit_zoom(zoom);
    }

    pub fn set_size(&mut self, size: Point) {
        self.size = size;
    }

    pub fn set_zoom_limits(&mut self, min_zoom: f64, max_zoom: f64) {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom.max(min_zoom);
        self.zoom = self.limit_zoom(self.zoom);
    }

    /// Clamps `zoom` into the zoom bounds; the minimum wins if the public
    /// bounds were set out of order
    pub fn limit_zoom(&self, zoom: f64) -> f64 {
        zoom.min(self.max_zoom).max(self.min_zoom)
    }

    /// Scale factor for the current zoom level
    pub fn scale(&self) -> f64 {
        2_f64.powf(self.zoom)
    }

    /// Projects a LatLng to world pixel coordinates (EPSG:3857) at `zoom`,
    /// or at the current zoom when `None`
    pub fn project(&self, lat_lng: &LatLng, zoom: Option<f64>) -> Point {
        let z = zoom.unwrap_or(self.zoom);
        let world = TILE_SIZE as f64 * 2_f64.powf(z);
        let mercator = lat_lng.to_mercator();
        let circumference = 2.0 * PI * EARTH_RADIUS;

        Point::new(
            (mercator.x + PI * EARTH_RADIUS) / circumference * world,
            (PI * EARTH_RADIUS - mercator.y) / circumference * world,
        )
    }

    /// Inverse of [`Viewport::project`]
    pub fn unproject(&self, pixel: &Point, zoom: Option<f64>) -> LatLng {
        let z = zoom.unwrap_or(self.zoom);
        let world = TILE_SIZE as f64 * 2_f64.powf(z);
        let circumference = 2.0 * PI * EARTH_RADIUS;

        let x = pixel.x / world * circumference - PI * EARTH_RADIUS;
        let y = PI * EARTH_RADIUS - pixel.y / world * circumference;

        LatLng::from_mercator(Point::new(x, y))
    }

    /// Converts a geographical coordinate to container pixel coordinates
    pub fn lat_lng_to_pixel(&self, lat_lng: &LatLng) -> Point {
        let offset = self
            .project(lat_lng, None)
            .subtract(&self.project(&self.center, None));
        offset.add(&self.half_size())
    }

    /// Converts container pixel coordinates back to geographical coordinates
    pub fn pixel_to_lat_lng(&self, pixel: &Point) -> LatLng {
        let world = self
            .project(&self.center, None)
            .add(&pixel.subtract(&self.half_size()));
        self.unproject(&world, None)
    }

    /// World pixel bounds (min, max) of the surface at `zoom`
    pub fn pixel_bounds(&self, zoom: f64) -> (Point, Point) {
        let scale = 2_f64.powf(zoom - self.zoom);
        let center = self.project(&self.center, Some(zoom));
        let half = self.half_size().multiply(scale);
        (center.subtract(&half), center.add(&half))
    }

    /// Pans by a drag delta in pixels: content follows the pointer, so the
    /// center moves the opposite way
    pub fn pan(&mut self, delta: Point) {
        let center_px = self.project(&self.center, None);
        let new_center = self.unproject(&center_px.subtract(&delta), None);
        self.set_center(new_center);
    }

    /// Zooms to `zoom`, keeping the geographical point under `focus_point`
    /// stationary when given
    pub fn zoom_to(&mut self, zoom: f64, focus_point: Option<Point>) {
        let new_zoom = self.limit_zoom(zoom);
        if (new_zoom - self.zoom).abs() < 0.001 {
            return;
        }

        match focus_point {
            Some(focus_screen) => {
                let focus_lat_lng = self.pixel_to_lat_lng(&focus_screen);
                self.zoom = new_zoom;
                let drifted = self.lat_lng_to_pixel(&focus_lat_lng);
                self.pan(focus_screen.subtract(&drifted));
            }
            None => self.zoom = new_zoom,
        }
    }

    /// Current surface bounds in geographical coordinates
    pub fn bounds(&self) -> LatLngBounds {
        let nw = self.pixel_to_lat_lng(&Point::new(0.0, 0.0));
        let se = self.pixel_to_lat_lng(&self.size);

        LatLngBounds::new(LatLng::new(se.lat, nw.lng), LatLng::new(nw.lat, se.lng))
    }

    /// Centers on `bounds` and picks the deepest integer zoom at which they fit
    /// inside the surface minus `padding` pixels on every side
    pub fn fit_bounds(&mut self, bounds: &LatLngBounds, padding: Option<f64>) {
        let padding = padding.unwrap_or(20.0);
        let available = Point::new(
            (self.size.x - 2.0 * padding).max(1.0),
            (self.size.y - 2.0 * padding).max(1.0),
        );

        let mut best_zoom = self.min_zoom;
        for test_zoom in (self.min_zoom.ceil() as i32)..=(self.max_zoom.floor() as i32) {
            let zoom = test_zoom as f64;
            let nw = self.project(&bounds.north_west(), Some(zoom));
            let se = self.project(&bounds.south_east(), Some(zoom));

            if (se.x - nw.x).abs() <= available.x && (se.y - nw.y).abs() <= available.y {
                best_zoom = zoom;
            } else {
                break;
            }
        }

        self.set_center(bounds.center());
        self.set_zoom(best_zoom);
    }

    /// Resolution in meters per pixel at the current zoom, at the equator
    pub fn resolution(&self) -> f64 {
        2.0 * PI * EARTH_RADIUS / (TILE_SIZE as f64 * self.scale())
    }

    fn half_size(&self) -> Point {
        self.size.multiply(0.5)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(LatLng::new(0.0, 0.0), 0.0, Point::new(800.0, 600.0))
    }
}

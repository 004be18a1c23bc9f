//! # cragmap
//!
//! A small, Rust-native map viewer for bouldering areas.
//!
//! The crate composes a handful of layers over one shared map surface:
//! a URL-templated raster base map, an optional Mapbox Vector Tile overlay,
//! a GeoTIFF elevation overlay colored through a continuous color scale, and
//! a GeoJSON pin layer with popups. Rendering is headless: layers push
//! [`rendering::context::DrawCommand`]s that a front end (see `cragmap-app`)
//! turns into pixels.

pub mod core;
pub mod data;
pub mod layers;
pub mod overlays;
pub mod prelude;
pub mod rendering;
pub mod runtime;
pub mod viewer;

pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    config::ViewerConfig,
    geo::{LatLng, LatLngBounds, Point, TileCoord},
    map::{Map, MapHandle, MapOptions, WeakMapHandle},
    viewport::Viewport,
};

pub use crate::layers::{
    base::LayerTrait, geojson::GeoJsonLayer, marker::Marker, raster::RasterLayer,
    tile::TileLayer,
};

#[cfg(feature = "vector-tiles")]
pub use crate::layers::vector_tile::VectorTileLayer;

pub use overlays::{LoadState, Overlay};
pub use viewer::Viewer;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    Http { status: u16, url: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Vector tile error: {0}")]
    VectorTile(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Unsupported projection: EPSG:{0}")]
    UnsupportedProjection(u16),

    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("Layer error: {0}")]
    Layer(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lock poisoned: {0}")]
    Lock(String),
}

/// Error type alias for convenience
pub type Error = MapError;

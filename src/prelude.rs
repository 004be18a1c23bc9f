//! Common cragmap types and traits
//!
//! `use cragmap::prelude::*;` brings in what a front end needs to mount a
//! viewer, drive the map and consume draw commands.

pub use crate::core::{
    config::{AssetConfig, AssetSource, ViewerConfig},
    geo::{LatLng, LatLngBounds, Point, TileCoord},
    map::{Map, MapHandle, MapOptions, WeakMapHandle},
    viewport::Viewport,
};

pub use crate::data::{
    fetch::{AssetFetcher, DirectoryFetcher, HttpFetcher},
    geojson::{FeatureCollection, PointFeature},
    georaster::RasterGrid,
};

pub use crate::layers::{
    base::{LayerTrait, LayerType},
    geojson::GeoJsonLayer,
    marker::Marker,
    raster::{RasterLayer, RasterLayerOptions},
    tile::{TileLayer, TileLayerOptions, UrlTemplate},
};

#[cfg(feature = "vector-tiles")]
pub use crate::layers::vector_tile::{VectorTileLayer, VectorTileOptions};

pub use crate::overlays::{LoadState, Overlay, PointFeatureOverlay, RasterOverlay};

#[cfg(feature = "vector-tiles")]
pub use crate::overlays::VectorOverlay;

pub use crate::rendering::{
    colormap::{ColorScale, ColorScaleKind},
    context::{DrawCommand, RenderContext},
};

pub use crate::viewer::Viewer;
pub use crate::{MapError, Result};

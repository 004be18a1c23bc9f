pub mod base;
pub mod geojson;
pub mod macros;
pub mod manager;
pub mod marker;
pub mod raster;
pub mod tile;
#[cfg(feature = "vector-tiles")]
pub mod vector_tile;

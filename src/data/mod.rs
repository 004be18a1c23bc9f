//! Asset fetching and decoding: GeoJSON points, GeoTIFF rasters, vector tiles

pub mod fetch;
pub mod geojson;
pub mod georaster;
#[cfg(feature = "vector-tiles")]
pub mod mvt;

pub use fetch::{AssetFetcher, DirectoryFetcher, HttpFetcher};
pub use geojson::{parse_feature_collection, FeatureCollection, PointFeature};
pub use georaster::{parse_georaster, GeoTransform, RasterGrid};

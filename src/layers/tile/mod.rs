//! Slippy-map tile layers
//!
//! A [`TileLayer`] turns the viewport into a set of visible tile
//! coordinates, draws the ones already in its [`TileCache`], and hands the
//! rest to its [`TileLoader`].

pub mod cache;
pub mod layer;
pub mod loader;
pub mod source;

pub use cache::TileCache;
pub use layer::{visible_tiles, TileLayer, TileLayerOptions};
pub use loader::TileLoader;
pub use source::{TileSource, UrlTemplate};

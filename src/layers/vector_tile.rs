//! Mapbox Vector Tile layer
//!
//! Tiles are fetched like raster tiles. When a tile is first drawn its
//! payload is decoded once to drive the per-feature callbacks, and the raw
//! bytes go to the renderer unchanged.

use crate::core::constants::TILE_SIZE;
use crate::core::geo::TileCoord;
use crate::core::map::Map;
use crate::core::viewport::Viewport;
use crate::data::fetch::AssetFetcher;
use crate::data::mvt::{decode_tile, VectorFeature};
use crate::layers::base::{LayerProperties, LayerTrait, LayerType};
use crate::layers::tile::layer::tile_zoom_for;
use crate::layers::tile::{visible_tiles, TileCache, TileLoader, TileSource, UrlTemplate};
use crate::rendering::context::RenderContext;
use crate::Result;
use fxhash::FxHashSet;
use std::sync::Arc;

/// Extracts a feature's identity
pub type FeatureIdFn = Arc<dyn Fn(&VectorFeature) -> Option<String> + Send + Sync>;

/// Per-feature setup hook, called with the feature and its identity
pub type FeatureSetupFn = Arc<dyn Fn(&VectorFeature, Option<&str>) + Send + Sync>;

/// Identity from a feature property, falling back to the MVT feature id
pub fn property_feature_id(property: impl Into<String>) -> FeatureIdFn {
    let property = property.into();
    Arc::new(move |feature: &VectorFeature| {
        match feature.property(&property) {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Null) | None => feature.id.map(|id| id.to_string()),
            Some(other) => Some(other.to_string()),
        }
    })
}

/// Setup hook that only logs the feature
pub fn log_feature() -> FeatureSetupFn {
    Arc::new(|feature: &VectorFeature, id: Option<&str>| {
        log::debug!(
            "feature {} in layer {}: {:?}",
            id.unwrap_or("<none>"),
            feature.layer,
            feature.properties
        );
    })
}

#[derive(Clone)]
pub struct VectorTileOptions {
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub max_native_zoom: u8,
    pub attribution: Option<String>,
    pub interactive: bool,
    pub opacity: f32,
    pub z_index: i32,
    pub get_feature_id: FeatureIdFn,
    pub on_each_feature: FeatureSetupFn,
}

impl Default for VectorTileOptions {
    fn default() -> Self {
        Self {
            min_zoom: 0,
            max_zoom: 22,
            max_native_zoom: 16,
            attribution: None,
            interactive: true,
            opacity: 1.0,
            z_index: 10,
            get_feature_id: property_feature_id("id"),
            on_each_feature: log_feature(),
        }
    }
}

impl std::fmt::Debug for VectorTileOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorTileOptions")
            .field("min_zoom", &self.min_zoom)
            .field("max_zoom", &self.max_zoom)
            .field("max_native_zoom", &self.max_native_zoom)
            .field("attribution", &self.attribution)
            .field("interactive", &self.interactive)
            .finish_non_exhaustive()
    }
}

pub struct VectorTileLayer {
    properties: LayerProperties,
    options: VectorTileOptions,
    template: UrlTemplate,
    loader: TileLoader,
    /// Tiles whose features have been through the callbacks
    processed: FxHashSet<TileCoord>,
}

impl VectorTileLayer {
    pub fn new(id: String, url_template: &str, options: VectorTileOptions) -> Self {
        Self::with_loader(id, url_template, options, TileLoader::http())
    }

    pub fn with_fetcher(
        id: String,
        url_template: &str,
        options: VectorTileOptions,
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
        options: VectorTileOptions,
        loader: TileLoader,
    ) -> Self {
        let mut properties =
            LayerProperties::new(id, "Vector tiles".to_string(), LayerType::VectorTile)
                .with_opacity(options.opacity)
                .with_z_index(options.z_index)
                .with_attribution(options.attribution.clone());
        properties.interactive = options.interactive;

        Self {
            properties,
            options,
            template: UrlTemplate::new(url_template),
            loader,
            processed: FxHashSet::default(),
        }
    }

    fn tile_zoom(&self, zoom: f64) -> Option<u8> {
        tile_zoom_for(
            zoom,
            self.options.min_zoom,
            self.options.max_zoom,
            self.options.max_native_zoom,
        )
    }

    /// Runs the identity and setup callbacks over every feature of a tile
    fn process_tile(&self, coord: TileCoord, data: &[u8]) {
        match decode_tile(data) {
            Ok(features) => {
                log::trace!("vector tile {}: {} feature(s)", coord, features.len());
                for feature in &features {
                    let id = (self.options.get_feature_id)(feature);
                    (self.options.on_each_feature)(feature, id.as_deref());
                }
            }
            Err(err) => log::warn!("vector tile {} could not be decoded: {}", coord, err),
        }
    }

    pub fn processed_tiles(&self) -> usize {
        self.processed.len()
    }
}

impl LayerTrait for VectorTileLayer {
    crate::impl_layer_trait!(VectorTileLayer, properties);
    crate::impl_default_options_serialization!(properties);

    fn on_remove(&mut self, _map: &Map) -> Result<()> {
        self.loader.reset();
        self.processed.clear();
        Ok(())
    }

    fn render(&mut self, context: &mut RenderContext, viewport: &Viewport) -> Result<()> {
        let Some(tile_zoom) = self.tile_zoom(viewport.zoom) else {
            return Ok(());
        };

        for (coord, bounds) in visible_tiles(viewport, TILE_SIZE, tile_zoom) {
            let Some(data) = self.loader.get(&coord) else {
                self.loader.request(coord, self.template.url(coord));
                continue;
            };
            if self.processed.insert(coord) {
                self.process_tile(coord, &data);
            }
            context.render_vector_tile(coord, data, bounds, self.properties.opacity)?;
        }
        Ok(())
    }

    fn is_loading(&self) -> bool {
        self.loader.pending_count() > 0
    }
}

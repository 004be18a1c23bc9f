//! The default composition: one map, a base tile layer and the overlays
//! enabled in [`ViewerConfig`].
//!
//! Overlay state is always read without holding the map lock.

use crate::core::config::ViewerConfig;
use crate::core::map::{Map, MapHandle};
use crate::data::fetch::{fetcher_from_config, AssetFetcher, HttpFetcher};
use crate::layers::raster::RasterLayerOptions;
use crate::layers::tile::{TileLayer, TileLayerOptions};
use crate::overlays::{LoadState, Overlay, PointFeatureOverlay, RasterOverlay};
use crate::Result;
use std::sync::Arc;

#[cfg(feature = "vector-tiles")]
use crate::layers::vector_tile::{property_feature_id, VectorTileOptions};
#[cfg(feature = "vector-tiles")]
use crate::overlays::VectorOverlay;

pub const BASE_LAYER_ID: &str = "base";

pub struct Viewer {
    config: ViewerConfig,
    map: MapHandle,
    tile_fetcher: Arc<dyn AssetFetcher>,
    points: Option<PointFeatureOverlay>,
    raster: Option<RasterOverlay>,
    #[cfg(feature = "vector-tiles")]
    vector: Option<VectorOverlay>,
}

impl Viewer {
    /// Mounts the composition with the asset source named in the config
    pub fn from_config(config: ViewerConfig) -> Result<Self> {
        let fetcher = fetcher_from_config(&config.assets)?;
        Self::mount(config, fetcher)
    }

    /// Mounts the composition; static assets come from `fetcher`, map tiles
    /// over HTTP
    pub fn mount(config: ViewerConfig, fetcher: Arc<dyn AssetFetcher>) -> Result<Self> {
        Self::mount_with_tiles(config, fetcher, Arc::new(HttpFetcher::shared()))
    }

    pub fn mount_with_tiles(
        config: ViewerConfig,
        fetcher: Arc<dyn AssetFetcher>,
        tile_fetcher: Arc<dyn AssetFetcher>,
    ) -> Result<Self> {
        config.validate()?;
        let map = MapHandle::new(Map::new(config.view.clone().into()));

        let base = &config.base_layer;
        let base_layer = TileLayer::with_fetcher(
            BASE_LAYER_ID.to_string(),
            &base.url,
            TileLayerOptions {
                max_native_zoom: base.max_native_zoom,
                max_zoom: base.max_zoom,
                attribution: base.attribution.clone(),
                subdomains: base.subdomains.clone(),
                ..TileLayerOptions::default()
            },
            tile_fetcher.clone(),
        );
        map.write()?.add_layer(Box::new(base_layer))?;

        let points = config.points.enabled.then(|| {
            let mut overlay = PointFeatureOverlay::new(config.points.path.clone(), fetcher.clone());
            overlay.mount(&map);
            overlay
        });

        let raster = config.raster.enabled.then(|| {
            let options = RasterLayerOptions {
                opacity: config.raster.opacity,
                color_scale: config.raster.color_scale,
                band: config.raster.band,
                ..RasterLayerOptions::default()
            };
            let mut overlay = RasterOverlay::new(config.raster.path.clone(), fetcher.clone(), options);
            overlay.mount(&map);
            overlay
        });

        log::info!(
            "viewer mounted at {:?} zoom {} (points: {}, raster: {}, vector: {})",
            config.view.center,
            config.view.zoom,
            config.points.enabled,
            config.raster.enabled,
            config.vector.enabled
        );

        let mut viewer = Self {
            config,
            map,
            tile_fetcher,
            points,
            raster,
            #[cfg(feature = "vector-tiles")]
            vector: None,
        };
        #[cfg(feature = "vector-tiles")]
        if viewer.config.vector.enabled {
            viewer.set_vector_enabled(true);
        }
        Ok(viewer)
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn map(&self) -> &MapHandle {
        &self.map
    }

    pub fn points(&self) -> Option<&PointFeatureOverlay> {
        self.points.as_ref()
    }

    pub fn raster(&self) -> Option<&RasterOverlay> {
        self.raster.as_ref()
    }

    #[cfg(feature = "vector-tiles")]
    pub fn vector(&self) -> Option<&VectorOverlay> {
        self.vector.as_ref()
    }

    /// Mounts or unmounts the vector tile overlay
    #[cfg(feature = "vector-tiles")]
    pub fn set_vector_enabled(&mut self, enabled: bool) {
        if !enabled {
            if let Some(vector) = self.vector.as_mut() {
                vector.unmount();
            }
            return;
        }

        let vector = self.vector.get_or_insert_with(|| {
            let config = &self.config.vector;
            let options = VectorTileOptions {
                attribution: config.attribution.clone(),
                interactive: config.interactive,
                max_native_zoom: config.max_native_zoom,
                get_feature_id: property_feature_id(config.id_property.clone()),
                ..VectorTileOptions::default()
            };
            VectorOverlay::new(config.url.clone(), options).with_fetcher(self.tile_fetcher.clone())
        });
        if vector.state() == LoadState::Unloaded {
            vector.mount(&self.map);
        }
    }

    #[cfg(feature = "vector-tiles")]
    pub fn is_vector_enabled(&self) -> bool {
        self.vector
            .as_ref()
            .is_some_and(|vector| vector.state() == LoadState::Ready)
    }

    /// True while an overlay or a tile is still on its way. Front ends use it
    /// to keep repainting.
    pub fn is_loading(&self) -> bool {
        let overlays_pending = self.points.as_ref().is_some_and(|p| p.is_fetching())
            || self.raster.as_ref().is_some_and(|r| r.is_fetching());
        overlays_pending
            || self
                .map
                .read()
                .map(|map| map.is_loading())
                .unwrap_or(false)
    }

    /// Tears down every overlay. The base layer stays.
    pub fn unmount(&mut self) {
        if let Some(points) = self.points.as_mut() {
            points.unmount();
        }
        if let Some(raster) = self.raster.as_mut() {
            raster.unmount();
        }
        #[cfg(feature = "vector-tiles")]
        if let Some(vector) = self.vector.as_mut() {
            vector.unmount();
        }
        log::debug!("viewer overlays unmounted");
    }

    pub fn overlay_states(&self) -> Vec<(&str, LoadState)> {
        let mut states = Vec::new();
        if let Some(points) = &self.points {
            states.push((points.layer_id(), points.state()));
        }
        if let Some(raster) = &self.raster {
            states.push((raster.layer_id(), raster.state()));
        }
        #[cfg(feature = "vector-tiles")]
        if let Some(vector) = &self.vector {
            states.push((vector.layer_id(), vector.state()));
        }
        states
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        self.unmount();
    }
}

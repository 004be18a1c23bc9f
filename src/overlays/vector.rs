use super::{LoadState, Overlay};
use crate::core::map::{MapHandle, WeakMapHandle};
use crate::data::fetch::AssetFetcher;
use crate::layers::vector_tile::{VectorTileLayer, VectorTileOptions};
use std::sync::Arc;

pub const VECTOR_LAYER_ID: &str = "vector";

/// Mapbox Vector Tile overlay.
///
/// Tiles stream in on demand, so there is no single asset to wait for: the
/// layer is attached as soon as the overlay is mounted.
pub struct VectorOverlay {
    url_template: String,
    options: VectorTileOptions,
    fetcher: Option<Arc<dyn AssetFetcher>>,
    map: WeakMapHandle,
    state: LoadState,
}

impl VectorOverlay {
    pub fn new(url_template: impl Into<String>, options: VectorTileOptions) -> Self {
        Self {
            url_template: url_template.into(),
            options,
            fetcher: None,
            map: WeakMapHandle::default(),
            state: LoadState::Unloaded,
        }
    }

    /// Fetch tiles through `fetcher` instead of plain HTTP
    pub fn with_fetcher(mut self, fetcher: Arc<dyn AssetFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn url_template(&self) -> &str {
        &self.url_template
    }

    /// Shows or hides the attached layer without unmounting it
    pub fn set_visible(&self, visible: bool) -> bool {
        let Some(map) = self.map.upgrade() else {
            return false;
        };
        let changed = match map.write() {
            Ok(mut map) => map.set_layer_visible(VECTOR_LAYER_ID, visible),
            Err(err) => {
                log::warn!("vector overlay: {}", err);
                false
            }
        };
        changed
    }

    fn build_layer(&self) -> VectorTileLayer {
        let id = VECTOR_LAYER_ID.to_string();
        match &self.fetcher {
            Some(fetcher) => VectorTileLayer::with_fetcher(
                id,
                &self.url_template,
                self.options.clone(),
                fetcher.clone(),
            ),
            None => VectorTileLayer::new(id, &self.url_template, self.options.clone()),
        }
    }
}

impl Overlay for VectorOverlay {
    fn layer_id(&self) -> &str {
        VECTOR_LAYER_ID
    }

    fn state(&self) -> LoadState {
        self.state
    }

    fn mount(&mut self, map: &MapHandle) {
        self.unmount();
        let layer = Box::new(self.build_layer());
        match map.write().and_then(|mut map| map.add_layer(layer)) {
            Ok(_) => {
                self.map = map.downgrade();
                self.state = LoadState::Ready;
                log::info!("vector overlay attached ({})", self.url_template);
            }
            Err(err) => log::warn!("vector overlay: could not attach layer: {}", err),
        }
    }

    fn unmount(&mut self) {
        if self.state == LoadState::Unloaded {
            return;
        }
        if let Some(map) = self.map.upgrade() {
            if let Err(err) = map
                .write()
                .and_then(|mut map| map.remove_layer(VECTOR_LAYER_ID))
            {
                log::warn!("vector overlay: detach failed: {}", err);
            }
        }
        self.map = WeakMapHandle::default();
        self.state = LoadState::Unloaded;
    }

    fn is_attached(&self) -> bool {
        self.state == LoadState::Ready && self.map.upgrade().is_some()
    }
}

impl Drop for VectorOverlay {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::map::{Map, MapOptions};

    #[test]
    fn test_toggle_and_unmount() {
        let map = MapHandle::new(Map::new(MapOptions::default()));
        let mut overlay = VectorOverlay::new("{z}/{y}/{x}.pbf", VectorTileOptions::default());
        assert!(!overlay.set_visible(false));

        overlay.mount(&map);
        assert_eq!(overlay.state(), LoadState::Ready);
        assert!(map.read().unwrap().has_layer(VECTOR_LAYER_ID));

        assert!(overlay.set_visible(false));
        assert!(!map.read().unwrap().get_layer(VECTOR_LAYER_ID).unwrap().is_visible());

        overlay.unmount();
        assert_eq!(overlay.state(), LoadState::Unloaded);
        assert_eq!(map.read().unwrap().layer_count(), 0);
    }

    #[test]
    fn test_drop_detaches() {
        let map = MapHandle::new(Map::new(MapOptions::default()));
        {
            let mut overlay = VectorOverlay::new("{z}/{y}/{x}.pbf", VectorTileOptions::default());
            overlay.mount(&map);
            assert_eq!(map.read().unwrap().layer_count(), 1);
        }
        assert_eq!(map.read().unwrap().layer_count(), 0);
    }
}

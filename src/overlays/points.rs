use super::{LoadState, Overlay, OverlayCore};
use crate::core::map::MapHandle;
use crate::data::fetch::AssetFetcher;
use crate::data::geojson::{parse_feature_collection, FeatureCollection};
use crate::layers::base::LayerTrait;
use crate::layers::geojson::GeoJsonLayer;
use std::sync::Arc;

pub const POINTS_LAYER_ID: &str = "points";

/// Pins every point of a GeoJSON FeatureCollection, one popup marker each.
///
/// Nothing is drawn until the collection has been fetched and parsed.
pub struct PointFeatureOverlay {
    core: OverlayCore<FeatureCollection>,
}

impl PointFeatureOverlay {
    pub fn new(path: impl Into<String>, fetcher: Arc<dyn AssetFetcher>) -> Self {
        Self::with_layer_id(POINTS_LAYER_ID, path, fetcher)
    }

    pub fn with_layer_id(
        layer_id: impl Into<String>,
        path: impl Into<String>,
        fetcher: Arc<dyn AssetFetcher>,
    ) -> Self {
        Self {
            core: OverlayCore::new(layer_id.into(), path.into(), fetcher),
        }
    }

    pub fn path(&self) -> &str {
        self.core.path()
    }

    /// The parsed collection, once loaded
    pub fn features(&self) -> Option<Arc<FeatureCollection>> {
        self.core.data()
    }

    /// Markers currently pinned; zero until the load completes
    pub fn marker_count(&self) -> usize {
        self.features().map(|features| features.len()).unwrap_or(0)
    }

    pub fn is_fetching(&self) -> bool {
        self.core.is_fetching()
    }
}

impl Overlay for PointFeatureOverlay {
    fn layer_id(&self) -> &str {
        self.core.layer_id()
    }

    fn state(&self) -> LoadState {
        self.core.state()
    }

    fn mount(&mut self, map: &MapHandle) {
        let layer_id = self.core.layer_id().to_string();
        self.core.mount(
            map,
            Box::new(move |bytes: &[u8]| {
                let collection = parse_feature_collection(bytes)?;
                log::debug!("parsed {} point feature(s)", collection.len());
                let layer: Box<dyn LayerTrait> = Box::new(GeoJsonLayer::new(layer_id, &collection));
                Ok((Arc::new(collection), layer))
            }),
        );
    }

    fn unmount(&mut self) {
        self.core.unmount();
    }

    fn is_attached(&self) -> bool {
        self.core.is_attached()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::Point;
    use crate::core::map::{Map, MapOptions};
    use crate::overlays::testing::MemoryFetcher;
    use crate::rendering::context::RenderContext;
    use std::time::Duration;

    const BOULDERS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            { "type": "Feature",
              "geometry": { "type": "Point", "coordinates": [-74.1915, 46.027] },
              "properties": { "name": "Boulder A", "description": "" } },
            { "type": "Feature",
              "geometry": { "type": "Point", "coordinates": [-74.1910, 46.0272] },
              "properties": { "name": "Boulder B", "description": "Crimpy start" } }
        ]
    }"#;

    fn fetcher(delay_ms: u64) -> Arc<MemoryFetcher> {
        Arc::new(
            MemoryFetcher::new([("/data/all_boulders.geojson", BOULDERS.as_bytes().to_vec())])
                .with_delay(Duration::from_millis(delay_ms)),
        )
    }

    fn rendered_markers(map: &MapHandle) -> usize {
        let mut context = RenderContext::new(0, 0);
        map.write().unwrap().render(&mut context).unwrap();
        context.marker_count()
    }

    #[tokio::test]
    async fn test_markers_appear_after_load() {
        let map = MapHandle::new(Map::new(MapOptions::default()));
        let mut overlay = PointFeatureOverlay::new("/data/all_boulders.geojson", fetcher(20));

        overlay.mount(&map);
        assert_eq!(overlay.state(), LoadState::Loading);
        assert_eq!(overlay.marker_count(), 0);
        assert_eq!(rendered_markers(&map), 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(overlay.state(), LoadState::Ready);
        assert_eq!(overlay.marker_count(), 2);
        assert_eq!(rendered_markers(&map), 2);

        let map_ref = map.read().unwrap();
        let center = map_ref.viewport().lat_lng_to_pixel(&crate::LatLng::new(46.027, -74.1915));
        assert_eq!(
            map_ref.popup_at(&center).as_deref(),
            Some("<strong>Boulder A</strong>")
        );
        assert!(map_ref.popup_at(&Point::new(-50.0, -50.0)).is_none());
    }

    #[tokio::test]
    async fn test_missing_asset_stays_loading() {
        let map = MapHandle::new(Map::new(MapOptions::default()));
        let mut overlay = PointFeatureOverlay::new("/nope.geojson", fetcher(1));

        overlay.mount(&map);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(overlay.state(), LoadState::Loading);
        assert!(!overlay.is_attached());
        assert_eq!(map.read().unwrap().layer_count(), 0);
    }

    #[tokio::test]
    async fn test_unmount_detaches() {
        let map = MapHandle::new(Map::new(MapOptions::default()));
        let mut overlay = PointFeatureOverlay::new("/data/all_boulders.geojson", fetcher(1));

        overlay.mount(&map);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(map.read().unwrap().has_layer(POINTS_LAYER_ID));

        overlay.unmount();
        assert_eq!(overlay.state(), LoadState::Unloaded);
        assert!(!map.read().unwrap().has_layer(POINTS_LAYER_ID));
    }
}

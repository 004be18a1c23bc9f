use super::{LoadState, Overlay, OverlayCore};
use crate::core::geo::LatLngBounds;
use crate::core::map::MapHandle;
use crate::data::fetch::AssetFetcher;
use crate::data::georaster::{parse_georaster, RasterGrid};
use crate::layers::base::LayerTrait;
use crate::layers::raster::{RasterLayer, RasterLayerOptions};
use std::sync::Arc;

pub const RASTER_LAYER_ID: &str = "raster";

/// GeoTIFF overlay drawn through a color scale.
///
/// The raster is fetched once per mount. A fetch or decode failure, as well
/// as an unsupported georeference, is logged and the overlay stays in
/// [`LoadState::Loading`] with nothing attached.
pub struct RasterOverlay {
    core: OverlayCore<RasterGrid>,
    options: RasterLayerOptions,
}

impl RasterOverlay {
    pub fn new(
        path: impl Into<String>,
        fetcher: Arc<dyn AssetFetcher>,
        options: RasterLayerOptions,
    ) -> Self {
        Self {
            core: OverlayCore::new(RASTER_LAYER_ID.to_string(), path.into(), fetcher),
            options,
        }
    }

    pub fn path(&self) -> &str {
        self.core.path()
    }

    pub fn options(&self) -> &RasterLayerOptions {
        &self.options
    }

    pub fn grid(&self) -> Option<Arc<RasterGrid>> {
        self.core.data()
    }

    /// Geographic extent of the loaded raster
    pub fn bounds(&self) -> Option<LatLngBounds> {
        self.grid().and_then(|grid| grid.bounds().ok())
    }

    pub fn is_fetching(&self) -> bool {
        self.core.is_fetching()
    }
}

impl Overlay for RasterOverlay {
    fn layer_id(&self) -> &str {
        self.core.layer_id()
    }

    fn state(&self) -> LoadState {
        self.core.state()
    }

    fn mount(&mut self, map: &MapHandle) {
        let layer_id = self.core.layer_id().to_string();
        let options = self.options.clone();
        self.core.mount(
            map,
            Box::new(move |bytes: &[u8]| {
                let grid = Arc::new(parse_georaster(bytes)?);
                log::debug!(
                    "raster {}x{} with {} band(s), range {:?}..{:?}",
                    grid.width,
                    grid.height,
                    grid.band_count(),
                    grid.mins.first(),
                    grid.maxs.first()
                );
                let layer: Box<dyn LayerTrait> =
                    Box::new(RasterLayer::new(layer_id, grid.clone(), options)?);
                Ok((grid, layer))
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
    use crate::core::map::{Map, MapOptions};
    use crate::data::georaster::{encode_georaster, GeoTransform};
    use crate::overlays::testing::MemoryFetcher;
    use crate::rendering::context::{DrawCommand, RenderContext};
    use std::time::Duration;

    fn slope_tiff() -> Vec<u8> {
        let grid = RasterGrid::from_bands(
            4,
            2,
            vec![vec![0.0, 10.0, 20.0, 30.0, -9999.0, 50.0, 60.0, 70.0]],
            Some(-9999.0),
        )
        .unwrap()
        .with_georeference(GeoTransform::new(-74.2, 46.03, 0.005, -0.005), Some(4326));
        encode_georaster(&grid).unwrap()
    }

    #[tokio::test]
    async fn test_loaded_raster_is_drawn() {
        let fetcher = Arc::new(MemoryFetcher::new([("/dtm.tif", slope_tiff())]));
        let map = MapHandle::new(Map::new(MapOptions::default()));
        let mut overlay = RasterOverlay::new("/dtm.tif", fetcher, RasterLayerOptions::default());

        overlay.mount(&map);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(overlay.state(), LoadState::Ready);

        let grid = overlay.grid().unwrap();
        assert_eq!(grid.mins[0], 0.0);
        assert_eq!(grid.maxs[0], 70.0);
        assert!(overlay.bounds().unwrap().contains(&crate::LatLng::new(46.027, -74.1915)));

        let mut context = RenderContext::new(0, 0);
        map.write().unwrap().render(&mut context).unwrap();
        let image = context
            .commands()
            .iter()
            .find_map(|command| match command {
                DrawCommand::Image { image, opacity, .. } => Some((image.clone(), *opacity)),
                _ => None,
            })
            .unwrap();
        assert_eq!(image.1, 0.6);
        assert_eq!(image.0.pixel(0, 1)[3], 0);
        assert_eq!(image.0.pixel(1, 1)[3], 255);
    }

    #[tokio::test]
    async fn test_rejected_fetch_attaches_nothing() {
        let fetcher = Arc::new(MemoryFetcher::new([]));
        let map = MapHandle::new(Map::new(MapOptions::default()));
        let mut overlay = RasterOverlay::new("/dtm.tif", fetcher, RasterLayerOptions::default());

        overlay.mount(&map);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(overlay.state(), LoadState::Loading);
        assert!(!map.read().unwrap().has_layer(RASTER_LAYER_ID));
        assert!(overlay.grid().is_none());
    }

    #[tokio::test]
    async fn test_undecodable_raster_stays_loading() {
        let fetcher = Arc::new(MemoryFetcher::new([("/dtm.tif", b"not a tiff".to_vec())]));
        let map = MapHandle::new(Map::new(MapOptions::default()));
        let mut overlay = RasterOverlay::new("/dtm.tif", fetcher, RasterLayerOptions::default());

        overlay.mount(&map);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(overlay.state(), LoadState::Loading);
        assert_eq!(map.read().unwrap().layer_count(), 0);
    }
}

use crate::{
    core::{
        config::ViewConfig,
        constants::DEFAULT_ZOOM_DELTA,
        geo::{LatLng, LatLngBounds, Point},
        viewport::Viewport,
    },
    layers::{base::LayerTrait, manager::LayerManager},
    rendering::context::RenderContext,
    MapError, Result,
};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

#[derive(Debug, Clone, PartialEq)]
pub struct MapOptions {
    pub center: LatLng,
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Surface size in pixels
    pub size: Point,
}

impl Default for MapOptions {
    fn default() -> Self {
        ViewConfig::default().into()
    }
}

impl From<ViewConfig> for MapOptions {
    fn from(view: ViewConfig) -> Self {
        Self {
            center: view.center,
            zoom: view.zoom,
            min_zoom: view.min_zoom,
            max_zoom: view.max_zoom,
            size: view.size,
        }
    }
}

/// The shared map surface: a viewport plus the layers drawn over it
pub struct Map {
    viewport: Viewport,
    layers: LayerManager,
    /// Bumped on every view or layer change
    revision: u64,
}

impl Map {
    /// Establishes the view. Coordinates are taken as given, not validated.
    pub fn new(options: MapOptions) -> Self {
        let viewport = Viewport::with_zoom_limits(
            options.center,
            options.zoom,
            options.size,
            options.min_zoom,
            options.max_zoom,
        );
        Self {
            viewport,
            layers: LayerManager::new(),
            revision: 0,
        }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Forces a re-render without any other change
    pub fn mark_dirty(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    pub fn set_view(&mut self, center: LatLng, zoom: f64) {
        self.viewport.set_center(center);
        self.viewport.set_zoom(zoom);
        self.mark_dirty();
    }

    /// Zooms around `focus` (a surface pixel) or around the center
    pub fn zoom_to(&mut self, zoom: f64, focus: Option<Point>) {
        self.viewport.zoom_to(zoom, focus);
        self.mark_dirty();
    }

    pub fn zoom_in(&mut self) {
        self.zoom_to(self.viewport.zoom + DEFAULT_ZOOM_DELTA, None);
    }

    pub fn zoom_out(&mut self) {
        self.zoom_to(self.viewport.zoom - DEFAULT_ZOOM_DELTA, None);
    }

    /// Pans by a drag delta in pixels
    pub fn pan(&mut self, delta: Point) {
        self.viewport.pan(delta);
        self.mark_dirty();
    }

    pub fn set_size(&mut self, size: Point) {
        if size != self.viewport.size {
            self.viewport.set_size(size);
            self.mark_dirty();
        }
    }

    pub fn fit_bounds(&mut self, bounds: &LatLngBounds, padding: Option<f64>) {
        self.viewport.fit_bounds(bounds, padding);
        self.mark_dirty();
    }

    /// Adds a layer and returns its id. A layer with the same id is replaced.
    pub fn add_layer(&mut self, mut layer: Box<dyn LayerTrait>) -> Result<String> {
        layer.on_add(self)?;
        let layer_id = layer.id().to_string();
        log::debug!("adding {} layer {}", layer.layer_type(), layer_id);

        if let Some(mut replaced) = self.layers.add_layer(layer) {
            replaced.on_remove(self)?;
        }
        self.mark_dirty();
        Ok(layer_id)
    }

    /// Removes a layer; `Ok(false)` when no layer had that id
    pub fn remove_layer(&mut self, layer_id: &str) -> Result<bool> {
        let Some(mut layer) = self.layers.remove_layer(layer_id) else {
            return Ok(false);
        };
        log::debug!("removed {} layer {}", layer.layer_type(), layer_id);
        self.mark_dirty();
        layer.on_remove(self)?;
        Ok(true)
    }

    pub fn has_layer(&self, layer_id: &str) -> bool {
        self.layers.contains(layer_id)
    }

    pub fn get_layer(&self, layer_id: &str) -> Option<&dyn LayerTrait> {
        self.layers.get_layer(layer_id)
    }

    pub fn with_layer_mut<F, R>(&mut self, layer_id: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut dyn LayerTrait) -> R,
    {
        let result = self.layers.with_layer_mut(layer_id, f);
        if result.is_some() {
            self.layers.update_render_order();
            self.mark_dirty();
        }
        result
    }

    /// Layer ids in render order, bottom first
    pub fn list_layers(&self) -> Vec<String> {
        self.layers.list_layers()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Shows or hides a layer; `false` when there is no such layer
    pub fn set_layer_visible(&mut self, layer_id: &str, visible: bool) -> bool {
        self.with_layer_mut(layer_id, |layer| layer.set_visible(visible))
            .is_some()
    }

    /// Attribution strings of the visible layers, deduplicated, bottom first
    pub fn attributions(&self) -> Vec<String> {
        let mut attributions: Vec<String> = Vec::new();
        for layer in self.layers.layers().filter(|layer| layer.is_visible()) {
            if let Some(text) = layer.attribution() {
                if !attributions.iter().any(|existing| existing == text) {
                    attributions.push(text.to_string());
                }
            }
        }
        attributions
    }

    /// Starts a new frame in `context` and draws the visible layers into it
    pub fn render(&mut self, context: &mut RenderContext) -> Result<()> {
        context.width = self.viewport.size.x.max(0.0) as u32;
        context.height = self.viewport.size.y.max(0.0) as u32;
        context.begin_frame();
        self.layers.render(context, &self.viewport)
    }

    /// Popup of the topmost interactive element under a surface pixel
    pub fn popup_at(&self, pixel: &Point) -> Option<String> {
        self.layers.popup_at(pixel, &self.viewport)
    }

    /// True while any visible layer waits for requested data
    pub fn is_loading(&self) -> bool {
        self.layers
            .layers()
            .any(|layer| layer.is_visible() && layer.is_loading())
    }
}

impl Default for Map {
    fn default() -> Self {
        Self::new(MapOptions::default())
    }
}

/// Cheaply cloneable shared ownership of a [`Map`]
#[derive(Clone)]
pub struct MapHandle(Arc<RwLock<Map>>);

/// Non-owning reference to a [`Map`], held by background work
#[derive(Clone, Default)]
pub struct WeakMapHandle(Weak<RwLock<Map>>);

impl MapHandle {
    pub fn new(map: Map) -> Self {
        Self(Arc::new(RwLock::new(map)))
    }

    pub fn read(&self) -> Result<RwLockReadGuard<'_, Map>> {
        self.0
            .read()
            .map_err(|err| MapError::Lock(err.to_string()))
    }

    pub fn write(&self) -> Result<RwLockWriteGuard<'_, Map>> {
        self.0
            .write()
            .map_err(|err| MapError::Lock(err.to_string()))
    }

    pub fn downgrade(&self) -> WeakMapHandle {
        WeakMapHandle(Arc::downgrade(&self.0))
    }
}

impl From<Map> for MapHandle {
    fn from(map: Map) -> Self {
        Self::new(map)
    }
}

impl WeakMapHandle {
    /// `None` once every [`MapHandle`] is gone
    pub fn upgrade(&self) -> Option<MapHandle> {
        self.0.upgrade().map(MapHandle)
    }
}

impl std::fmt::Debug for MapHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("MapHandle").finish()
    }
}

impl std::fmt::Debug for WeakMapHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("WeakMapHandle").finish()
    }
}

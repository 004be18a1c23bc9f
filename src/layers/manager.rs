use crate::core::geo::Point;
use crate::core::viewport::Viewport;
use crate::layers::base::LayerTrait;
use crate::rendering::context::RenderContext;
use crate::Result;
use fxhash::FxHashMap;

/// Owns the map's layers and keeps them in z-order
pub struct LayerManager {
    /// All layers indexed by ID
    layers: FxHashMap<String, Box<dyn LayerTrait>>,
    /// Layer IDs sorted by z-index; insertion order breaks ties
    render_order: Vec<String>,
}

impl LayerManager {
    pub fn new() -> Self {
        Self {
            layers: FxHashMap::default(),
            render_order: Vec::new(),
        }
    }

    /// Adds a layer, replacing any layer with the same id
    pub fn add_layer(&mut self, layer: Box<dyn LayerTrait>) -> Option<Box<dyn LayerTrait>> {
        let layer_id = layer.id().to_string();
        let z_index = layer.z_index();

        let replaced = self.remove_layer(&layer_id);
        self.layers.insert(layer_id.clone(), layer);

        let insert_pos = self
            .render_order
            .iter()
            .position(|id| {
                self.layers
                    .get(id)
                    .map(|l| l.z_index() > z_index)
                    .unwrap_or(false)
            })
            .unwrap_or(self.render_order.len());

        self.render_order.insert(insert_pos, layer_id);
        replaced
    }

    pub fn remove_layer(&mut self, layer_id: &str) -> Option<Box<dyn LayerTrait>> {
        self.render_order.retain(|id| id != layer_id);
        self.layers.remove(layer_id)
    }

    pub fn contains(&self, layer_id: &str) -> bool {
        self.layers.contains_key(layer_id)
    }

    pub fn get_layer(&self, layer_id: &str) -> Option<&dyn LayerTrait> {
        self.layers.get(layer_id).map(|l| l.as_ref())
    }

    /// Applies a function to a specific layer mutably
    pub fn with_layer_mut<F, R>(&mut self, layer_id: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut dyn LayerTrait) -> R,
    {
        self.layers.get_mut(layer_id).map(|layer| f(layer.as_mut()))
    }

    /// Layer IDs in render order
    pub fn list_layers(&self) -> Vec<String> {
        self.render_order.clone()
    }

    /// Layers in render order
    pub fn layers(&self) -> impl Iterator<Item = &dyn LayerTrait> {
        self.render_order
            .iter()
            .filter_map(|id| self.layers.get(id).map(|l| l.as_ref()))
    }

    /// Renders visible layers that intersect the viewport, bottom to top
    pub fn render(&mut self, context: &mut RenderContext, viewport: &Viewport) -> Result<()> {
        let viewport_bounds = viewport.bounds();

        for layer_id in &self.render_order {
            if let Some(layer) = self.layers.get_mut(layer_id) {
                if layer.is_visible() && layer.intersects_bounds(&viewport_bounds) {
                    layer.render(context, viewport)?;
                }
            }
        }
        Ok(())
    }

    /// Popup of the topmost visible layer with an interactive element under `pixel`
    pub fn popup_at(&self, pixel: &Point, viewport: &Viewport) -> Option<String> {
        self.render_order
            .iter()
            .rev()
            .filter_map(|id| self.layers.get(id))
            .filter(|layer| layer.is_visible())
            .find_map(|layer| layer.popup_at(pixel, viewport))
    }

    /// Re-sorts after z-index changes
    pub fn update_render_order(&mut self) {
        let layers = &self.layers;
        self.render_order
            .sort_by_key(|id| layers.get(id).map(|l| l.z_index()).unwrap_or(0));
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl Default for LayerManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::LatLng;
    use crate::layers::marker::Marker;

    fn marker(id: &str, z_index: i32) -> Box<dyn LayerTrait> {
        let mut marker = Marker::new(id.to_string(), LatLng::new(46.027, -74.1915));
        marker.set_z_index(z_index);
        Box::new(marker)
    }

    #[test]
    fn test_render_order_follows_z_index() {
        let mut manager = LayerManager::new();
        manager.add_layer(marker("top", 10));
        manager.add_layer(marker("bottom", 0));
        manager.add_layer(marker("middle", 5));
        manager.add_layer(marker("middle-2", 5));

        assert_eq!(manager.list_layers(), vec!["bottom", "middle", "middle-2", "top"]);
    }

    #[test]
    fn test_add_replaces_same_id() {
        let mut manager = LayerManager::new();
        assert!(manager.add_layer(marker("a", 0)).is_none());
        assert!(manager.add_layer(marker("a", 1)).is_some());
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.list_layers(), vec!["a"]);
    }

    #[test]
    fn test_remove_and_reorder() {
        let mut manager = LayerManager::new();
        manager.add_layer(marker("a", 0));
        manager.add_layer(marker("b", 1));

        manager.with_layer_mut("a", |layer| layer.set_z_index(2));
        manager.update_render_order();
        assert_eq!(manager.list_layers(), vec!["b", "a"]);

        assert!(manager.remove_layer("a").is_some());
        assert!(manager.remove_layer("a").is_none());
        assert!(!manager.contains("a"));
        assert_eq!(manager.len(), 1);
    }
}

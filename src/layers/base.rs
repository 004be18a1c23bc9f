use crate::core::geo::{LatLngBounds, Point};
use crate::core::map::Map;
use crate::core::viewport::Viewport;
use crate::rendering::context::RenderContext;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerType {
    Tile,
    VectorTile,
    Raster,
    Marker,
    FeatureGroup,
}

impl std::fmt::Display for LayerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayerType::Tile => write!(f, "tile"),
            LayerType::VectorTile => write!(f, "vector-tile"),
            LayerType::Raster => write!(f, "raster"),
            LayerType::Marker => write!(f, "marker"),
            LayerType::FeatureGroup => write!(f, "feature-group"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LayerProperties {
    pub id: String,
    pub name: String,
    pub layer_type: LayerType,
    pub z_index: i32,
    pub opacity: f32,
    pub visible: bool,
    pub interactive: bool,
    pub attribution: Option<String>,
}

impl LayerProperties {
    pub fn new(id: String, name: String, layer_type: LayerType) -> Self {
        Self {
            id,
            name,
            layer_type,
            z_index: 0,
            opacity: 1.0,
            visible: true,
            interactive: true,
            attribution: None,
        }
    }

    pub fn with_z_index(mut self, z_index: i32) -> Self {
        self.z_index = z_index;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn with_attribution(mut self, attribution: Option<String>) -> Self {
        self.attribution = attribution;
        self
    }
}

/// A layer that can be attached to a [`Map`] and draws into a [`RenderContext`]
pub trait LayerTrait: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn layer_type(&self) -> LayerType;

    fn is_visible(&self) -> bool;

    fn set_visible(&mut self, visible: bool);

    /// Layer opacity (0.0 to 1.0)
    fn opacity(&self) -> f32;

    fn set_opacity(&mut self, opacity: f32);

    /// Stacking order; higher draws on top
    fn z_index(&self) -> i32;

    fn set_z_index(&mut self, z_index: i32);

    /// Attribution text shown while the layer is visible
    fn attribution(&self) -> Option<&str> {
        None
    }

    /// Called by the map right before the layer is inserted
    fn on_add(&mut self, _map: &Map) -> Result<()> {
        Ok(())
    }

    /// Called by the map right after the layer was taken out
    fn on_remove(&mut self, _map: &Map) -> Result<()> {
        Ok(())
    }

    fn render(&mut self, context: &mut RenderContext, viewport: &Viewport) -> Result<()>;

    /// Geographic extent, if the layer has one
    fn bounds(&self) -> Option<LatLngBounds> {
        None
    }

    fn intersects_bounds(&self, bounds: &LatLngBounds) -> bool {
        match self.bounds() {
            Some(layer_bounds) => layer_bounds.intersects(bounds),
            None => true,
        }
    }

    /// True while the layer waits for data it has requested
    fn is_loading(&self) -> bool {
        false
    }

    /// Popup content of the interactive element under `pixel`, if any
    fn popup_at(&self, _pixel: &Point, _viewport: &Viewport) -> Option<String> {
        None
    }

    fn options(&self) -> serde_json::Value;

    fn as_any(&self) -> &dyn std::any::Any;
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

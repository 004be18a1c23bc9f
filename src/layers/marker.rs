use crate::{
    core::{
        constants::MARKER_HIT_RADIUS,
        geo::{LatLng, LatLngBounds, Point},
        viewport::Viewport,
    },
    layers::base::{LayerProperties, LayerTrait, LayerType},
    rendering::context::RenderContext,
    Result,
};

/// A single interactive point with optional popup HTML
pub struct Marker {
    properties: LayerProperties,
    position: LatLng,
    popup_content: Option<String>,
}

impl Marker {
    pub fn new(id: String, position: LatLng) -> Self {
        let properties = LayerProperties::new(id, "Marker".to_string(), LayerType::Marker);
        Self {
            properties,
            position,
            popup_content: None,
        }
    }

    pub fn with_popup(mut self, content: String) -> Self {
        self.popup_content = Some(content);
        self
    }

    pub fn position(&self) -> LatLng {
        self.position
    }

    pub fn set_position(&mut self, position: LatLng) {
        self.position = position;
    }

    pub fn popup_content(&self) -> Option<&str> {
        self.popup_content.as_deref()
    }

    /// Hit test against the marker's screen position
    pub fn contains_pixel(&self, pixel: &Point, viewport: &Viewport) -> bool {
        viewport.lat_lng_to_pixel(&self.position).distance_to(pixel) <= MARKER_HIT_RADIUS
    }

    /// Queues the marker on behalf of `layer_id` when it lands near the surface
    pub(crate) fn draw(
        &self,
        layer_id: &str,
        context: &mut RenderContext,
        viewport: &Viewport,
    ) -> Result<()> {
        let position = viewport.lat_lng_to_pixel(&self.position);
        let margin = Point::new(MARKER_HIT_RADIUS, MARKER_HIT_RADIUS);
        if !context.is_on_screen(&(position.subtract(&margin), position.add(&margin))) {
            return Ok(());
        }
        context.render_marker(
            layer_id,
            &self.properties.id,
            position,
            self.position,
            self.popup_content.as_deref(),
        )
    }
}

impl LayerTrait for Marker {
    crate::impl_layer_trait!(Marker, properties);

    fn options(&self) -> serde_json::Value {
        serde_json::json!({
            "position": {
                "lat": self.position.lat,
                "lng": self.position.lng
            },
            "popup": self.popup_content
        })
    }

    fn render(&mut self, context: &mut RenderContext, viewport: &Viewport) -> Result<()> {
        self.draw(&self.properties.id, context, viewport)
    }

    fn bounds(&self) -> Option<LatLngBounds> {
        Some(LatLngBounds::new(self.position, self.position))
    }

    fn popup_at(&self, pixel: &Point, viewport: &Viewport) -> Option<String> {
        if self.properties.interactive && self.contains_pixel(pixel, viewport) {
            self.popup_content.clone()
        } else {
            None
        }
    }
}

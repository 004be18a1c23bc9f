use crate::{
    core::{
        geo::{LatLngBounds, Point},
        viewport::Viewport,
    },
    data::geojson::FeatureCollection,
    layers::{
        base::{LayerProperties, LayerTrait, LayerType},
        marker::Marker,
    },
    rendering::context::RenderContext,
    Result,
};

/// One popup marker per point feature of a collection
pub struct GeoJsonLayer {
    properties: LayerProperties,
    markers: Vec<Marker>,
    bounds: Option<LatLngBounds>,
}

impl GeoJsonLayer {
    pub fn new(id: String, collection: &FeatureCollection) -> Self {
        let markers = collection
            .iter()
            .enumerate()
            .map(|(index, feature)| {
                Marker::new(format!("{}-{}", id, index), feature.lat_lng)
                    .with_popup(feature.popup_content())
            })
            .collect();

        Self {
            properties: LayerProperties::new(id, "Points".to_string(), LayerType::FeatureGroup)
                .with_z_index(30),
            markers,
            bounds: collection.bounds(),
        }
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

impl LayerTrait for GeoJsonLayer {
    crate::impl_layer_trait!(GeoJsonLayer, properties);
    crate::impl_default_options_serialization!(properties);

    fn render(&mut self, context: &mut RenderContext, viewport: &Viewport) -> Result<()> {
        for marker in &self.markers {
            marker.draw(&self.properties.id, context, viewport)?;
        }
        Ok(())
    }

    fn bounds(&self) -> Option<LatLngBounds> {
        self.bounds.clone()
    }

    fn popup_at(&self, pixel: &Point, viewport: &Viewport) -> Option<String> {
        if !self.properties.interactive {
            return None;
        }
        // Last drawn is on top
        self.markers
            .iter()
            .rev()
            .find(|marker| marker.contains_pixel(pixel, viewport))
            .and_then(|marker| marker.popup_content().map(str::to_string))
    }
}

//! Boilerplate shared by every layer implementation

/// Implements the property-backed accessors of `LayerTrait`
///
/// Generates `id`, `name`, `layer_type`, `z_index`/`set_z_index`,
/// `opacity`/`set_opacity`, `is_visible`/`set_visible`, `attribution`,
/// `as_any` and `as_any_mut` from a `LayerProperties` field.
///
/// ```ignore
/// impl LayerTrait for MyLayer {
///     cragmap::impl_layer_trait!(MyLayer, properties);
///     // render, options, ...
/// }
/// ```
#[macro_export]
macro_rules! impl_layer_trait {
    ($layer_type:ty, $properties_field:ident) => {
        fn id(&self) -> &str {
            &self.$properties_field.id
        }

        fn name(&self) -> &str {
            &self.$properties_field.name
        }

        fn layer_type(&self) -> $crate::layers::base::LayerType {
            self.$properties_field.layer_type
        }

        fn z_index(&self) -> i32 {
            self.$properties_field.z_index
        }

        fn set_z_index(&mut self, z_index: i32) {
            self.$properties_field.z_index = z_index;
        }

        fn opacity(&self) -> f32 {
            self.$properties_field.opacity
        }

        fn set_opacity(&mut self, opacity: f32) {
            self.$properties_field.opacity = opacity.clamp(0.0, 1.0);
        }

        fn is_visible(&self) -> bool {
            self.$properties_field.visible
        }

        fn set_visible(&mut self, visible: bool) {
            self.$properties_field.visible = visible;
        }

        fn attribution(&self) -> Option<&str> {
            self.$properties_field.attribution.as_deref()
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    };
}

/// Implements `options()` as a JSON summary of the layer properties
#[macro_export]
macro_rules! impl_default_options_serialization {
    ($properties_field:ident) => {
        fn options(&self) -> serde_json::Value {
            serde_json::json!({
                "id": self.$properties_field.id,
                "name": self.$properties_field.name,
                "layer_type": self.$properties_field.layer_type.to_string(),
                "z_index": self.$properties_field.z_index,
                "opacity": self.$properties_field.opacity,
                "visible": self.$properties_field.visible,
                "interactive": self.$properties_field.interactive,
                "attribution": self.$properties_field.attribution,
            })
        }
    };
}

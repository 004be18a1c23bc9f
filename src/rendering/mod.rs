pub mod colormap;
pub mod context;

pub use colormap::{ColorScale, ColorScaleKind, Rgb};
pub use context::{DrawCommand, RenderContext, RgbaImage};

//! Continuous color scales with multi-stop linear interpolation.
//!
//! A [`ColorScale`] maps a numeric domain `[min, max]` onto a sequence of
//! evenly or explicitly spaced color stops. Values outside the domain clamp
//! to the end colors.

use serde::{Deserialize, Serialize};

/// RGB color with 8-bit channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Lowercase `#rrggbb`
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn to_rgba(&self, alpha: u8) -> [u8; 4] {
        [self.r, self.g, self.b, alpha]
    }
}

/// A color stop: position in [0, 1] mapped to a color
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    pub t: f64,
    pub color: Rgb,
}

impl ColorStop {
    pub const fn new(t: f64, r: u8, g: u8, b: u8) -> Self {
        Self {
            t,
            color: Rgb::new(r, g, b),
        }
    }
}

/// Named color ramps available to raster overlays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScaleKind {
    /// Perceptually uniform purple -> green -> yellow
    Viridis,
    /// Blue -> green -> sand -> brown -> white (hypsometric)
    Terrain,
    /// Black -> white
    Grayscale,
}

impl ColorScaleKind {
    pub fn stops(&self) -> &'static [ColorStop] {
        match self {
            Self::Viridis => VIRIDIS_STOPS,
            Self::Terrain => TERRAIN_STOPS,
            Self::Grayscale => GRAYSCALE_STOPS,
        }
    }
}

// Nine-step viridis, evenly spaced
const VIRIDIS_STOPS: &[ColorStop] = &[
    ColorStop::new(0.000, 0x44, 0x01, 0x54),
    ColorStop::new(0.125, 0x48, 0x27, 0x77),
    ColorStop::new(0.250, 0x3f, 0x4a, 0x8a),
    ColorStop::new(0.375, 0x31, 0x67, 0x8e),
    ColorStop::new(0.500, 0x26, 0x83, 0x8f),
    ColorStop::new(0.625, 0x1f, 0x9d, 0x8a),
    ColorStop::new(0.750, 0x6c, 0xce, 0x5a),
    ColorStop::new(0.875, 0xb6, 0xde, 0x2b),
    ColorStop::new(1.000, 0xfe, 0xe8, 0x25),
];

const TERRAIN_STOPS: &[ColorStop] = &[
    ColorStop::new(0.00, 51, 51, 153),
    ColorStop::new(0.15, 0, 153, 255),
    ColorStop::new(0.25, 0, 204, 102),
    ColorStop::new(0.50, 255, 255, 153),
    ColorStop::new(0.75, 128, 92, 84),
    ColorStop::new(1.00, 255, 255, 255),
];

const GRAYSCALE_STOPS: &[ColorStop] = &[
    ColorStop::new(0.0, 0, 0, 0),
    ColorStop::new(1.0, 255, 255, 255),
];

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn lerp_color(c1: Rgb, c2: Rgb, t: f64) -> Rgb {
    Rgb::new(
        lerp(c1.r as f64, c2.r as f64, t).round() as u8,
        lerp(c1.g as f64, c2.g as f64, t).round() as u8,
        lerp(c1.b as f64, c2.b as f64, t).round() as u8,
    )
}

fn multi_stop(stops: &[ColorStop], t: f64) -> Rgb {
    if t <= stops[0].t {
        return stops[0].color;
    }
    for pair in stops.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if t <= hi.t {
            let ratio = (t - lo.t) / (hi.t - lo.t);
            return lerp_color(lo.color, hi.color, ratio);
        }
    }
    stops[stops.len() - 1].color
}

/// A color ramp bound to a numeric domain
#[derive(Debug, Clone, PartialEq)]
pub struct ColorScale {
    kind: ColorScaleKind,
    min: f64,
    max: f64,
}

impl ColorScale {
    /// A scale over the unit domain `[0, 1]`
    pub fn new(kind: ColorScaleKind) -> Self {
        Self {
            kind,
            min: 0.0,
            max: 1.0,
        }
    }

    pub fn viridis() -> Self {
        Self::new(ColorScaleKind::Viridis)
    }

    /// Rebinds the scale to `[min, max]`
    pub fn domain(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn kind(&self) -> ColorScaleKind {
        self.kind
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    /// Normalized position of `value` in the domain, clamped to [0, 1].
    /// A zero-width domain maps everything to 0.
    pub fn normalize(&self, value: f64) -> f64 {
        let range = self.max - self.min;
        if range.abs() < f64::EPSILON || !range.is_finite() {
            return 0.0;
        }
        ((value - self.min) / range).clamp(0.0, 1.0)
    }

    /// Color for `value`; NaN maps to the start color
    pub fn color(&self, value: f64) -> Rgb {
        let t = if value.is_nan() { 0.0 } else { self.normalize(value) };
        multi_stop(self.kind.stops(), t)
    }

    pub fn start_color(&self) -> Rgb {
        self.kind.stops()[0].color
    }

    pub fn end_color(&self) -> Rgb {
        self.kind.stops()[self.kind.stops().len() - 1].color
    }
}

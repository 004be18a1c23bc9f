//! GeoTIFF decoding into a numeric raster grid
//!
//! The decoder reads pixel samples of any integer or float type, the
//! GDAL nodata tag, and enough GeoTIFF georeferencing (pixel scale and
//! tiepoint, or a full model transformation, plus the EPSG code from the
//! GeoKey directory) to place the grid on the map.

use crate::core::geo::{LatLng, LatLngBounds, Point};
use crate::{MapError, Result};
use std::io::Cursor;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;

fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// Affine pixel-to-model transform in GDAL order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub row_rotation: f64,
    pub origin_y: f64,
    pub col_rotation: f64,
    /// Negative for north-up rasters
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform without rotation
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            pixel_width,
            row_rotation: 0.0,
            origin_y,
            col_rotation: 0.0,
            pixel_height,
        }
    }

    /// Model coordinates of the pixel corner at (col, row)
    pub fn apply(&self, col: f64, row: f64) -> Point {
        Point::new(
            self.origin_x + col * self.pixel_width + row * self.row_rotation,
            self.origin_y + col * self.col_rotation + row * self.pixel_height,
        )
    }
}

/// A decoded raster: per-band samples plus georeferencing
#[derive(Debug, Clone, PartialEq)]
pub struct RasterGrid {
    pub width: usize,
    pub height: usize,
    /// Row-major samples, one vector per band
    pub bands: Vec<Vec<f64>>,
    pub no_data: Option<f64>,
    /// Per-band minimum over valid samples; NaN for a band with none
    pub mins: Vec<f64>,
    /// Per-band maximum over valid samples; NaN for a band with none
    pub maxs: Vec<f64>,
    pub transform: Option<GeoTransform>,
    pub epsg: Option<u16>,
}

impl RasterGrid {
    /// Builds a grid and computes the per-band value range
    pub fn from_bands(
        width: usize,
        height: usize,
        bands: Vec<Vec<f64>>,
        no_data: Option<f64>,
    ) -> Result<Self> {
        if bands.is_empty() {
            return Err(MapError::Decode("raster has no bands".to_string()));
        }
        if let Some(band) = bands.iter().find(|band| band.len() != width * height) {
            return Err(MapError::Decode(format!(
                "band holds {} samples, expected {}x{}",
                band.len(),
                width,
                height
            )));
        }

        let mut grid = Self {
            width,
            height,
            bands,
            no_data,
            mins: Vec::new(),
            maxs: Vec::new(),
            transform: None,
            epsg: None,
        };

        for band in &grid.bands {
            let (min, max) = band
                .iter()
                .copied()
                .filter(|v| !grid.is_no_data(*v))
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                    (lo.min(v), hi.max(v))
                });
            if min > max {
                grid.mins.push(f64::NAN);
                grid.maxs.push(f64::NAN);
            } else {
                grid.mins.push(min);
                grid.maxs.push(max);
            }
        }

        Ok(grid)
    }

    pub fn with_georeference(mut self, transform: GeoTransform, epsg: Option<u16>) -> Self {
        self.transform = Some(transform);
        self.epsg = epsg;
        self
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn value(&self, band: usize, col: usize, row: usize) -> Option<f64> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.bands.get(band).map(|b| b[row * self.width + col])
    }

    /// NaN and the declared nodata value both count as "no data"
    pub fn is_no_data(&self, value: f64) -> bool {
        value.is_nan() || self.no_data.map_or(false, |nd| value == nd)
    }

    /// Geographic extent of the grid
    pub fn bounds(&self) -> Result<LatLngBounds> {
        let transform = self
            .transform
            .ok_or_else(|| MapError::Decode("raster is not georeferenced".to_string()))?;
        let epsg = self.epsg.unwrap_or(4326);

        let (w, h) = (self.width as f64, self.height as f64);
        let corners = [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)]
            .iter()
            .map(|&(col, row)| model_to_lat_lng(transform.apply(col, row), epsg))
            .collect::<Result<Vec<_>>>()?;

        LatLngBounds::from_points(&corners)
            .ok_or_else(|| MapError::Decode("raster has no extent".to_string()))
    }

    pub fn center(&self) -> Result<LatLng> {
        Ok(self.bounds()?.center())
    }
}

/// Converts model-space coordinates in `epsg` to WGS84
pub fn model_to_lat_lng(point: Point, epsg: u16) -> Result<LatLng> {
    match epsg {
        4326 | 4269 => Ok(LatLng::new(point.y, point.x)),
        3857 => Ok(LatLng::from_mercator(point)),
        32601..=32660 => Ok(utm_to_lat_lng(point, (epsg - 32600) as u8, true)),
        32701..=32760 => Ok(utm_to_lat_lng(point, (epsg - 32700) as u8, false)),
        26901..=26923 => Ok(utm_to_lat_lng(point, (epsg - 26900) as u8, true)),
        other => Err(MapError::UnsupportedProjection(other)),
    }
}

/// Inverse transverse Mercator on the WGS84 ellipsoid
pub fn utm_to_lat_lng(point: Point, zone: u8, northern: bool) -> LatLng {
    const K0: f64 = 0.9996;
    const A: f64 = 6_378_137.0;
    const F: f64 = 1.0 / 298.257_223_563;

    let e2 = F * (2.0 - F);
    let ep2 = e2 / (1.0 - e2);
    let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

    let x = point.x - 500_000.0;
    let y = if northern {
        point.y
    } else {
        point.y - 10_000_000.0
    };

    let m = y / K0;
    let mu = m / (A * (1.0 - e2 / 4.0 - 3.0 * e2.powi(2) / 64.0 - 5.0 * e2.powi(3) / 256.0));

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1.powi(2) / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let sin_phi = phi1.sin();
    let cos_phi = phi1.cos();
    let n1 = A / (1.0 - e2 * sin_phi * sin_phi).sqrt();
    let t1 = phi1.tan().powi(2);
    let c1 = ep2 * cos_phi * cos_phi;
    let r1 = A * (1.0 - e2) / (1.0 - e2 * sin_phi * sin_phi).powf(1.5);
    let d = x / (n1 * K0);

    let lat = phi1
        - (n1 * phi1.tan() / r1)
            * (d.powi(2) / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1.powi(2) - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1.powi(2)
                    - 252.0 * ep2
                    - 3.0 * c1.powi(2))
                    * d.powi(6)
                    / 720.0);

    let lng = (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
        + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1.powi(2) + 8.0 * ep2 + 24.0 * t1.powi(2))
            * d.powi(5)
            / 120.0)
        / cos_phi;

    let central_meridian = (zone as f64 - 1.0) * 6.0 - 180.0 + 3.0;
    LatLng::new(lat.to_degrees(), central_meridian + lng.to_degrees())
}

fn samples_to_f64(result: DecodingResult) -> Result<Vec<f64>> {
    #[allow(unreachable_patterns)]
    let samples = match result {
        DecodingResult::U8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U64(buf) => buf.into_iter().map(|v| v as f64).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I64(buf) => buf.into_iter().map(|v| v as f64).collect(),
        DecodingResult::F32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::F64(buf) => buf,
        _ => {
            return Err(MapError::Decode(
                "unsupported TIFF sample format".to_string(),
            ))
        }
    };
    Ok(samples)
}

fn read_transform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<Option<GeoTransform>> {
    if let Some(matrix) = decoder.find_tag(tag(MODEL_TRANSFORMATION))? {
        let m = matrix.into_f64_vec()?;
        if m.len() >= 8 {
            return Ok(Some(GeoTransform {
                origin_x: m[3],
                pixel_width: m[0],
                row_rotation: m[1],
                origin_y: m[7],
                col_rotation: m[4],
                pixel_height: m[5],
            }));
        }
    }

    let scale = decoder.find_tag(tag(MODEL_PIXEL_SCALE))?;
    let tiepoint = decoder.find_tag(tag(MODEL_TIEPOINT))?;
    match (scale, tiepoint) {
        (Some(scale), Some(tiepoint)) => {
            let scale = scale.into_f64_vec()?;
            let tiepoint = tiepoint.into_f64_vec()?;
            if scale.len() < 2 || tiepoint.len() < 6 {
                return Ok(None);
            }
            // tiepoint: [I, J, K, X, Y, Z]
            let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
            Ok(Some(GeoTransform::new(
                origin_x, origin_y, scale[0], -scale[1],
            )))
        }
        _ => Ok(None),
    }
}

fn read_epsg<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Result<Option<u16>> {
    let directory = match decoder.find_tag(tag(GEO_KEY_DIRECTORY))? {
        Some(value) => value.into_u16_vec()?,
        None => return Ok(None),
    };
    if directory.len() < 4 {
        return Ok(None);
    }

    let mut model_type = None;
    let mut geographic = None;
    let mut projected = None;
    // Only inline SHORT values (location 0) are needed here
    for entry in directory[4..].chunks_exact(4) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        if location != 0 {
            continue;
        }
        match key {
            GT_MODEL_TYPE_KEY => model_type = Some(value),
            GEOGRAPHIC_TYPE_KEY => geographic = Some(value),
            PROJECTED_CS_TYPE_KEY => projected = Some(value),
            _ => {}
        }
    }

    Ok(match model_type {
        Some(MODEL_TYPE_PROJECTED) => projected,
        Some(MODEL_TYPE_GEOGRAPHIC) => geographic,
        _ => projected.or(geographic),
    })
}

fn read_no_data<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Result<Option<f64>> {
    let Some(value) = decoder.find_tag(tag(GDAL_NODATA))? else {
        return Ok(None);
    };
    let text = value.into_string()?;
    let text = text.trim_matches(char::from(0)).trim();
    if text.eq_ignore_ascii_case("nan") {
        return Ok(Some(f64::NAN));
    }
    text.parse::<f64>()
        .map(Some)
        .map_err(|_| MapError::Decode(format!("invalid GDAL_NODATA value {:?}", text)))
}

/// Decodes a GeoTIFF payload into a [`RasterGrid`]
pub fn parse_georaster(bytes: &[u8]) -> Result<RasterGrid> {
    let mut decoder = Decoder::new(Cursor::new(bytes))?;
    let (width, height) = decoder.dimensions()?;
    let (width, height) = (width as usize, height as usize);

    let transform = read_transform(&mut decoder)?;
    let epsg = read_epsg(&mut decoder)?;
    let no_data = read_no_data(&mut decoder)?;

    let samples = samples_to_f64(decoder.read_image()?)?;
    let pixel_count = width * height;
    if pixel_count == 0 || samples.len() % pixel_count != 0 {
        return Err(MapError::Decode(format!(
            "{} samples do not fill a {}x{} grid",
            samples.len(),
            width,
            height
        )));
    }

    // Chunky layout: samples for one pixel are adjacent
    let band_count = samples.len() / pixel_count;
    let bands = (0..band_count)
        .map(|band| {
            samples
                .iter()
                .skip(band)
                .step_by(band_count)
                .copied()
                .collect::<Vec<_>>()
        })
        .collect();

    let mut grid = RasterGrid::from_bands(width, height, bands, no_data)?;
    grid.transform = transform;
    grid.epsg = epsg;

    log::debug!(
        "decoded {}x{} raster, {} band(s), epsg {:?}, nodata {:?}",
        width,
        height,
        band_count,
        epsg,
        no_data
    );
    Ok(grid)
}

/// Encodes the first band of a grid as a single-band float32 GeoTIFF
pub fn encode_georaster(grid: &RasterGrid) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let mut encoder = TiffEncoder::new(Cursor::new(&mut buffer))?;
        let mut image = encoder.new_image::<Gray32Float>(grid.width as u32, grid.height as u32)?;

        if let Some(gt) = grid.transform {
            let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
            image
                .encoder()
                .write_tag(tag(MODEL_PIXEL_SCALE), &scale[..])?;
            let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
            image
                .encoder()
                .write_tag(tag(MODEL_TIEPOINT), &tiepoint[..])?;
        }

        if let Some(epsg) = grid.epsg {
            let (model_type, key) = if epsg == 4326 || epsg == 4269 {
                (MODEL_TYPE_GEOGRAPHIC, GEOGRAPHIC_TYPE_KEY)
            } else {
                (MODEL_TYPE_PROJECTED, PROJECTED_CS_TYPE_KEY)
            };
            let geokeys: [u16; 12] = [
                1, 1, 0, 2, // version 1.1.0, two keys
                GT_MODEL_TYPE_KEY, 0, 1, model_type,
                key, 0, 1, epsg,
            ];
            image
                .encoder()
                .write_tag(tag(GEO_KEY_DIRECTORY), &geokeys[..])?;
        }

        if let Some(no_data) = grid.no_data {
            let text = no_data.to_string();
            image
                .encoder()
                .write_tag(tag(GDAL_NODATA), text.as_str())?;
        }

        let data: Vec<f32> = grid.bands[0].iter().map(|&v| v as f32).collect();
        image.write_data(&data)?;
    }
    Ok(buffer)
}

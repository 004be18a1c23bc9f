#![allow(dead_code)]

use async_trait::async_trait;
use cragmap::data::fetch::AssetFetcher;
use cragmap::data::georaster::{encode_georaster, GeoTransform, RasterGrid};
use cragmap::{MapError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;

pub const POINTS_PATH: &str = "/data/all_boulders.geojson";
pub const RASTER_PATH: &str = "/data/dtm/morin_heights_dtm_slope.tif";

pub const BOULDERS: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [-74.1915, 46.027] },
            "properties": { "name": "Boulder A", "description": "" }
        },
        {
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [-74.1890, 46.0285] },
            "properties": { "name": "Boulder B", "description": "Crimpy start" }
        },
        {
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [-74.1940, 46.0255] },
            "properties": { "name": "Boulder C", "description": "   " }
        }
    ]
}"#;

/// A 4x3 slope raster around the default view, with one nodata cell
pub fn slope_tiff() -> Vec<u8> {
    let samples = vec![
        2.0, 8.0, 14.0, 20.0, //
        26.0, -9999.0, 38.0, 44.0, //
        50.0, 56.0, 62.0, 68.0,
    ];
    let grid = RasterGrid::from_bands(4, 3, vec![samples], Some(-9999.0))
        .unwrap()
        .with_georeference(GeoTransform::new(-74.20, 46.035, 0.005, -0.005), Some(4326));
    encode_georaster(&grid).unwrap()
}

/// Serves assets from memory. Every fetch first waits for a permit, so a
/// test decides exactly when requests complete.
pub struct GatedFetcher {
    assets: HashMap<String, Vec<u8>>,
    gate: Semaphore,
    calls: AtomicUsize,
}

impl GatedFetcher {
    pub fn new(assets: Vec<(&str, Vec<u8>)>) -> Self {
        Self {
            assets: assets
                .into_iter()
                .map(|(path, bytes)| (path.to_string(), bytes))
                .collect(),
            gate: Semaphore::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fetcher whose requests complete immediately
    pub fn open(assets: Vec<(&str, Vec<u8>)>) -> Self {
        let fetcher = Self::new(assets);
        fetcher.gate.add_permits(1 << 20);
        fetcher
    }

    pub fn release(&self, requests: usize) {
        self.gate.add_permits(requests);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetFetcher for GatedFetcher {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|err| MapError::Layer(err.to_string()))?;
        permit.forget();
        self.assets.get(path).cloned().ok_or_else(|| MapError::Http {
            status: 404,
            url: path.to_string(),
        })
    }

    fn describe(&self) -> String {
        "gated memory fetcher".to_string()
    }
}

/// Answers every tile request with the request path as payload
pub struct EchoTileFetcher;

#[async_trait]
impl AssetFetcher for EchoTileFetcher {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        Ok(path.as_bytes().to_vec())
    }
}

/// Yields to the runtime until `condition` holds or about a second passes
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Gives background tasks a few turns of the runtime
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
}

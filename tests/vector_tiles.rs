#![cfg(feature = "vector-tiles")]

mod common;

use async_trait::async_trait;
use common::*;
use cragmap::data::fetch::AssetFetcher;
use cragmap::layers::vector_tile::{property_feature_id, VectorTileOptions};
use cragmap::overlays::VectorOverlay;
use cragmap::rendering::context::{DrawCommand, RenderContext};
use cragmap::{LoadState, Map, MapHandle, MapOptions, Overlay, Result};
use geozero::mvt::tile::{self, GeomType};
use geozero::mvt::{Message, Tile};
use std::sync::{Arc, Mutex};

fn command(id: u32, count: u32) -> u32 {
    (count << 3) | id
}

fn zigzag(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

/// One "trails" layer with two line features, only the first carrying an id
fn trails_tile() -> Vec<u8> {
    let line = vec![
        command(1, 1),
        zigzag(100),
        zigzag(100),
        command(2, 2),
        zigzag(500),
        zigzag(0),
        zigzag(0),
        zigzag(500),
    ];
    let layer = tile::Layer {
        version: 2,
        name: "trails".to_string(),
        keys: vec!["trail_id".to_string()],
        values: vec![tile::Value {
            string_value: Some("north-loop".to_string()),
            ..Default::default()
        }],
        extent: Some(4096),
        features: vec![
            tile::Feature {
                id: Some(11),
                tags: vec![0, 0],
                r#type: Some(GeomType::Linestring as i32),
                geometry: line.clone(),
            },
            tile::Feature {
                id: Some(12),
                tags: vec![],
                r#type: Some(GeomType::Linestring as i32),
                geometry: line,
            },
        ],
    };
    Tile {
        layers: vec![layer],
    }
    .encode_to_vec()
}

struct StaticTileFetcher(Vec<u8>);

#[async_trait]
impl AssetFetcher for StaticTileFetcher {
    async fn fetch(&self, _path: &str) -> Result<Vec<u8>> {
        Ok(self.0.clone())
    }
}

fn render(map: &MapHandle) -> RenderContext {
    let mut context = RenderContext::new(0, 0);
    map.write().unwrap().render(&mut context).unwrap();
    context
}

#[tokio::test]
async fn test_callbacks_fire_once_per_feature() {
    let seen: Arc<Mutex<Vec<Option<String>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let options = VectorTileOptions {
        get_feature_id: property_feature_id("trail_id"),
        on_each_feature: Arc::new(move |_feature, id| {
            sink.lock().unwrap().push(id.map(str::to_string));
        }),
        ..VectorTileOptions::default()
    };

    let map = MapHandle::new(Map::new(MapOptions::default()));
    let payload = trails_tile();
    let mut overlay = VectorOverlay::new("https://tiles.test/{z}/{y}/{x}.pbf", options)
        .with_fetcher(Arc::new(StaticTileFetcher(payload.clone())));
    overlay.mount(&map);
    assert_eq!(overlay.state(), LoadState::Ready);

    assert_eq!(render(&map).commands().len(), 0);
    assert!(wait_until(|| !map.read().unwrap().is_loading()).await);

    let context = render(&map);
    let tiles: Vec<_> = context
        .commands()
        .iter()
        .filter_map(|command| match command {
            DrawCommand::VectorTile { coord, data, .. } => Some((*coord, data.clone())),
            _ => None,
        })
        .collect();
    assert!(!tiles.is_empty());
    for (coord, data) in &tiles {
        assert_eq!(coord.z, 16);
        assert_eq!(data.as_slice(), payload.as_slice());
    }

    {
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), tiles.len() * 2);
        assert_eq!(seen[0].as_deref(), Some("north-loop"));
        assert_eq!(seen[1].as_deref(), Some("12"));
    }

    render(&map);
    assert_eq!(seen.lock().unwrap().len(), tiles.len() * 2);
}

#[tokio::test]
async fn test_hidden_overlay_draws_nothing() {
    let map = MapHandle::new(Map::new(MapOptions::default()));
    let mut overlay = VectorOverlay::new("{z}/{y}/{x}.pbf", VectorTileOptions::default())
        .with_fetcher(Arc::new(StaticTileFetcher(trails_tile())));
    overlay.mount(&map);

    assert!(overlay.set_visible(false));
    render(&map);
    settle().await;
    assert_eq!(render(&map).commands().len(), 0);

    overlay.unmount();
    assert_eq!(map.read().unwrap().layer_count(), 0);
}

use cragmap::{
    constants::TILE_CACHE_CAPACITY,
    data::mvt::{decode_tile, VectorFeature},
    rendering::context::{DrawCommand, RenderContext, RgbaImage, ScreenBounds},
    runtime::{init_runtime, TokioSpawner},
    LatLng, Point, TileCoord, Viewer, ViewerConfig,
};
use egui::{Color32, ColorImage, Pos2, Rect, Sense, Stroke, TextureHandle, TextureOptions};
use fxhash::FxHashMap;
use geo_types::{Coord, Geometry, LineString};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;

const CONFIG_FILE: &str = "cragmap.json";
const SCROLL_ZOOM_RATE: f64 = 0.002;
const MARKER_RADIUS: f32 = 7.0;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    init_runtime(Box::new(TokioSpawner::with_handle(
        tokio::runtime::Handle::current(),
    )));

    let config = if Path::new(CONFIG_FILE).exists() {
        ViewerConfig::load(CONFIG_FILE)?
    } else {
        log::info!("no {} found, using the default composition", CONFIG_FILE);
        ViewerConfig::default()
    };
    let size = config.view.size;
    let viewer = Viewer::from_config(config)?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([size.x as f32, size.y as f32])
            .with_title("cragmap"),
        ..Default::default()
    };

    eframe::run_native(
        "cragmap-app",
        options,
        Box::new(|_cc| Box::new(CragmapApp::new(viewer))),
    )
    .map_err(|err| anyhow::anyhow!("viewer window failed: {}", err))
}

/// Vector tile geometry as lines in tile fractions
type TileShapes = Vec<Vec<(f64, f64)>>;

struct CragmapApp {
    viewer: Viewer,
    context: RenderContext,
    /// `None` marks a tile whose image could not be decoded
    tile_textures: LruCache<TileCoord, Option<TextureHandle>>,
    image_textures: FxHashMap<String, (usize, TextureHandle)>,
    vector_shapes: LruCache<TileCoord, Arc<TileShapes>>,
    popup: Option<(LatLng, String)>,
    show_vector: bool,
}

impl CragmapApp {
    fn new(viewer: Viewer) -> Self {
        let show_vector = viewer.config().vector.enabled;
        let capacity = NonZeroUsize::new(TILE_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            viewer,
            context: RenderContext::new(0, 0),
            tile_textures: LruCache::new(capacity),
            image_textures: FxHashMap::default(),
            vector_shapes: LruCache::new(capacity),
            popup: None,
            show_vector,
        }
    }

    fn handle_input(&mut self, ui: &egui::Ui, response: &egui::Response, rect: Rect) {
        let Ok(mut map) = self.viewer.map().write() else {
            return;
        };
        map.set_size(Point::new(rect.width() as f64, rect.height() as f64));

        if response.hovered() {
            let scroll = ui.input(|i| i.raw_scroll_delta.y);
            if scroll.abs() > 0.1 {
                let focus = response
                    .hover_pos()
                    .map(|pos| Point::new((pos.x - rect.min.x) as f64, (pos.y - rect.min.y) as f64));
                let zoom = map.viewport().zoom + scroll as f64 * SCROLL_ZOOM_RATE;
                map.zoom_to(zoom, focus);
            }
        }

        if response.dragged() {
            let delta = response.drag_delta();
            if delta.length_sq() > 0.25 {
                map.pan(Point::new(delta.x as f64, delta.y as f64));
            }
        }

        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let pixel = Point::new((pos.x - rect.min.x) as f64, (pos.y - rect.min.y) as f64);
                self.popup = map
                    .popup_at(&pixel)
                    .map(|html| (map.viewport().pixel_to_lat_lng(&pixel), html));
            }
        }
    }

    fn paint(&mut self, ui: &egui::Ui, rect: Rect) {
        {
            let Ok(mut map) = self.viewer.map().write() else {
                return;
            };
            if let Err(err) = map.render(&mut self.context) {
                log::warn!("render failed: {}", err);
            }
        }

        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, Color32::from_rgb(30, 34, 30));

        for command in self.context.commands() {
            match command {
                DrawCommand::Tile {
                    coord,
                    data,
                    bounds,
                    opacity,
                } => {
                    let texture = cached(&mut self.tile_textures, *coord, || {
                        decode_tile_image(data).map(|image| {
                            ui.ctx().load_texture(
                                format!("tile-{}", coord),
                                image,
                                TextureOptions::LINEAR,
                            )
                        })
                    });
                    if let Some(texture) = texture {
                        paint_texture(&painter, rect, &texture, bounds, *opacity);
                    }
                }
                DrawCommand::Image {
                    layer_id,
                    image,
                    bounds,
                    opacity,
                } => {
                    let key = Arc::as_ptr(image) as usize;
                    let texture = match self.image_textures.get(layer_id) {
                        Some((cached_key, texture)) if *cached_key == key => texture.clone(),
                        _ => {
                            let texture = ui.ctx().load_texture(
                                format!("image-{}", layer_id),
                                color_image(image),
                                TextureOptions::NEAREST,
                            );
                            self.image_textures
                                .insert(layer_id.clone(), (key, texture.clone()));
                            texture
                        }
                    };
                    paint_texture(&painter, rect, &texture, bounds, *opacity);
                }
                DrawCommand::VectorTile {
                    coord,
                    data,
                    bounds,
                    opacity,
                } => {
                    let shapes = cached(&mut self.vector_shapes, *coord, || {
                        Arc::new(tile_shapes(data))
                    });
                    let alpha = (opacity * 200.0) as u8;
                    let stroke = Stroke::new(1.0, Color32::from_rgba_unmultiplied(250, 220, 120, alpha));
                    let (min, max) = *bounds;
                    for line in shapes.iter() {
                        let points = line
                            .iter()
                            .map(|&(fx, fy)| {
                                to_screen(
                                    rect,
                                    Point::new(min.x + fx * (max.x - min.x), min.y + fy * (max.y - min.y)),
                                )
                            })
                            .collect::<Vec<_>>();
                        painter.add(egui::Shape::line(points, stroke));
                    }
                }
                DrawCommand::Marker { position, .. } => {
                    let center = to_screen(rect, *position);
                    painter.circle(
                        center,
                        MARKER_RADIUS,
                        Color32::from_rgb(220, 60, 40),
                        Stroke::new(2.0, Color32::WHITE),
                    );
                }
            }
        }
    }

    fn side_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("layers").resizable(false).show(ctx, |ui| {
            ui.heading("Layers");
            ui.separator();

            for (layer_id, state) in self.viewer.overlay_states() {
                ui.label(format!("{}: {:?}", layer_id, state));
            }

            ui.separator();
            if ui.checkbox(&mut self.show_vector, "Vector tiles").changed() {
                self.viewer.set_vector_enabled(self.show_vector);
            }
            if let Some(bounds) = self.viewer.raster().and_then(|raster| raster.bounds()) {
                if ui.button("Zoom to raster").clicked() {
                    if let Ok(mut map) = self.viewer.map().write() {
                        map.fit_bounds(&bounds, None);
                    }
                }
            }
        });
    }
}

impl eframe::App for CragmapApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.side_panel(ctx);

        let (center, zoom, attributions) = match self.viewer.map().read() {
            Ok(map) => (map.viewport().center, map.viewport().zoom, map.attributions()),
            Err(_) => return,
        };

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(format!(
                    "Center: {:.4}, {:.4} | Zoom: {:.2}",
                    center.lat, center.lng, zoom
                ));
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(attributions.join(" | "));
                });
            });
        });

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                let (rect, response) =
                    ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
                self.handle_input(ui, &response, rect);
                self.paint(ui, rect);
            });

        if let Some((lat_lng, html)) = self.popup.clone() {
            let mut open = true;
            egui::Window::new("Boulder")
                .open(&mut open)
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    popup_ui(ui, &html);
                    ui.small(format!("{:.5}, {:.5}", lat_lng.lat, lat_lng.lng));
                });
            if !open {
                self.popup = None;
            }
        }

        if self.viewer.is_loading() {
            ctx.request_repaint();
        }
    }
}

/// Looks `key` up, building and remembering the value on a miss
fn cached<V: Clone>(
    cache: &mut LruCache<TileCoord, V>,
    key: TileCoord,
    build: impl FnOnce() -> V,
) -> V {
    if let Some(value) = cache.get(&key) {
        return value.clone();
    }
    let value = build();
    cache.put(key, value.clone());
    value
}

fn to_screen(rect: Rect, point: Point) -> Pos2 {
    Pos2::new(rect.min.x + point.x as f32, rect.min.y + point.y as f32)
}

fn paint_texture(
    painter: &egui::Painter,
    rect: Rect,
    texture: &TextureHandle,
    bounds: &ScreenBounds,
    opacity: f32,
) {
    let (min, max) = *bounds;
    painter.image(
        texture.id(),
        Rect::from_two_pos(to_screen(rect, min), to_screen(rect, max)),
        Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
        Color32::from_white_alpha((opacity.clamp(0.0, 1.0) * 255.0) as u8),
    );
}

fn decode_tile_image(bytes: &[u8]) -> Option<ColorImage> {
    let image = match image::load_from_memory(bytes) {
        Ok(image) => image.to_rgba8(),
        Err(err) => {
            log::debug!("undecodable tile image: {}", err);
            return None;
        }
    };
    let size = [image.width() as usize, image.height() as usize];
    Some(ColorImage::from_rgba_unmultiplied(size, image.as_raw()))
}

fn color_image(image: &RgbaImage) -> ColorImage {
    ColorImage::from_rgba_unmultiplied(
        [image.width as usize, image.height as usize],
        &image.pixels,
    )
}

fn tile_shapes(data: &[u8]) -> TileShapes {
    let features = match decode_tile(data) {
        Ok(features) => features,
        Err(err) => {
            log::debug!("skipping vector tile: {}", err);
            return Vec::new();
        }
    };

    let mut shapes = Vec::new();
    for feature in &features {
        let Some(geometry) = &feature.geometry else {
            continue;
        };
        collect_lines(feature, geometry, &mut shapes);
    }
    shapes
}

fn collect_lines(feature: &VectorFeature, geometry: &Geometry<f64>, shapes: &mut TileShapes) {
    let mut push = |line: &LineString<f64>| {
        shapes.push(line.0.iter().map(|c: &Coord<f64>| feature.tile_fraction(*c)).collect());
    };
    match geometry {
        Geometry::LineString(line) => push(line),
        Geometry::MultiLineString(lines) => lines.0.iter().for_each(&mut push),
        Geometry::Polygon(polygon) => {
            push(polygon.exterior());
            polygon.interiors().iter().for_each(&mut push);
        }
        Geometry::MultiPolygon(polygons) => {
            for polygon in &polygons.0 {
                push(polygon.exterior());
                polygon.interiors().iter().for_each(&mut push);
            }
        }
        _ => {}
    }
}

/// Popup HTML is `<strong>name</strong>` optionally followed by `<br>text`
fn popup_ui(ui: &mut egui::Ui, html: &str) {
    let mut parts = html.splitn(2, "<br>");
    let title = parts
        .next()
        .unwrap_or_default()
        .replace("<strong>", "")
        .replace("</strong>", "");
    ui.label(egui::RichText::new(title).strong());
    if let Some(description) = parts.next() {
        ui.label(description);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_remembers_failed_decodes() {
        let mut cache: LruCache<TileCoord, Option<u32>> =
            LruCache::new(NonZeroUsize::new(4).unwrap());
        let coord = TileCoord::new(1, 2, 3);
        let mut builds = 0;
        for _ in 0..3 {
            let value = cached(&mut cache, coord, || {
                builds += 1;
                None
            });
            assert_eq!(value, None);
        }
        assert_eq!(builds, 1);
    }

    #[test]
    fn test_cache_stays_bounded() {
        let mut cache: LruCache<TileCoord, Arc<TileShapes>> =
            LruCache::new(NonZeroUsize::new(2).unwrap());
        for x in 0..10 {
            cached(&mut cache, TileCoord::new(x, 0, 4), || Arc::new(Vec::new()));
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&TileCoord::new(9, 0, 4)));
        assert!(!cache.contains(&TileCoord::new(0, 0, 4)));
    }

    #[test]
    fn test_garbage_vector_tile_has_no_shapes() {
        assert!(tile_shapes(&[0xff, 0xff, 0xff]).is_empty());
    }
}

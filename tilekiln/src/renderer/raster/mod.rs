//! Software map renderer.
//!
//! Draws the subset of the style format the bundled styles use:
//!
//! - `background` layers
//! - `raster` layers from `raster` sources with `tiles` URL templates
//! - `fill` and `line` layers from `geojson` sources
//!
//! Other layer types (for example vector tile layers) are skipped. The
//! camera uses 512px world tiles, so a 512x512 render at zoom `z` centred on
//! the centre of XYZ tile `(z, x, y)` covers exactly that tile.

mod features;
mod paint;

use std::collections::HashMap;
use std::f64::consts::PI;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tiny_skia::{
    FillRule, FilterQuality, IntSize, PathBuilder, Pixmap, PixmapPaint, Stroke, Transform,
};
use tracing::{debug, trace};

use super::{
    MapRenderer, RawImage, RenderError, RenderOptions, RendererFactory, ResourceRequestHandler,
    TILE_SIZE,
};
use crate::coord::{MAX_LAT, MAX_ZOOM, MIN_LAT};
use crate::style::StyleDocument;
use features::{Feature, Geometry, Position};

// =============================================================================
// Factory
// =============================================================================

/// Creates [`RasterRenderer`] instances bound to a style and source directory.
#[derive(Debug, Clone)]
pub struct RasterRendererFactory {
    style_dir: PathBuf,
    source_dir: PathBuf,
}

impl RasterRendererFactory {
    pub fn new(style_dir: impl Into<PathBuf>, source_dir: impl Into<PathBuf>) -> Self {
        Self {
            style_dir: style_dir.into(),
            source_dir: source_dir.into(),
        }
    }
}

impl RendererFactory for RasterRendererFactory {
    type Renderer = RasterRenderer;

    async fn create(&self) -> Result<RasterRenderer, RenderError> {
        let requests = ResourceRequestHandler::new(&self.style_dir, &self.source_dir)
            .map_err(|e| RenderError::Create(e.to_string()))?;
        Ok(RasterRenderer::new(Arc::new(requests)))
    }
}

/// Returns the ids of layers [`RasterRenderer`] skips: unsupported layer
/// types, and `fill`/`line` layers whose source is not GeoJSON.
///
/// A style where every layer is skipped renders empty tiles, which is the
/// case for the vector `protomaps` base style.
pub fn undrawable_layers(style: &StyleDocument) -> Vec<&str> {
    let json = style.as_json();
    json["layers"]
        .as_array()
        .into_iter()
        .flatten()
        .filter(|layer| match layer["type"].as_str().unwrap_or_default() {
            "background" | "raster" => false,
            "fill" | "line" => {
                let source = layer["source"].as_str().unwrap_or_default();
                json["sources"][source]["type"].as_str() != Some("geojson")
            }
            _ => true,
        })
        .filter_map(|layer| layer["id"].as_str())
        .collect()
}

// =============================================================================
// Renderer
// =============================================================================

/// A style loaded into a renderer, with its GeoJSON sources parsed.
struct LoadedStyle {
    document: StyleDocument,
    geojson: HashMap<String, GeoJsonSource>,
}

enum GeoJsonSource {
    Parsed(Arc<Vec<Feature>>),
    Remote(String),
}

/// Software renderer drawing with `tiny-skia`.
pub struct RasterRenderer {
    requests: Arc<ResourceRequestHandler>,
    style: Option<LoadedStyle>,
}

impl RasterRenderer {
    /// Creates a renderer that loads resources through `requests`.
    pub fn new(requests: Arc<ResourceRequestHandler>) -> Self {
        Self {
            requests,
            style: None,
        }
    }

    /// Fetches and parses GeoJSON sources given by URL.
    async fn resolve_remote_sources(&mut self) -> Result<(), RenderError> {
        let Some(loaded) = self.style.as_mut() else {
            return Err(RenderError::NotLoaded);
        };

        for source in loaded.geojson.values_mut() {
            let GeoJsonSource::Remote(url) = source else {
                continue;
            };
            let features = match self.requests.fetch(url).await? {
                Some(bytes) => {
                    let value: Value = serde_json::from_slice(&bytes)
                        .map_err(|e| RenderError::Style(format!("{}: {}", url, e)))?;
                    features::collect_features(&value)
                        .map_err(|e| RenderError::Style(format!("{}: {}", url, e)))?
                }
                None => Vec::new(),
            };
            *source = GeoJsonSource::Parsed(Arc::new(features));
        }
        Ok(())
    }

    async fn draw_raster(
        &self,
        pixmap: &mut Pixmap,
        viewport: &Viewport,
        layer: &Value,
        source: &Value,
    ) -> Result<(), RenderError> {
        let Some(template) = source["tiles"].get(0).and_then(Value::as_str) else {
            debug!(layer = %layer["id"], "Raster source without tiles, skipping");
            return Ok(());
        };

        let tile_size = source["tileSize"].as_f64().unwrap_or(TILE_SIZE as f64).max(1.0);
        let min_zoom = source["minzoom"].as_f64().unwrap_or(0.0);
        let max_zoom = source["maxzoom"]
            .as_f64()
            .unwrap_or(MAX_ZOOM as f64)
            .min(MAX_ZOOM as f64);

        let ideal = viewport.zoom + (TILE_SIZE as f64 / tile_size).log2();
        let source_zoom = ideal.round().clamp(min_zoom, max_zoom).max(0.0) as u8;
        let n = 1i64 << source_zoom;
        let span = viewport.world / n as f64;

        let x_start = (viewport.left / span).floor() as i64;
        let x_end = ((viewport.left + viewport.width) / span).ceil() as i64 - 1;
        let y_start = (viewport.top / span).floor().max(0.0) as i64;
        let y_end = (((viewport.top + viewport.height) / span).ceil() as i64 - 1).min(n - 1);

        let opacity = paint::number(layer, "raster-opacity", 1.0).clamp(0.0, 1.0);
        let pixmap_paint = PixmapPaint {
            opacity,
            quality: FilterQuality::Bilinear,
            ..Default::default()
        };

        for tx in x_start..=x_end {
            for ty in y_start..=y_end {
                let x = tx.rem_euclid(n);
                let url = expand_template(template, source_zoom, x, ty, n);
                let Some(bytes) = self.requests.fetch(&url).await? else {
                    trace!(url = %url, "No raster data");
                    continue;
                };

                let tile = decode_tile(&bytes)
                    .map_err(|e| RenderError::Engine(format!("{}: {}", url, e)))?;

                let scale_x = (span * viewport.ratio) as f32 / tile.width() as f32;
                let scale_y = (span * viewport.ratio) as f32 / tile.height() as f32;
                let dx = ((tx as f64 * span - viewport.left) * viewport.ratio) as f32;
                let dy = ((ty as f64 * span - viewport.top) * viewport.ratio) as f32;

                pixmap.draw_pixmap(
                    0,
                    0,
                    tile.as_ref(),
                    &pixmap_paint,
                    Transform::from_row(scale_x, 0.0, 0.0, scale_y, dx, dy),
                    None,
                );
            }
        }
        Ok(())
    }
}

impl MapRenderer for RasterRenderer {
    fn load(&mut self, style: &StyleDocument) -> Result<(), RenderError> {
        if let Some(loaded) = &self.style {
            if loaded.document.same_document(style) {
                return Ok(());
            }
        }

        let json = style.as_json();
        let sources = json["sources"]
            .as_object()
            .ok_or_else(|| RenderError::Style("style has no sources".into()))?;

        for layer in json["layers"].as_array().into_iter().flatten() {
            let id = layer["id"]
                .as_str()
                .ok_or_else(|| RenderError::Style("layer without id".into()))?;
            if let Some(source) = layer["source"].as_str() {
                if !sources.contains_key(source) {
                    return Err(RenderError::Style(format!(
                        "layer '{}' references unknown source '{}'",
                        id, source
                    )));
                }
            }
        }

        let mut geojson = HashMap::new();
        for (name, source) in sources {
            if source["type"].as_str() != Some("geojson") {
                continue;
            }
            let parsed = match &source["data"] {
                Value::String(url) => GeoJsonSource::Remote(url.clone()),
                data => {
                    let features = features::collect_features(data)
                        .map_err(|e| RenderError::Style(format!("source '{}': {}", name, e)))?;
                    GeoJsonSource::Parsed(Arc::new(features))
                }
            };
            geojson.insert(name.clone(), parsed);
        }

        debug!(
            sources = sources.len(),
            geojson_sources = geojson.len(),
            skipped_layers = undrawable_layers(style).len(),
            "Loaded style"
        );

        self.style = Some(LoadedStyle {
            document: style.clone(),
            geojson,
        });
        Ok(())
    }

    async fn render(&mut self, options: RenderOptions) -> Result<RawImage, RenderError> {
        self.resolve_remote_sources().await?;

        let Some(loaded) = self.style.as_ref() else {
            return Err(RenderError::NotLoaded);
        };
        let document = loaded.document.clone();
        let geojson: HashMap<String, Arc<Vec<Feature>>> = loaded
            .geojson
            .iter()
            .filter_map(|(name, source)| match source {
                GeoJsonSource::Parsed(features) => Some((name.clone(), Arc::clone(features))),
                GeoJsonSource::Remote(_) => None,
            })
            .collect();

        let width = options.physical_width();
        let height = options.physical_height();
        let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
            RenderError::Engine(format!("cannot allocate {}x{} image", width, height))
        })?;
        let viewport = Viewport::new(&options);

        let json = document.as_json();
        for layer in json["layers"].as_array().into_iter().flatten() {
            if !paint::is_visible(layer, viewport.zoom) {
                continue;
            }

            let source_name = layer["source"].as_str().unwrap_or_default();
            match layer["type"].as_str().unwrap_or_default() {
                "background" => {
                    let opacity = paint::number(layer, "background-opacity", 1.0);
                    let color = paint::color(layer, "background-color", "#000000", opacity);
                    pixmap.fill(color);
                }
                "raster" => {
                    let source = &json["sources"][source_name];
                    self.draw_raster(&mut pixmap, &viewport, layer, source)
                        .await?;
                }
                kind @ ("fill" | "line") => match geojson.get(source_name) {
                    Some(features) => {
                        draw_features(&mut pixmap, &viewport, layer, kind, features);
                    }
                    None => {
                        trace!(layer = %layer["id"], "Non-GeoJSON source, skipping");
                    }
                },
                other => {
                    trace!(layer = %layer["id"], kind = other, "Unsupported layer type, skipping");
                }
            }
        }

        Ok(RawImage {
            width,
            height,
            data: pixmap.take(),
        })
    }

    fn release(self) {
        debug!("Released raster renderer");
    }
}

// =============================================================================
// Drawing helpers
// =============================================================================

/// Camera viewport in logical world pixels.
struct Viewport {
    zoom: f64,
    world: f64,
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    ratio: f64,
}

impl Viewport {
    fn new(options: &RenderOptions) -> Self {
        let world = TILE_SIZE as f64 * options.zoom.exp2();
        let (cx, cy) = project(options.center.lng, options.center.lat, world);
        let width = options.width as f64;
        let height = options.height as f64;
        Self {
            zoom: options.zoom,
            world,
            left: cx - width / 2.0,
            top: cy - height / 2.0,
            width,
            height,
            ratio: options.pixel_ratio as f64,
        }
    }

    /// Projects a position to physical pixel coordinates.
    fn to_pixel(&self, position: &Position) -> (f32, f32) {
        let (x, y) = project(position[0], position[1], self.world);
        (
            ((x - self.left) * self.ratio) as f32,
            ((y - self.top) * self.ratio) as f32,
        )
    }
}

/// Web Mercator projection into a world of `world` pixels.
fn project(lng: f64, lat: f64, world: f64) -> (f64, f64) {
    let x = (lng + 180.0) / 360.0 * world;
    let lat_rad = lat.clamp(MIN_LAT, MAX_LAT).to_radians();
    let y = (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * world;
    (x, y)
}

fn expand_template(template: &str, zoom: u8, x: i64, y: i64, n: i64) -> String {
    template
        .replace("{z}", &zoom.to_string())
        .replace("{x}", &x.to_string())
        .replace("{y}", &y.to_string())
        .replace("{-y}", &(n - 1 - y).to_string())
}

/// Decodes an encoded tile into a premultiplied pixmap.
fn decode_tile(bytes: &[u8]) -> Result<Pixmap, String> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| e.to_string())?
        .to_rgba8();
    let (width, height) = image.dimensions();
    let mut data = image.into_raw();
    for pixel in data.chunks_exact_mut(4) {
        let alpha = pixel[3] as u16;
        for channel in &mut pixel[..3] {
            *channel = ((*channel as u16 * alpha + 127) / 255) as u8;
        }
    }
    let size = IntSize::from_wh(width, height).ok_or("empty image")?;
    Pixmap::from_vec(data, size).ok_or_else(|| "invalid image buffer".to_string())
}

fn draw_features(
    pixmap: &mut Pixmap,
    viewport: &Viewport,
    layer: &Value,
    kind: &str,
    features: &[Feature],
) {
    let filter = layer.get("filter");
    let mut builder = PathBuilder::new();

    for feature in features.iter().filter(|f| features::matches(filter, f)) {
        match (&feature.geometry, kind) {
            (Geometry::Polygons(polygons), _) => {
                for ring in polygons.iter().flatten() {
                    add_ring(&mut builder, viewport, ring, true);
                }
            }
            (Geometry::Lines(lines), "line") => {
                for line in lines {
                    add_ring(&mut builder, viewport, line, false);
                }
            }
            _ => {}
        }
    }

    let Some(path) = builder.finish() else {
        return;
    };

    if kind == "fill" {
        let opacity = paint::number(layer, "fill-opacity", 1.0);
        let color = paint::color(layer, "fill-color", "#000000", opacity);
        pixmap.fill_path(
            &path,
            &paint::solid(color),
            FillRule::EvenOdd,
            Transform::identity(),
            None,
        );
    } else {
        let opacity = paint::number(layer, "line-opacity", 1.0);
        let color = paint::color(layer, "line-color", "#000000", opacity);
        let stroke = Stroke {
            width: paint::number(layer, "line-width", 1.0) * viewport.ratio as f32,
            ..Default::default()
        };
        pixmap.stroke_path(
            &path,
            &paint::solid(color),
            &stroke,
            Transform::identity(),
            None,
        );
    }
}

fn add_ring(builder: &mut PathBuilder, viewport: &Viewport, points: &[Position], close: bool) {
    let mut iter = points.iter();
    let Some(first) = iter.next() else {
        return;
    };
    let (x, y) = viewport.to_pixel(first);
    builder.move_to(x, y);
    for point in iter {
        let (x, y) = viewport.to_pixel(point);
        builder.line_to(x, y);
    }
    if close {
        builder.close();
    }
}

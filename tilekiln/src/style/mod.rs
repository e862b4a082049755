//! Style document construction.
//!
//! A style document is the declarative description of sources and layers the
//! renderer consumes. It is built once per generation run and shared
//! read-only (behind an `Arc`) with every render.
//!
//! # Base styles
//!
//! - `protomaps` - vector basemap served from `protomaps.pmtiles` in the
//!   working directory
//! - basemap provider - OpenStreetMap raster tiles
//! - anything else - the style name is used as a raster tile URL template
//!
//! An optional overlay adds a GeoJSON source and two fixed paint layers, see
//! [`overlay`].

pub mod overlay;
mod templates;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

pub use overlay::{OVERLAY_FILENAME, OVERLAY_LINE_LAYER, OVERLAY_POLYGON_LAYER, OVERLAY_SOURCE};
pub use templates::{OSM_TILE_URL, PROTOMAPS_FILENAME, PROTOMAPS_STYLE};

/// Default logical tile size of raster sources, in pixels.
pub const DEFAULT_SOURCE_TILE_SIZE: u32 = 256;

/// Errors from building a style document.
#[derive(Debug, Error)]
pub enum StyleError {
    /// The overlay file could not be read.
    #[error("Failed to read overlay {path}: {source}")]
    OverlayRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The overlay file is not valid GeoJSON.
    #[error("Invalid overlay GeoJSON in {path}: {reason}")]
    OverlayInvalid { path: PathBuf, reason: String },

    /// The base style name is empty.
    #[error("Style name must not be empty")]
    EmptyStyle,

    /// The document is not a JSON object with `sources` and `layers`.
    #[error("Malformed style document: {0}")]
    Malformed(String),
}

/// An immutable style document.
///
/// Cloning is cheap; clones share the same JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleDocument {
    json: Arc<Value>,
}

impl StyleDocument {
    /// Wraps an existing style JSON value.
    ///
    /// The value must be an object with a `sources` object and a `layers`
    /// array.
    pub fn from_json(json: Value) -> Result<Self, StyleError> {
        if !json.get("sources").is_some_and(Value::is_object) {
            return Err(StyleError::Malformed("missing 'sources' object".into()));
        }
        if !json.get("layers").is_some_and(Value::is_array) {
            return Err(StyleError::Malformed("missing 'layers' array".into()));
        }
        Ok(Self {
            json: Arc::new(json),
        })
    }

    /// Returns the underlying JSON.
    pub fn as_json(&self) -> &Value {
        &self.json
    }

    /// Returns true if both documents share the same underlying JSON.
    pub fn same_document(&self, other: &StyleDocument) -> bool {
        Arc::ptr_eq(&self.json, &other.json)
    }

    /// Returns the names of all sources.
    pub fn source_names(&self) -> Vec<&str> {
        self.json["sources"]
            .as_object()
            .map(|sources| sources.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Returns the ids of all layers, in paint order.
    pub fn layer_ids(&self) -> Vec<&str> {
        self.json["layers"]
            .as_array()
            .map(|layers| layers.iter().filter_map(|l| l["id"].as_str()).collect())
            .unwrap_or_default()
    }

    /// Looks up a source definition by name.
    pub fn source(&self, name: &str) -> Option<&Value> {
        self.json["sources"].get(name)
    }

    /// Serializes the document as pretty-printed JSON.
    pub fn to_pretty_string(&self) -> String {
        serde_json::to_string_pretty(self.json.as_ref()).unwrap_or_else(|_| self.json.to_string())
    }
}

/// Inputs to [`build_style`].
#[derive(Debug, Clone)]
pub struct StyleOptions {
    /// Base style name or raster tile URL template
    pub style: String,
    /// Whether to add the overlay source and layers
    pub overlay: bool,
    /// Use the OpenStreetMap raster basemap instead of `style` as a URL
    pub use_basemap_provider: bool,
    /// Logical tile size of raster sources
    pub tile_size: u32,
    /// Working directory holding `overlay.geojson` / `protomaps.pmtiles`
    pub temp_dir: PathBuf,
}

impl StyleOptions {
    /// Creates options for a base style with no overlay.
    pub fn new(style: impl Into<String>, temp_dir: impl AsRef<Path>) -> Self {
        Self {
            style: style.into(),
            overlay: false,
            use_basemap_provider: false,
            tile_size: DEFAULT_SOURCE_TILE_SIZE,
            temp_dir: temp_dir.as_ref().to_path_buf(),
        }
    }

    /// Enables or disables the overlay.
    pub fn with_overlay(mut self, overlay: bool) -> Self {
        self.overlay = overlay;
        self
    }

    /// Selects the OpenStreetMap basemap.
    pub fn with_basemap_provider(mut self, enabled: bool) -> Self {
        self.use_basemap_provider = enabled;
        self
    }

    /// Sets the raster source tile size.
    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }
}

/// Builds the style document for a generation run.
pub fn build_style(options: &StyleOptions) -> Result<StyleDocument, StyleError> {
    let style = options.style.trim();
    if style.is_empty() && !options.use_basemap_provider {
        return Err(StyleError::EmptyStyle);
    }

    let mut json = if style == PROTOMAPS_STYLE {
        templates::protomaps_style(&options.temp_dir)
    } else if options.use_basemap_provider {
        templates::openstreetmap_style(options.tile_size)
    } else {
        templates::basic_style(style, options.tile_size)
    };

    if options.overlay {
        let geojson = overlay::read_overlay(&options.temp_dir)?;
        overlay::apply_overlay(&mut json, geojson);
    }

    StyleDocument::from_json(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_basic_style_uses_name_as_tile_url() {
        let temp = TempDir::new().unwrap();
        let options = StyleOptions::new("https://tiles.example.com/{z}/{x}/{y}.png", temp.path());
        let style = build_style(&options).unwrap();

        assert_eq!(style.source_names(), vec!["basemap"]);
        assert_eq!(
            style.source("basemap").unwrap()["tiles"][0],
            "https://tiles.example.com/{z}/{x}/{y}.png"
        );
        assert_eq!(style.source("basemap").unwrap()["tileSize"], 256);
    }

    #[test]
    fn test_openstreetmap_style() {
        let temp = TempDir::new().unwrap();
        let options = StyleOptions::new("ignored", temp.path())
            .with_basemap_provider(true)
            .with_tile_size(512);
        let style = build_style(&options).unwrap();

        assert_eq!(style.source_names(), vec!["osm"]);
        assert_eq!(style.source("osm").unwrap()["tiles"][0], OSM_TILE_URL);
        assert_eq!(style.source("osm").unwrap()["tileSize"], 512);
        assert!(style.layer_ids().contains(&"osm"));
    }

    #[test]
    fn test_protomaps_style_points_at_temp_dir() {
        let temp = TempDir::new().unwrap();
        let style = build_style(&StyleOptions::new("protomaps", temp.path())).unwrap();

        let url = style.source("protomaps").unwrap()["url"].as_str().unwrap();
        assert!(url.starts_with("pmtiles://"));
        assert!(url.ends_with(PROTOMAPS_FILENAME));
        assert!(style.layer_ids().contains(&"water"));
    }

    #[test]
    fn test_empty_style_rejected() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            build_style(&StyleOptions::new("  ", temp.path())),
            Err(StyleError::EmptyStyle)
        ));
    }

    #[test]
    fn test_overlay_adds_source_and_layers() {
        let temp = TempDir::new().unwrap();
        let geojson = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": {"type": "Point", "coordinates": [0.0, 0.0]}
            }]
        });
        std::fs::write(temp.path().join(OVERLAY_FILENAME), geojson.to_string()).unwrap();

        let options = StyleOptions::new("https://t.example/{z}/{x}/{y}.png", temp.path())
            .with_overlay(true);
        let style = build_style(&options).unwrap();

        assert!(style.source_names().contains(&OVERLAY_SOURCE));
        assert_eq!(style.source(OVERLAY_SOURCE).unwrap()["type"], "geojson");
        assert_eq!(style.source(OVERLAY_SOURCE).unwrap()["data"], geojson);

        let ids = style.layer_ids();
        assert!(ids.contains(&"polygon-layer"));
        assert!(ids.contains(&"line-layer"));
    }

    #[test]
    fn test_overlay_missing_file() {
        let temp = TempDir::new().unwrap();
        let options = StyleOptions::new("https://t.example/{z}/{x}/{y}.png", temp.path())
            .with_overlay(true);
        assert!(matches!(
            build_style(&options),
            Err(StyleError::OverlayRead { .. })
        ));
    }

    #[test]
    fn test_from_json_rejects_malformed() {
        assert!(StyleDocument::from_json(json!({"layers": []})).is_err());
        assert!(StyleDocument::from_json(json!({"sources": {}})).is_err());
        assert!(StyleDocument::from_json(json!({"sources": {}, "layers": []})).is_ok());
    }
}

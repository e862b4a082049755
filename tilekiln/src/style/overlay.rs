//! GeoJSON overlay source and layers.
//!
//! The overlay is drawn on top of the base style: polygons as a translucent
//! red fill and line strings as a 2px red line. The GeoJSON is embedded in
//! the style document so every renderer sees the same data without touching
//! the filesystem.

use std::path::Path;

use serde_json::{json, Value};

use super::StyleError;

/// Filename of the overlay inside the working directory.
pub const OVERLAY_FILENAME: &str = "overlay.geojson";

/// Name of the overlay source.
pub const OVERLAY_SOURCE: &str = "overlay";

/// Layer id for overlay polygons.
pub const OVERLAY_POLYGON_LAYER: &str = "polygon-layer";

/// Layer id for overlay line strings.
pub const OVERLAY_LINE_LAYER: &str = "line-layer";

const OVERLAY_COLOR: &str = "#FF0000";
const SOURCE_LAYER: &str = "output";

const GEOJSON_TYPES: &[&str] = &[
    "FeatureCollection",
    "Feature",
    "Point",
    "MultiPoint",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
    "GeometryCollection",
];

/// Reads and parses `<dir>/overlay.geojson`.
pub(crate) fn read_overlay(dir: &Path) -> Result<Value, StyleError> {
    let path = dir.join(OVERLAY_FILENAME);
    let text = std::fs::read_to_string(&path).map_err(|source| StyleError::OverlayRead {
        path: path.clone(),
        source,
    })?;

    let value: Value = serde_json::from_str(&text).map_err(|e| StyleError::OverlayInvalid {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    match value.get("type").and_then(Value::as_str) {
        Some(kind) if GEOJSON_TYPES.contains(&kind) => Ok(value),
        Some(kind) => Err(StyleError::OverlayInvalid {
            path,
            reason: format!("unknown GeoJSON type '{}'", kind),
        }),
        None => Err(StyleError::OverlayInvalid {
            path,
            reason: "missing 'type' member".to_string(),
        }),
    }
}

/// Adds the overlay source and its two layers to a style JSON object.
pub(crate) fn apply_overlay(style: &mut Value, geojson: Value) {
    if let Some(sources) = style["sources"].as_object_mut() {
        sources.insert(
            OVERLAY_SOURCE.to_string(),
            json!({ "type": "geojson", "data": geojson }),
        );
    }

    if let Some(layers) = style["layers"].as_array_mut() {
        layers.push(json!({
            "id": OVERLAY_POLYGON_LAYER,
            "type": "fill",
            "source": OVERLAY_SOURCE,
            "source-layer": SOURCE_LAYER,
            "filter": ["==", "$type", "Polygon"],
            "paint": {
                "fill-color": OVERLAY_COLOR,
                "fill-opacity": 0.5
            }
        }));
        layers.push(json!({
            "id": OVERLAY_LINE_LAYER,
            "type": "line",
            "source": OVERLAY_SOURCE,
            "source-layer": SOURCE_LAYER,
            "filter": ["==", "$type", "LineString"],
            "paint": {
                "line-color": OVERLAY_COLOR,
                "line-width": 2
            }
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_overlay_rejects_non_geojson() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(OVERLAY_FILENAME), r#"{"type": "Banana"}"#).unwrap();
        assert!(matches!(
            read_overlay(temp.path()),
            Err(StyleError::OverlayInvalid { .. })
        ));

        std::fs::write(temp.path().join(OVERLAY_FILENAME), "not json").unwrap();
        assert!(matches!(
            read_overlay(temp.path()),
            Err(StyleError::OverlayInvalid { .. })
        ));
    }

    #[test]
    fn test_overlay_layers_are_appended_last() {
        let mut style = json!({
            "sources": {},
            "layers": [{ "id": "background", "type": "background" }]
        });
        apply_overlay(&mut style, json!({"type": "FeatureCollection", "features": []}));

        let layers = style["layers"].as_array().unwrap();
        assert_eq!(layers.len(), 3);
        assert_eq!(layers[1]["id"], OVERLAY_POLYGON_LAYER);
        assert_eq!(layers[1]["paint"]["fill-opacity"], 0.5);
        assert_eq!(layers[1]["filter"], json!(["==", "$type", "Polygon"]));
        assert_eq!(layers[2]["id"], OVERLAY_LINE_LAYER);
        assert_eq!(layers[2]["paint"]["line-width"], 2);
        assert_eq!(layers[2]["filter"], json!(["==", "$type", "LineString"]));
    }
}

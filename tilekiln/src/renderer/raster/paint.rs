//! Layer paint property helpers.

use serde_json::Value;
use tiny_skia::{Color, Paint, Shader};
use tracing::debug;

/// Reads a numeric paint property, falling back to `default`.
///
/// Expressions are not evaluated.
pub(crate) fn number(layer: &Value, property: &str, default: f32) -> f32 {
    match &layer["paint"][property] {
        Value::Null => default,
        Value::Number(n) => n.as_f64().map(|v| v as f32).unwrap_or(default),
        other => {
            debug!(property = property, value = %other, "Unsupported paint value");
            default
        }
    }
}

/// Reads a CSS color paint property and applies `opacity`.
pub(crate) fn color(layer: &Value, property: &str, default: &str, opacity: f32) -> Color {
    let text = layer["paint"][property].as_str().unwrap_or(default);
    let [r, g, b, a] = match text.parse::<csscolorparser::Color>() {
        Ok(parsed) => parsed.to_rgba8(),
        Err(e) => {
            debug!(property = property, value = text, error = %e, "Invalid color");
            [0, 0, 0, 255]
        }
    };
    let alpha = (a as f32 * opacity.clamp(0.0, 1.0)).round() as u8;
    Color::from_rgba8(r, g, b, alpha)
}

/// Builds an anti-aliased solid paint.
pub(crate) fn solid(color: Color) -> Paint<'static> {
    Paint {
        shader: Shader::SolidColor(color),
        anti_alias: true,
        ..Default::default()
    }
}

/// Returns false if the layer is hidden or outside its zoom range.
pub(crate) fn is_visible(layer: &Value, zoom: f64) -> bool {
    if layer["layout"]["visibility"].as_str() == Some("none") {
        return false;
    }
    if let Some(min) = layer["minzoom"].as_f64() {
        if zoom < min {
            return false;
        }
    }
    if let Some(max) = layer["maxzoom"].as_f64() {
        if zoom >= max {
            return false;
        }
    }
    true
}

//! GeoJSON feature extraction and layer filters.

use serde_json::{Map, Value};

/// A position as `[lng, lat]`.
pub(crate) type Position = [f64; 2];

/// Geometry normalized to its multi-part form.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Geometry {
    Points(Vec<Position>),
    Lines(Vec<Vec<Position>>),
    Polygons(Vec<Vec<Vec<Position>>>),
}

impl Geometry {
    /// Value of `$type` in filter expressions.
    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Geometry::Points(_) => "Point",
            Geometry::Lines(_) => "LineString",
            Geometry::Polygons(_) => "Polygon",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Feature {
    pub geometry: Geometry,
    pub properties: Map<String, Value>,
}

/// Flattens any GeoJSON object into features.
///
/// Geometry collections become one feature per member geometry, sharing the
/// parent's properties.
pub(crate) fn collect_features(value: &Value) -> Result<Vec<Feature>, String> {
    let mut features = Vec::new();
    collect_into(value, &Map::new(), &mut features)?;
    Ok(features)
}

fn collect_into(
    value: &Value,
    properties: &Map<String, Value>,
    out: &mut Vec<Feature>,
) -> Result<(), String> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or("GeoJSON object without 'type'")?;

    match kind {
        "FeatureCollection" => {
            let features = value
                .get("features")
                .and_then(Value::as_array)
                .ok_or("FeatureCollection without 'features'")?;
            for feature in features {
                collect_into(feature, properties, out)?;
            }
        }
        "Feature" => {
            let props = value
                .get("properties")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            match value.get("geometry") {
                Some(Value::Null) | None => {}
                Some(geometry) => collect_into(geometry, &props, out)?,
            }
        }
        "GeometryCollection" => {
            let geometries = value
                .get("geometries")
                .and_then(Value::as_array)
                .ok_or("GeometryCollection without 'geometries'")?;
            for geometry in geometries {
                collect_into(geometry, properties, out)?;
            }
        }
        _ => {
            let coordinates = value
                .get("coordinates")
                .ok_or_else(|| format!("{} without 'coordinates'", kind))?;
            let geometry = match kind {
                "Point" => Geometry::Points(vec![position(coordinates)?]),
                "MultiPoint" => Geometry::Points(positions(coordinates)?),
                "LineString" => Geometry::Lines(vec![positions(coordinates)?]),
                "MultiLineString" => Geometry::Lines(nested(coordinates, positions)?),
                "Polygon" => Geometry::Polygons(vec![nested(coordinates, positions)?]),
                "MultiPolygon" => {
                    Geometry::Polygons(nested(coordinates, |c| nested(c, positions))?)
                }
                other => return Err(format!("unknown geometry type '{}'", other)),
            };
            out.push(Feature {
                geometry,
                properties: properties.clone(),
            });
        }
    }
    Ok(())
}

fn position(value: &Value) -> Result<Position, String> {
    match value.as_array().map(Vec::as_slice) {
        Some([lng, lat, ..]) => match (lng.as_f64(), lat.as_f64()) {
            (Some(lng), Some(lat)) => Ok([lng, lat]),
            _ => Err("non-numeric position".to_string()),
        },
        _ => Err("position must have at least two numbers".to_string()),
    }
}

fn positions(value: &Value) -> Result<Vec<Position>, String> {
    nested(value, position)
}

fn nested<T>(value: &Value, item: impl Fn(&Value) -> Result<T, String>) -> Result<Vec<T>, String> {
    value
        .as_array()
        .ok_or("expected coordinate array")?
        .iter()
        .map(item)
        .collect()
}

// =============================================================================
// Filters
// =============================================================================

/// Evaluates a legacy filter expression against a feature.
///
/// Supports `==`, `!=`, `has`, `!has`, `in`, `!in`, `all`, `any` and
/// `none`. A missing filter matches everything; unknown operators match.
pub(crate) fn matches(filter: Option<&Value>, feature: &Feature) -> bool {
    let Some(filter) = filter else {
        return true;
    };
    let Some(items) = filter.as_array() else {
        return true;
    };
    let Some(op) = items.first().and_then(Value::as_str) else {
        return true;
    };
    let args = &items[1..];

    match op {
        "all" => args.iter().all(|f| matches(Some(f), feature)),
        "any" => args.iter().any(|f| matches(Some(f), feature)),
        "none" => !args.iter().any(|f| matches(Some(f), feature)),
        "==" | "!=" => {
            let equal = match args {
                [key, expected] => lookup(key, feature).as_ref() == Some(expected),
                _ => false,
            };
            (op == "==") == equal
        }
        "has" | "!has" => {
            let present = args.first().is_some_and(|key| lookup(key, feature).is_some());
            (op == "has") == present
        }
        "in" | "!in" => {
            let found = match args.split_first() {
                Some((key, values)) => lookup(key, feature).is_some_and(|v| values.contains(&v)),
                None => false,
            };
            (op == "in") == found
        }
        _ => true,
    }
}

fn lookup(key: &Value, feature: &Feature) -> Option<Value> {
    match key.as_str()? {
        "$type" => Some(Value::String(feature.geometry.type_name().to_string())),
        name => feature.properties.get(name).cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Vec<Feature> {
        collect_features(&json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"kind": "park"},
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]
                    }
                },
                {
                    "type": "Feature",
                    "properties": {"kind": "road"},
                    "geometry": {
                        "type": "MultiLineString",
                        "coordinates": [[[0, 0], [1, 1]], [[2, 2], [3, 3]]]
                    }
                },
                {
                    "type": "Feature",
                    "properties": null,
                    "geometry": {"type": "Point", "coordinates": [5, 5, 100]}
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_collect_features_normalizes_geometry() {
        let features = sample();
        assert_eq!(features.len(), 3);
        assert!(matches!(&features[0].geometry, Geometry::Polygons(p) if p.len() == 1));
        assert!(matches!(&features[1].geometry, Geometry::Lines(l) if l.len() == 2));
        assert_eq!(features[2].geometry, Geometry::Points(vec![[5.0, 5.0]]));
        assert!(features[2].properties.is_empty());
    }

    #[test]
    fn test_collect_features_rejects_bad_input() {
        assert!(collect_features(&json!({"type": "Point"})).is_err());
        assert!(collect_features(&json!({"type": "Point", "coordinates": ["a", 1]})).is_err());
        assert!(collect_features(&json!({"coordinates": [0, 0]})).is_err());
        assert!(collect_features(&json!({"type": "Circle", "coordinates": [0, 0]})).is_err());
    }

    #[test]
    fn test_type_filters() {
        let features = sample();
        let polygon = json!(["==", "$type", "Polygon"]);
        let line = json!(["==", "$type", "LineString"]);

        let polygons: Vec<_> = features.iter().filter(|f| matches(Some(&polygon), f)).collect();
        let lines: Vec<_> = features.iter().filter(|f| matches(Some(&line), f)).collect();
        assert_eq!(polygons.len(), 1);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].properties["kind"], "road");
    }

    #[test]
    fn test_property_and_combinator_filters() {
        let features = sample();
        let park = &features[0];

        assert!(matches(None, park));
        assert!(matches(Some(&json!(["==", "kind", "park"])), park));
        assert!(matches(Some(&json!(["!=", "kind", "road"])), park));
        assert!(matches(Some(&json!(["has", "kind"])), park));
        assert!(matches(Some(&json!(["!has", "name"])), park));
        assert!(matches(Some(&json!(["in", "kind", "forest", "park"])), park));
        assert!(!matches(Some(&json!(["!in", "kind", "park"])), park));
        assert!(matches(
            Some(&json!(["all", ["==", "$type", "Polygon"], ["==", "kind", "park"]])),
            park
        ));
        assert!(!matches(
            Some(&json!(["any", ["==", "kind", "road"], ["has", "name"]])),
            park
        ));
        assert!(matches(Some(&json!(["none", ["==", "kind", "road"]])), park));
    }
}

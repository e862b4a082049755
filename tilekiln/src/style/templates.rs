//! Base style templates.

use std::path::Path;

use serde_json::{json, Value};

/// Style name selecting the vector basemap.
pub const PROTOMAPS_STYLE: &str = "protomaps";

/// PMTiles archive the vector basemap reads from the working directory.
pub const PROTOMAPS_FILENAME: &str = "protomaps.pmtiles";

/// OpenStreetMap raster tile endpoint.
pub const OSM_TILE_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";

const OSM_ATTRIBUTION: &str = "&copy; OpenStreetMap contributors";
const BACKGROUND_COLOR: &str = "#f8f4f0";

fn background_layer() -> Value {
    json!({
        "id": "background",
        "type": "background",
        "paint": { "background-color": BACKGROUND_COLOR }
    })
}

/// Vector basemap backed by a local PMTiles archive.
pub(crate) fn protomaps_style(temp_dir: &Path) -> Value {
    let url = format!(
        "pmtiles://{}",
        temp_dir.join(PROTOMAPS_FILENAME).to_string_lossy()
    );

    json!({
        "version": 8,
        "name": PROTOMAPS_STYLE,
        "sources": {
            "protomaps": {
                "type": "vector",
                "url": url,
                "attribution": "Protomaps &copy; OpenStreetMap"
            }
        },
        "layers": [
            background_layer(),
            {
                "id": "earth",
                "type": "fill",
                "source": "protomaps",
                "source-layer": "earth",
                "paint": { "fill-color": "#e2dfda" }
            },
            {
                "id": "water",
                "type": "fill",
                "source": "protomaps",
                "source-layer": "water",
                "paint": { "fill-color": "#80deea" }
            },
            {
                "id": "roads",
                "type": "line",
                "source": "protomaps",
                "source-layer": "roads",
                "paint": { "line-color": "#ffffff", "line-width": 1 }
            }
        ]
    })
}

/// Raster basemap from the OpenStreetMap tile servers.
pub(crate) fn openstreetmap_style(tile_size: u32) -> Value {
    json!({
        "version": 8,
        "name": "openstreetmap",
        "sources": {
            "osm": {
                "type": "raster",
                "tiles": [OSM_TILE_URL],
                "tileSize": tile_size,
                "attribution": OSM_ATTRIBUTION,
                "minzoom": 0,
                "maxzoom": 19
            }
        },
        "layers": [
            background_layer(),
            { "id": "osm", "type": "raster", "source": "osm" }
        ]
    })
}

/// Single raster source using `tile_url` as its URL template.
pub(crate) fn basic_style(tile_url: &str, tile_size: u32) -> Value {
    json!({
        "version": 8,
        "name": "basic",
        "sources": {
            "basemap": {
                "type": "raster",
                "tiles": [tile_url],
                "tileSize": tile_size
            }
        },
        "layers": [
            background_layer(),
            { "id": "basemap", "type": "raster", "source": "basemap" }
        ]
    })
}

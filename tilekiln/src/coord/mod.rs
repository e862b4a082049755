//! Coordinate conversion module
//!
//! Provides conversions between geographic coordinates (longitude/latitude)
//! and Web Mercator tile coordinates, and computes the tile rectangles that
//! cover a bounding box at each zoom level.

mod types;

#[cfg(test)]
mod tests;

pub use types::{
    tiles_per_side, Bounds, CoordError, TileCoord, TileRange, TileRangeIterator, ZoomRange,
    MAX_LAT, MAX_LON, MAX_ZOOM, MIN_LAT, MIN_LON, MIN_ZOOM,
};

use std::f64::consts::PI;

/// Longitude/latitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

/// Converts a longitude to a fractional tile column at `zoom`.
#[inline]
pub fn lon_to_tile_x(lon: f64, zoom: u8) -> f64 {
    let n = tiles_per_side(zoom) as f64;
    (lon + 180.0) / 360.0 * n
}

/// Converts a latitude to a fractional tile row at `zoom`.
///
/// Latitudes beyond the Web Mercator limit are clamped.
#[inline]
pub fn lat_to_tile_y(lat: f64, zoom: u8) -> f64 {
    let n = tiles_per_side(zoom) as f64;
    let lat_rad = lat.clamp(MIN_LAT, MAX_LAT) * PI / 180.0;
    (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n
}

/// Converts geographic coordinates to the tile containing them.
#[inline]
pub fn to_tile_coords(lat: f64, lon: f64, zoom: u8) -> Result<TileCoord, CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    Ok(TileCoord {
        zoom,
        x: clamp_index(lon_to_tile_x(lon, zoom), zoom),
        y: clamp_index(lat_to_tile_y(lat, zoom), zoom),
    })
}

/// Converts tile coordinates back to geographic coordinates.
///
/// Returns the latitude/longitude of the tile's northwest corner.
#[inline]
pub fn tile_to_lat_lon(tile: &TileCoord) -> (f64, f64) {
    fractional_to_lat_lon(tile.x as f64, tile.y as f64, tile.zoom)
}

/// Returns the geographic centre of a tile.
///
/// This is the camera centre handed to the renderer for a single-tile render.
#[inline]
pub fn tile_center(tile: &TileCoord) -> LngLat {
    let (lat, lng) = fractional_to_lat_lon(tile.x as f64 + 0.5, tile.y as f64 + 0.5, tile.zoom);
    LngLat { lng, lat }
}

fn fractional_to_lat_lon(x: f64, y: f64, zoom: u8) -> (f64, f64) {
    let n = tiles_per_side(zoom) as f64;
    let lon = x / n * 360.0 - 180.0;
    let lat_rad = (PI * (1.0 - 2.0 * y / n)).sinh().atan();
    (lat_rad * 180.0 / PI, lon)
}

/// Floors a fractional tile index into `[0, 2^zoom - 1]`.
#[inline]
fn clamp_index(value: f64, zoom: u8) -> u32 {
    let max = (tiles_per_side(zoom) - 1) as f64;
    value.floor().clamp(0.0, max) as u32
}

/// Computes the inclusive tile rectangle covering `bounds` at `zoom`.
///
/// The west/north edges select the minimum column/row and the east/south
/// edges the maximum. An edge lying exactly on a tile boundary on the
/// east or south side does not pull in the neighbouring tile.
pub fn tile_range_for_bounds(bounds: &Bounds, zoom: u8) -> Result<TileRange, CoordError> {
    bounds.validate()?;
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    let min_x = clamp_index(lon_to_tile_x(bounds.west, zoom), zoom);
    let min_y = clamp_index(lat_to_tile_y(bounds.north, zoom), zoom);
    let max_x = clamp_index(exclusive_edge(lon_to_tile_x(bounds.east, zoom)), zoom);
    let max_y = clamp_index(exclusive_edge(lat_to_tile_y(bounds.south, zoom)), zoom);

    Ok(TileRange {
        zoom,
        min_x,
        min_y,
        max_x: max_x.max(min_x),
        max_y: max_y.max(min_y),
    })
}

/// Computes and validates the rectangle for every zoom in `zooms`.
pub fn tile_ranges(bounds: &Bounds, zooms: ZoomRange) -> Result<Vec<TileRange>, CoordError> {
    zooms
        .levels()
        .map(|zoom| {
            let range = tile_range_for_bounds(bounds, zoom)?;
            range.validate()?;
            Ok(range)
        })
        .collect()
}

/// Nudges a far edge that sits exactly on a tile boundary back into the
/// previous tile.
#[inline]
fn exclusive_edge(value: f64) -> f64 {
    if value.fract() == 0.0 && value > 0.0 {
        value - 1.0
    } else {
        value
    }
}

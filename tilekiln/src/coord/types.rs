//! Coordinate type definitions

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Web Mercator valid latitude range
pub const MIN_LAT: f64 = -85.05112878;
pub const MAX_LAT: f64 = 85.05112878;

/// Valid longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Zoom levels supported by the pipeline
pub const MIN_ZOOM: u8 = 0;
pub const MAX_ZOOM: u8 = 22;

/// Geographic bounding box in degrees.
///
/// Invariant (checked by [`Bounds::new`]): all values finite,
/// `west < east` and `south < north`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Bounds {
    /// The whole Web Mercator world.
    pub const WORLD: Bounds = Bounds {
        west: MIN_LON,
        south: MIN_LAT,
        east: MAX_LON,
        north: MAX_LAT,
    };

    /// Creates validated bounds.
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Result<Self, CoordError> {
        let bounds = Self {
            west,
            south,
            east,
            north,
        };
        bounds.validate()?;
        Ok(bounds)
    }

    /// Checks the bounds invariants.
    pub fn validate(&self) -> Result<(), CoordError> {
        let values = [self.west, self.south, self.east, self.north];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(CoordError::NonFiniteBounds(*self));
        }
        for lon in [self.west, self.east] {
            if !(MIN_LON..=MAX_LON).contains(&lon) {
                return Err(CoordError::InvalidLongitude(lon));
            }
        }
        for lat in [self.south, self.north] {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(CoordError::InvalidLatitude(lat));
            }
        }
        if self.west >= self.east || self.south >= self.north {
            return Err(CoordError::InvertedBounds(*self));
        }
        Ok(())
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.west, self.south, self.east, self.north
        )
    }
}

impl std::str::FromStr for Bounds {
    type Err = CoordError;

    /// Parses `west,south,east,north`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| CoordError::Unparseable(s.to_string()))?;

        match parts.as_slice() {
            [west, south, east, north] => Bounds::new(*west, *south, *east, *north),
            _ => Err(CoordError::Unparseable(s.to_string())),
        }
    }
}

/// Inclusive zoom range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ZoomRange {
    pub min: u8,
    pub max: u8,
}

impl ZoomRange {
    /// Creates a validated zoom range (`min <= max <= MAX_ZOOM`).
    pub fn new(min: u8, max: u8) -> Result<Self, CoordError> {
        if max > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(max));
        }
        if min > max {
            return Err(CoordError::InvertedZoomRange { min, max });
        }
        Ok(Self { min, max })
    }

    /// Iterates the zoom levels in ascending order.
    pub fn levels(&self) -> impl Iterator<Item = u8> {
        self.min..=self.max
    }
}

/// Tile coordinates in the XYZ (slippy map) scheme, y = 0 at the north edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TileCoord {
    /// Zoom level
    pub zoom: u8,
    /// Column, 0 at the antimeridian west edge
    pub x: u32,
    /// Row, 0 at the north edge
    pub y: u32,
}

impl TileCoord {
    /// Creates a tile coordinate, checking `x, y < 2^zoom`.
    pub fn new(zoom: u8, x: u32, y: u32) -> Result<Self, CoordError> {
        if zoom > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(zoom));
        }
        let n = tiles_per_side(zoom);
        if x >= n || y >= n {
            return Err(CoordError::TileOutOfRange { zoom, x, y });
        }
        Ok(Self { zoom, x, y })
    }

    /// Row in the TMS scheme (y = 0 at the south edge), as stored by MBTiles.
    #[inline]
    pub fn tms_y(&self) -> u32 {
        tiles_per_side(self.zoom) - 1 - self.y
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Number of tiles along one side of the pyramid at `zoom`.
#[inline]
pub fn tiles_per_side(zoom: u8) -> u32 {
    1u32 << zoom
}

/// Inclusive rectangle of tiles at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TileRange {
    pub zoom: u8,
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl TileRange {
    /// Number of tiles in the rectangle (0 if inverted).
    pub fn count(&self) -> u64 {
        if self.min_x > self.max_x || self.min_y > self.max_y {
            return 0;
        }
        (self.max_x - self.min_x + 1) as u64 * (self.max_y - self.min_y + 1) as u64
    }

    /// Rejects inverted or out-of-pyramid rectangles.
    pub fn validate(&self) -> Result<(), CoordError> {
        let n = tiles_per_side(self.zoom);
        if self.min_x > self.max_x || self.min_y > self.max_y {
            return Err(CoordError::EmptyRange(*self));
        }
        if self.max_x >= n || self.max_y >= n {
            return Err(CoordError::TileOutOfRange {
                zoom: self.zoom,
                x: self.max_x,
                y: self.max_y,
            });
        }
        Ok(())
    }

    /// Returns true if the tile lies inside this rectangle.
    pub fn contains(&self, tile: &TileCoord) -> bool {
        tile.zoom == self.zoom
            && (self.min_x..=self.max_x).contains(&tile.x)
            && (self.min_y..=self.max_y).contains(&tile.y)
    }

    /// Iterates every tile, column by column (x outer, y inner).
    #[inline]
    pub fn tiles(&self) -> TileRangeIterator {
        TileRangeIterator {
            range: *self,
            x: self.min_x,
            y: self.min_y,
            remaining: self.count(),
        }
    }
}

/// Iterator over the tiles of a [`TileRange`].
#[derive(Debug, Clone)]
pub struct TileRangeIterator {
    range: TileRange,
    x: u32,
    y: u32,
    remaining: u64,
}

impl Iterator for TileRangeIterator {
    type Item = TileCoord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let tile = TileCoord {
            zoom: self.range.zoom,
            x: self.x,
            y: self.y,
        };

        self.remaining -= 1;
        if self.y == self.range.max_y {
            self.y = self.range.min_y;
            self.x += 1;
        } else {
            self.y += 1;
        }

        Some(tile)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TileRangeIterator {}

/// Errors from coordinate validation and conversion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    #[error("Invalid latitude: {0} (must be between -90 and 90)")]
    InvalidLatitude(f64),

    #[error("Invalid longitude: {0} (must be between -180 and 180)")]
    InvalidLongitude(f64),

    #[error("Invalid zoom level: {0} (must be between 0 and 22)")]
    InvalidZoom(u8),

    #[error("Invalid zoom range: min {min} is greater than max {max}")]
    InvertedZoomRange { min: u8, max: u8 },

    #[error("Bounds contain a non-finite value: {0}")]
    NonFiniteBounds(Bounds),

    #[error("Inverted bounds {0}: expected west < east and south < north")]
    InvertedBounds(Bounds),

    #[error("Cannot parse bounds '{0}': expected west,south,east,north")]
    Unparseable(String),

    #[error("Tile {zoom}/{x}/{y} is outside the tile pyramid")]
    TileOutOfRange { zoom: u8, x: u32, y: u32 },

    #[error("Empty tile range at zoom {}: x {}..={}, y {}..={}", .0.zoom, .0.min_x, .0.max_x, .0.min_y, .0.max_y)]
    EmptyRange(TileRange),
}

//! Generation plans: the tile rectangles a run will render.

use serde::Serialize;
use tracing::info;

use crate::coord::{tile_ranges, Bounds, CoordError, TileRange, ZoomRange};

/// Tile rectangles per zoom level for one bounding box.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationPlan {
    pub bounds: Bounds,
    pub zooms: ZoomRange,
    pub ranges: Vec<TileRange>,
}

impl GenerationPlan {
    /// Computes and validates the rectangle for every zoom level.
    pub fn new(bounds: Bounds, zooms: ZoomRange) -> Result<Self, CoordError> {
        let ranges = tile_ranges(&bounds, zooms)?;
        Ok(Self {
            bounds,
            zooms,
            ranges,
        })
    }

    /// Total number of tiles across all zoom levels.
    pub fn total_tiles(&self) -> u64 {
        self.ranges.iter().map(TileRange::count).sum()
    }

    /// `(zoom, tile count)` pairs in ascending zoom order.
    pub fn per_zoom(&self) -> impl Iterator<Item = (u8, u64)> + '_ {
        self.ranges.iter().map(|r| (r.zoom, r.count()))
    }

    /// Logs the plan at info level.
    pub fn log(&self) {
        info!(
            bounds = %self.bounds,
            min_zoom = self.zooms.min,
            max_zoom = self.zooms.max,
            total_tiles = self.total_tiles(),
            "Generation plan"
        );
        for range in &self.ranges {
            info!(
                zoom = range.zoom,
                x = %format!("{}..={}", range.min_x, range.max_x),
                y = %format!("{}..={}", range.min_y, range.max_y),
                tiles = range.count(),
                "Zoom level"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_totals() {
        let bounds = Bounds::new(-10.0, -10.0, 10.0, 10.0).unwrap();
        let plan = GenerationPlan::new(bounds, ZoomRange::new(0, 3).unwrap()).unwrap();

        assert_eq!(plan.ranges.len(), 4);
        assert_eq!(plan.total_tiles(), 13);
        assert_eq!(
            plan.per_zoom().collect::<Vec<_>>(),
            vec![(0, 1), (1, 4), (2, 4), (3, 4)]
        );
    }

    #[test]
    fn test_plan_serializes() {
        let plan = GenerationPlan::new(Bounds::WORLD, ZoomRange::new(0, 0).unwrap()).unwrap();
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["zooms"]["min"], 0);
        assert_eq!(json["ranges"][0]["max_x"], 0);
    }
}

//! Tests for coordinate conversion and tile ranges

use super::*;
use std::collections::HashSet;

#[test]
fn test_london_at_zoom_10() {
    // London: 51.5074°N, 0.1278°W
    let tile = to_tile_coords(51.5074, -0.1278, 10).unwrap();
    assert_eq!(tile.x, 511);
    assert_eq!(tile.y, 340);
    assert_eq!(tile.zoom, 10);
}

#[test]
fn test_invalid_latitude() {
    let result = to_tile_coords(90.0, 0.0, 10);
    assert!(matches!(result, Err(CoordError::InvalidLatitude(_))));
}

#[test]
fn test_tile_to_lat_lon_northwest_corner() {
    let tile = TileCoord { zoom: 1, x: 1, y: 1 };
    let (lat, lon) = tile_to_lat_lon(&tile);
    assert!(lat.abs() < 1e-9);
    assert!(lon.abs() < 1e-9);
}

#[test]
fn test_tile_center_of_world_tile() {
    let center = tile_center(&TileCoord { zoom: 0, x: 0, y: 0 });
    assert!(center.lng.abs() < 1e-9);
    assert!(center.lat.abs() < 1e-9);
}

#[test]
fn test_tile_center_lies_inside_tile() {
    let tile = TileCoord {
        zoom: 12,
        x: 2047,
        y: 1361,
    };
    let center = tile_center(&tile);
    assert_eq!(to_tile_coords(center.lat, center.lng, 12).unwrap(), tile);
}

#[test]
fn test_tms_row_flip() {
    let tile = TileCoord::new(3, 2, 1).unwrap();
    assert_eq!(tile.tms_y(), 6);
    assert_eq!(TileCoord::new(0, 0, 0).unwrap().tms_y(), 0);
}

#[test]
fn test_tile_coord_rejects_out_of_pyramid() {
    assert!(matches!(
        TileCoord::new(2, 4, 0),
        Err(CoordError::TileOutOfRange { .. })
    ));
    assert!(matches!(
        TileCoord::new(23, 0, 0),
        Err(CoordError::InvalidZoom(23))
    ));
}

#[test]
fn test_bounds_validation() {
    assert!(Bounds::new(-10.0, -10.0, 10.0, 10.0).is_ok());
    assert!(matches!(
        Bounds::new(10.0, -10.0, -10.0, 10.0),
        Err(CoordError::InvertedBounds(_))
    ));
    assert!(matches!(
        Bounds::new(0.0, 5.0, 1.0, 5.0),
        Err(CoordError::InvertedBounds(_))
    ));
    assert!(matches!(
        Bounds::new(f64::NAN, 0.0, 1.0, 1.0),
        Err(CoordError::NonFiniteBounds(_))
    ));
    assert!(matches!(
        Bounds::new(-200.0, 0.0, 1.0, 1.0),
        Err(CoordError::InvalidLongitude(_))
    ));
}

#[test]
fn test_bounds_from_str() {
    let bounds: Bounds = "-10, -5.5, 10,5.5".parse().unwrap();
    assert_eq!(bounds, Bounds::new(-10.0, -5.5, 10.0, 5.5).unwrap());

    assert!(matches!(
        "1,2,3".parse::<Bounds>(),
        Err(CoordError::Unparseable(_))
    ));
    assert!(matches!(
        "a,b,c,d".parse::<Bounds>(),
        Err(CoordError::Unparseable(_))
    ));
}

#[test]
fn test_zoom_range_validation() {
    assert!(ZoomRange::new(0, 0).is_ok());
    assert!(ZoomRange::new(3, 22).is_ok());
    assert!(matches!(
        ZoomRange::new(5, 4),
        Err(CoordError::InvertedZoomRange { min: 5, max: 4 })
    ));
    assert!(matches!(
        ZoomRange::new(0, 23),
        Err(CoordError::InvalidZoom(23))
    ));
    assert_eq!(
        ZoomRange::new(2, 4).unwrap().levels().collect::<Vec<_>>(),
        vec![2, 3, 4]
    );
}

#[test]
fn test_whole_world_at_zoom_zero_is_one_tile() {
    let range = tile_range_for_bounds(&Bounds::WORLD, 0).unwrap();
    assert_eq!(
        range,
        TileRange {
            zoom: 0,
            min_x: 0,
            min_y: 0,
            max_x: 0,
            max_y: 0
        }
    );
    assert_eq!(range.count(), 1);
}

#[test]
fn test_whole_world_covers_full_pyramid() {
    for zoom in 0..=6 {
        let range = tile_range_for_bounds(&Bounds::WORLD, zoom).unwrap();
        let n = tiles_per_side(zoom) as u64;
        assert_eq!(range.count(), n * n, "zoom {}", zoom);
    }
}

#[test]
fn test_two_by_two_rectangle_at_zoom_three() {
    let bounds = Bounds::new(-10.0, -10.0, 10.0, 10.0).unwrap();
    let range = tile_range_for_bounds(&bounds, 3).unwrap();
    assert_eq!((range.min_x, range.max_x), (3, 4));
    assert_eq!((range.min_y, range.max_y), (3, 4));
    assert_eq!(range.count(), 4);
}

#[test]
fn test_edge_on_tile_boundary_is_exclusive() {
    // East edge exactly on the prime meridian, the boundary between x=0 and x=1 at zoom 1
    let bounds = Bounds::new(-90.0, 10.0, 0.0, 20.0).unwrap();
    let range = tile_range_for_bounds(&bounds, 1).unwrap();
    assert_eq!((range.min_x, range.max_x), (0, 0));
}

#[test]
fn test_range_iterator_has_no_gaps_or_duplicates() {
    let bounds = Bounds::new(5.1, 45.2, 15.7, 55.9).unwrap();
    for zoom in 0..=9 {
        let range = tile_range_for_bounds(&bounds, zoom).unwrap();
        let tiles: Vec<_> = range.tiles().collect();
        let unique: HashSet<_> = tiles.iter().copied().collect();

        assert_eq!(tiles.len() as u64, range.count(), "zoom {}", zoom);
        assert_eq!(unique.len(), tiles.len(), "duplicates at zoom {}", zoom);
        for x in range.min_x..=range.max_x {
            for y in range.min_y..=range.max_y {
                assert!(unique.contains(&TileCoord { zoom, x, y }));
            }
        }
        assert!(tiles.iter().all(|t| range.contains(t)));
    }
}

#[test]
fn test_range_matches_corner_tiles() {
    let bounds = Bounds::new(-74.3, 40.4, -73.6, 41.0).unwrap();
    for zoom in [4, 8, 12, 16] {
        let range = tile_range_for_bounds(&bounds, zoom).unwrap();
        let nw = to_tile_coords(bounds.north, bounds.west, zoom).unwrap();
        let se = to_tile_coords(bounds.south, bounds.east, zoom).unwrap();
        assert_eq!((range.min_x, range.min_y), (nw.x, nw.y));
        assert_eq!((range.max_x, range.max_y), (se.x, se.y));
    }
}

#[test]
fn test_range_validate_rejects_inverted() {
    let range = TileRange {
        zoom: 2,
        min_x: 3,
        min_y: 0,
        max_x: 1,
        max_y: 0,
    };
    assert_eq!(range.count(), 0);
    assert!(matches!(range.validate(), Err(CoordError::EmptyRange(_))));
    assert_eq!(range.tiles().count(), 0);
}

#[test]
fn test_tile_ranges_sum() {
    let bounds = Bounds::new(-10.0, -10.0, 10.0, 10.0).unwrap();
    let ranges = tile_ranges(&bounds, ZoomRange::new(0, 3).unwrap()).unwrap();
    let counts: Vec<u64> = ranges.iter().map(TileRange::count).collect();
    assert_eq!(counts, vec![1, 4, 4, 4]);
}

// Property-based tests for range coverage
mod properties {
    use super::*;
    use proptest::prelude::*;

    fn bounds_strategy() -> impl Strategy<Value = Bounds> {
        (-179.0f64..179.0, 0.001f64..40.0, -84.0f64..84.0, 0.001f64..40.0).prop_map(
            |(west, width, south, height)| {
                Bounds::new(
                    west,
                    south,
                    (west + width).min(MAX_LON),
                    (south + height).min(84.9),
                )
                .unwrap()
            },
        )
    }

    proptest! {
        /// Property: every point inside the bounds lands in the computed range.
        #[test]
        fn prop_points_inside_bounds_are_covered(
            bounds in bounds_strategy(),
            zoom in 0u8..=16,
            fx in 0.0f64..0.999,
            fy in 0.0f64..0.999,
        ) {
            let range = tile_range_for_bounds(&bounds, zoom).unwrap();
            let lon = bounds.west + fx * (bounds.east - bounds.west);
            let lat = bounds.north - fy * (bounds.north - bounds.south);
            let tile = to_tile_coords(lat, lon, zoom).unwrap();
            prop_assert!(range.contains(&tile), "{} not in {:?}", tile, range);
        }

        /// Property: the plan total is the sum of the per-zoom rectangles.
        #[test]
        fn prop_range_counts_match_iteration(bounds in bounds_strategy(), max in 0u8..=6) {
            let ranges = tile_ranges(&bounds, ZoomRange::new(0, max).unwrap()).unwrap();
            prop_assert_eq!(ranges.len(), max as usize + 1);
            for range in &ranges {
                let width = (range.max_x - range.min_x + 1) as u64;
                let height = (range.max_y - range.min_y + 1) as u64;
                prop_assert_eq!(range.count(), width * height);
                prop_assert_eq!(range.tiles().count() as u64, range.count());
            }
        }
    }
}

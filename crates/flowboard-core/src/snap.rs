//! Grid snapping for moved and resized nodes.

use kurbo::{Point, Size, Vec2};

/// Grid size for snapping.
pub const GRID_SIZE: f64 = 10.0;

/// Minimum size of a resized checklist.
pub const MIN_CHECKLIST_SIZE: Size = Size::new(80.0, 32.0);
/// Minimum size of any other resized node.
pub const MIN_NODE_SIZE: Size = Size::new(60.0, 24.0);

/// Round a single coordinate to the nearest grid line.
pub fn snap_value(value: f64, grid_size: f64) -> f64 {
    (value / grid_size).round() * grid_size
}

/// Snap a point to the nearest grid intersection.
pub fn snap_to_grid(point: Point, grid_size: f64) -> Point {
    Point::new(snap_value(point.x, grid_size), snap_value(point.y, grid_size))
}

/// Position of a dragged node: the original position plus the total drag
/// delta since the drag began, snapped once.
pub fn snap_translation(origin: Point, total_delta: Vec2) -> Point {
    snap_to_grid(origin + total_delta, GRID_SIZE)
}

/// Snap a resized dimension while keeping it at or above `min`.
pub fn snap_dimension(value: f64, min: f64) -> f64 {
    let snapped = snap_value(value.max(min), GRID_SIZE);
    if snapped < min {
        (min / GRID_SIZE).ceil() * GRID_SIZE
    } else {
        snapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snap_to_grid() {
        let snapped = snap_to_grid(Point::new(14.0, 26.0), GRID_SIZE);
        assert_eq!(snapped, Point::new(10.0, 30.0));
    }

    #[test]
    fn test_snap_to_grid_exact() {
        let snapped = snap_to_grid(Point::new(40.0, 60.0), GRID_SIZE);
        assert_eq!(snapped, Point::new(40.0, 60.0));
    }

    #[test]
    fn test_snap_translation_uses_total_delta() {
        // Three steps of 4 units each land on 10 only when summed first.
        let origin = Point::new(100.0, 100.0);
        let mut pos = origin;
        for _ in 0..3 {
            pos = snap_translation(pos, Vec2::new(4.0, 0.0));
        }
        assert_eq!(pos.x, 100.0);
        assert_eq!(snap_translation(origin, Vec2::new(12.0, 0.0)).x, 110.0);
    }

    #[test]
    fn test_snap_dimension_respects_minimum() {
        assert_eq!(snap_dimension(10.0, MIN_NODE_SIZE.width), 60.0);
        assert_eq!(snap_dimension(10.0, MIN_CHECKLIST_SIZE.height), 40.0);
        assert_eq!(snap_dimension(134.0, MIN_NODE_SIZE.width), 130.0);
    }
}

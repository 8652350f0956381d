//! View module for pan/zoom transforms.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Deserializer, Serialize};

/// Minimum allowed zoom level.
pub const MIN_ZOOM: f64 = 0.25;
/// Maximum allowed zoom level.
pub const MAX_ZOOM: f64 = 2.0;
/// Additive zoom step applied per wheel notch.
pub const WHEEL_ZOOM_STEP: f64 = 0.1;
/// Screen padding kept around the content by [`View::fit_to_bounds`].
pub const FIT_PADDING: f64 = 60.0;
/// Zoom to fit never magnifies beyond this.
pub const MAX_FIT_ZOOM: f64 = 1.5;

const DEFAULT_PAN: f64 = 80.0;

/// View manages the transform between screen pixels and board units.
///
/// `board = (screen - pan) / zoom`. The zoom is private so it can only be
/// changed through clamping setters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct View {
    pub pan_x: f64,
    pub pan_y: f64,
    #[serde(deserialize_with = "deserialize_zoom")]
    zoom: f64,
}

impl Default for View {
    fn default() -> Self {
        Self {
            pan_x: DEFAULT_PAN,
            pan_y: DEFAULT_PAN,
            zoom: 1.0,
        }
    }
}

fn clamp_zoom(zoom: f64) -> f64 {
    if zoom.is_finite() {
        zoom.clamp(MIN_ZOOM, MAX_ZOOM)
    } else {
        1.0
    }
}

fn deserialize_zoom<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    f64::deserialize(deserializer).map(clamp_zoom)
}

impl View {
    pub fn new(pan: Vec2, zoom: f64) -> Self {
        Self {
            pan_x: pan.x,
            pan_y: pan.y,
            zoom: clamp_zoom(zoom),
        }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn pan(&self) -> Vec2 {
        Vec2::new(self.pan_x, self.pan_y)
    }

    /// Set the zoom level, clamped to [`MIN_ZOOM`, `MAX_ZOOM`].
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = clamp_zoom(zoom);
    }

    /// Affine transform from board coordinates to screen coordinates.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.pan()) * Affine::scale(self.zoom)
    }

    /// Affine transform from screen coordinates to board coordinates.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.zoom) * Affine::translate(-self.pan())
    }

    pub fn screen_to_board(&self, screen_point: Point) -> Point {
        self.inverse_transform() * screen_point
    }

    pub fn board_to_screen(&self, board_point: Point) -> Point {
        self.transform() * board_point
    }

    /// Map a screen-space rectangle into board space.
    pub fn screen_rect_to_board(&self, rect: Rect) -> Rect {
        let rect = rect.abs();
        Rect::from_points(
            self.screen_to_board(rect.origin()),
            self.screen_to_board(Point::new(rect.x1, rect.y1)),
        )
    }

    /// Pan by a delta in screen pixels.
    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan_x += delta.x;
        self.pan_y += delta.y;
    }

    /// Change zoom while keeping the board point under `screen_point` fixed.
    pub fn zoom_at(&mut self, screen_point: Point, zoom: f64) {
        let new_zoom = clamp_zoom(zoom);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }

        let board_point = self.screen_to_board(screen_point);
        self.zoom = new_zoom;

        // Re-anchor so board_point stays under the cursor
        let new_screen = self.board_to_screen(board_point);
        self.pan_by(screen_point - new_screen);
    }

    /// One wheel notch: scrolling down (positive delta) zooms out.
    pub fn wheel_zoom(&mut self, screen_point: Point, delta_y: f64) {
        if delta_y == 0.0 {
            return;
        }
        let step = if delta_y > 0.0 { -WHEEL_ZOOM_STEP } else { WHEEL_ZOOM_STEP };
        self.zoom_at(screen_point, self.zoom + step);
    }

    /// Fit the view so `bounds` is centered in a viewport of the given size.
    pub fn fit_to_bounds(&mut self, bounds: Rect, viewport: Size) {
        let box_w = bounds.width() + FIT_PADDING * 2.0;
        let box_h = bounds.height() + FIT_PADDING * 2.0;
        let scale = (viewport.width / box_w)
            .min(viewport.height / box_h)
            .min(MAX_FIT_ZOOM);
        self.zoom = clamp_zoom(scale);

        let center = bounds.center();
        self.pan_x = viewport.width / 2.0 - center.x * self.zoom;
        self.pan_y = viewport.height / 2.0 - center.y * self.zoom;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_view() {
        let view = View::default();
        assert_eq!(view.pan(), Vec2::new(80.0, 80.0));
        assert!((view.zoom() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_screen_to_board_with_pan() {
        let view = View::new(Vec2::new(50.0, 100.0), 1.0);
        let board = view.screen_to_board(Point::new(100.0, 200.0));
        assert!((board.x - 50.0).abs() < f64::EPSILON);
        assert!((board.y - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_screen_to_board_with_zoom() {
        let view = View::new(Vec2::ZERO, 2.0);
        let board = view.screen_to_board(Point::new(100.0, 200.0));
        assert!((board.x - 50.0).abs() < f64::EPSILON);
        assert!((board.y - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_roundtrip_conversion() {
        let view = View::new(Vec2::new(30.0, -20.0), 1.5);
        let original = Point::new(123.0, 456.0);
        let back = view.board_to_screen(view.screen_to_board(original));
        assert!((back.x - original.x).abs() < 1e-10);
        assert!((back.y - original.y).abs() < 1e-10);
    }

    #[test]
    fn test_zoom_clamp() {
        let mut view = View::default();
        view.set_zoom(3.0);
        assert_eq!(view.zoom(), 2.0);
        view.set_zoom(0.01);
        assert_eq!(view.zoom(), MIN_ZOOM);
        view.set_zoom(f64::NAN);
        assert_eq!(view.zoom(), 1.0);
    }

    #[test]
    fn test_zoom_clamped_on_load() {
        let view: View = serde_json::from_str(r#"{"panX":0,"panY":0,"zoom":9}"#).unwrap();
        assert_eq!(view.zoom(), MAX_ZOOM);

        let view: View = serde_json::from_str(r#"{"panX":5}"#).unwrap();
        assert_eq!(view.pan(), Vec2::new(5.0, 80.0));
        assert_eq!(view.zoom(), 1.0);
    }

    #[test]
    fn test_wheel_zoom_keeps_cursor_fixed() {
        let mut view = View::default();
        let cursor = Point::new(300.0, 200.0);
        let before = view.screen_to_board(cursor);
        view.wheel_zoom(cursor, -1.0);
        assert!((view.zoom() - 1.1).abs() < 1e-9);
        let after = view.screen_to_board(cursor);
        assert!((before - after).hypot() < 1e-9);

        view.wheel_zoom(cursor, 1.0);
        assert!((view.zoom() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_to_bounds_centers_content() {
        let mut view = View::default();
        let bounds = Rect::new(0.0, 0.0, 400.0, 200.0);
        view.fit_to_bounds(bounds, Size::new(1000.0, 800.0));
        // min(1000/520, 800/320, 1.5) = 1.5
        assert_eq!(view.zoom(), MAX_FIT_ZOOM);
        let center = view.board_to_screen(bounds.center());
        assert!((center.x - 500.0).abs() < 1e-9);
        assert!((center.y - 400.0).abs() < 1e-9);
    }

    #[test]
    fn test_pan_by() {
        let mut view = View::new(Vec2::ZERO, 1.0);
        view.pan_by(Vec2::new(10.0, 20.0));
        assert_eq!(view.pan(), Vec2::new(10.0, 20.0));
    }
}

//! Geometry engine: edge anchors, arrowheads, stroke metrics and hit tests.
//!
//! Everything here is a pure function of the board. Coordinates are board
//! units unless a name says `screen`.

use crate::board::{Board, Edge, ElementId, Node};
use crate::view::View;
use kurbo::{BezPath, Line, Point, Rect, Vec2};

/// Length of an arrowhead along the edge direction.
pub const ARROW_HEAD_LENGTH: f64 = 14.0;
/// Distance from the edge axis to each arrowhead wing.
pub const ARROW_HEAD_HALF_WIDTH: f64 = 8.0;
/// Visible stroke width in screen pixels.
pub const EDGE_STROKE_WIDTH: f64 = 2.0;
/// Stroke width multiplier for the selected edge.
pub const SELECTED_STROKE_FACTOR: f64 = 1.8;
/// Width of the invisible hit stroke in screen pixels.
pub const HIT_STROKE_WIDTH: f64 = 24.0;
/// Dash and gap lengths of a dashed edge in screen pixels.
pub const DASH_PATTERN: [f64; 2] = [8.0, 6.0];
pub const LABEL_FONT_SIZE: f64 = 12.0;
pub const MIN_LABEL_FONT_SIZE: f64 = 10.0;

/// Distance from a point to a line segment.
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = b - a;
    let pv = point - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    (point - (a + seg * t)).hypot()
}

/// Intersections of segment `a`-`b` with the four sides of `rect`.
pub fn segment_rect_intersections(a: Point, b: Point, rect: Rect) -> Vec<Point> {
    let d = b - a;
    let mut hits = Vec::with_capacity(4);

    if d.x.abs() > f64::EPSILON {
        for x in [rect.x0, rect.x1] {
            let t = (x - a.x) / d.x;
            let y = a.y + t * d.y;
            if (0.0..=1.0).contains(&t) && y >= rect.y0 && y <= rect.y1 {
                hits.push(Point::new(x, y));
            }
        }
    }
    if d.y.abs() > f64::EPSILON {
        for y in [rect.y0, rect.y1] {
            let t = (y - a.y) / d.y;
            let x = a.x + t * d.x;
            if (0.0..=1.0).contains(&t) && x >= rect.x0 && x <= rect.x1 {
                hits.push(Point::new(x, y));
            }
        }
    }
    hits
}

/// Boundary points where an edge between two rectangles starts and ends.
///
/// The start is the intersection with `from` farthest from its center; the
/// end is the intersection with `to` nearest to the center of `from`. A
/// rectangle with no intersection falls back to its center.
pub fn anchor_points(from: Rect, to: Rect) -> (Point, Point) {
    let c1 = from.center();
    let c2 = to.center();

    let start = segment_rect_intersections(c1, c2, from)
        .into_iter()
        .max_by(|p, q| p.distance(c1).total_cmp(&q.distance(c1)))
        .unwrap_or(c1);
    let end = segment_rect_intersections(c1, c2, to)
        .into_iter()
        .min_by(|p, q| p.distance(c1).total_cmp(&q.distance(c1)))
        .unwrap_or(c2);

    (start, end)
}

/// Unit direction from `a` to `b`, or +x for coincident points.
fn direction(a: Point, b: Point) -> Vec2 {
    let d = b - a;
    let len = d.hypot();
    if len < f64::EPSILON {
        Vec2::new(1.0, 0.0)
    } else {
        d / len
    }
}

/// A filled triangular arrowhead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arrowhead {
    pub tip: Point,
    pub left: Point,
    pub right: Point,
}

impl Arrowhead {
    /// Arrowhead with its tip at `tip`, pointing along unit vector `dir`.
    pub fn new(tip: Point, dir: Vec2) -> Self {
        let perp = Vec2::new(-dir.y, dir.x);
        let back = tip - dir * ARROW_HEAD_LENGTH;
        Self {
            tip,
            left: back + perp * ARROW_HEAD_HALF_WIDTH,
            right: back - perp * ARROW_HEAD_HALF_WIDTH,
        }
    }

    /// Midpoint of the base, where the visible shaft stops.
    pub fn base(&self) -> Point {
        self.left.midpoint(self.right)
    }

    pub fn to_path(&self) -> BezPath {
        let mut path = BezPath::new();
        path.move_to(self.tip);
        path.line_to(self.left);
        path.line_to(self.right);
        path.close_path();
        path
    }
}

/// Resolved drawing geometry of one edge.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeGeometry {
    pub edge_id: ElementId,
    /// Anchor on the source node boundary.
    pub start: Point,
    /// Anchor on the target node boundary.
    pub end: Point,
    /// Visible shaft, trimmed to the back of the arrowheads.
    pub shaft: Line,
    pub head: Arrowhead,
    /// Second arrowhead at `start` for bidirectional edges.
    pub tail: Option<Arrowhead>,
    pub label_position: Point,
}

impl EdgeGeometry {
    pub fn between(edge: &Edge, from: &Node, to: &Node) -> Self {
        let (start, end) = anchor_points(from.bounds(), to.bounds());
        let dir = direction(start, end);

        let head = Arrowhead::new(end, dir);
        let tail = edge.bidirectional.then(|| Arrowhead::new(start, -dir));
        let line_start = if edge.bidirectional {
            start + dir * ARROW_HEAD_LENGTH
        } else {
            start
        };

        Self {
            edge_id: edge.id.clone(),
            start,
            end,
            shaft: Line::new(line_start, end - dir * ARROW_HEAD_LENGTH),
            head,
            tail,
            label_position: start.midpoint(end),
        }
    }

    /// Whether `point` lies on the invisible hit stroke at the given zoom.
    pub fn hit_test(&self, point: Point, zoom: f64) -> bool {
        let half_width = HIT_STROKE_WIDTH / zoom / 2.0;
        point_to_segment_dist(point, self.start, self.end) <= half_width
    }
}

/// Geometry for `edge`, or `None` if an endpoint is missing.
pub fn edge_geometry(board: &Board, edge: &Edge) -> Option<EdgeGeometry> {
    let from = board.node(&edge.from_id)?;
    let to = board.node(&edge.to_id)?;
    Some(EdgeGeometry::between(edge, from, to))
}

/// Geometry for every edge with both endpoints present, in paint order.
pub fn board_edges(board: &Board) -> impl Iterator<Item = EdgeGeometry> + '_ {
    board
        .resolved_edges()
        .map(|(edge, from, to)| EdgeGeometry::between(edge, from, to))
}

/// Zoom-dependent stroke parameters of an edge, in board units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeMetrics {
    pub width: f64,
    pub hit_width: f64,
    pub dash: Option<[f64; 2]>,
    pub label_font_size: f64,
}

impl StrokeMetrics {
    pub fn for_edge(edge: &Edge, zoom: f64, selected: bool) -> Self {
        let factor = if selected { SELECTED_STROKE_FACTOR } else { 1.0 };
        Self {
            width: EDGE_STROKE_WIDTH / zoom * factor,
            hit_width: HIT_STROKE_WIDTH / zoom,
            dash: edge
                .dashed
                .then(|| [DASH_PATTERN[0] / zoom, DASH_PATTERN[1] / zoom]),
            label_font_size: (LABEL_FONT_SIZE / zoom).max(MIN_LABEL_FONT_SIZE),
        }
    }
}

/// Topmost edge under a board point.
pub fn edge_at_point(board: &Board, point: Point, zoom: f64) -> Option<ElementId> {
    board_edges(board)
        .filter(|g| g.hit_test(point, zoom))
        .last()
        .map(|g| g.edge_id)
}

/// Topmost node containing a board point.
pub fn node_at_point(board: &Board, point: Point) -> Option<&Node> {
    board.nodes.iter().rev().find(|n| {
        let b = n.bounds();
        point.x >= b.x0 && point.x <= b.x1 && point.y >= b.y0 && point.y <= b.y1
    })
}

/// Inclusive overlap test: rectangles that only touch still overlap.
pub fn rects_overlap(a: Rect, b: Rect) -> bool {
    !(a.x1 < b.x0 || a.x0 > b.x1 || a.y1 < b.y0 || a.y0 > b.y1)
}

/// Ids of nodes overlapping a board-space rectangle.
pub fn nodes_in_rect(board: &Board, rect: Rect) -> Vec<ElementId> {
    let rect = rect.abs();
    board
        .nodes
        .iter()
        .filter(|n| rects_overlap(n.bounds(), rect))
        .map(|n| n.id.clone())
        .collect()
}

/// Ids of nodes overlapping a marquee drawn in screen space.
pub fn marquee_selection(board: &Board, view: &View, screen_rect: Rect) -> Vec<ElementId> {
    nodes_in_rect(board, view.screen_rect_to_board(screen_rect))
}

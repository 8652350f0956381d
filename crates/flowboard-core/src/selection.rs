//! Selection, resize handles and in-progress manipulation state.

use crate::board::{Board, ElementId, Node, NodeVariant};
use crate::snap::{self, MIN_CHECKLIST_SIZE, MIN_NODE_SIZE};
use kurbo::{Point, Size, Vec2};

/// Handle hit tolerance in screen pixels.
pub const HANDLE_HIT_TOLERANCE: f64 = 8.0;
/// Movement in board units a drag must exceed before it counts.
pub const DRAG_THRESHOLD: f64 = 2.0;

/// The current selection: either an ordered set of nodes or one edge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    nodes: Vec<ElementId>,
    edge: Option<ElementId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selected node ids in selection order.
    pub fn nodes(&self) -> &[ElementId] {
        &self.nodes
    }

    pub fn edge(&self) -> Option<&ElementId> {
        self.edge.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edge.is_none()
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n == id)
    }

    /// Replace the selection with a single node.
    pub fn select_only(&mut self, id: impl Into<ElementId>) {
        self.edge = None;
        self.nodes.clear();
        self.nodes.push(id.into());
    }

    /// Add the node if absent, remove it if present (shift-click).
    pub fn toggle(&mut self, id: impl Into<ElementId>) {
        let id = id.into();
        self.edge = None;
        if let Some(pos) = self.nodes.iter().position(|n| *n == id) {
            self.nodes.remove(pos);
        } else {
            self.nodes.push(id);
        }
    }

    pub fn select_nodes(&mut self, ids: Vec<ElementId>) {
        self.edge = None;
        self.nodes = ids;
    }

    pub fn select_edge(&mut self, id: impl Into<ElementId>) {
        self.nodes.clear();
        self.edge = Some(id.into());
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edge = None;
    }

    /// The two most recently selected nodes, in selection order.
    pub fn last_two(&self) -> Option<(&ElementId, &ElementId)> {
        match self.nodes.as_slice() {
            [.., a, b] => Some((a, b)),
            _ => None,
        }
    }

    /// Forget ids that no longer exist on `board`.
    pub fn retain_existing(&mut self, board: &Board) {
        self.nodes.retain(|id| board.contains_node(id));
        if self.edge.as_ref().is_some_and(|id| board.edge(id).is_none()) {
            self.edge = None;
        }
    }

    pub(crate) fn remove_node(&mut self, id: &str) {
        self.nodes.retain(|n| n != id);
    }
}

/// Resize handle on a node's right edge, bottom edge or bottom-right corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResizeHandle {
    East,
    South,
    SouthEast,
}

impl ResizeHandle {
    pub const ALL: [ResizeHandle; 3] = [ResizeHandle::East, ResizeHandle::South, ResizeHandle::SouthEast];

    pub fn resizes_width(self) -> bool {
        matches!(self, ResizeHandle::East | ResizeHandle::SouthEast)
    }

    pub fn resizes_height(self) -> bool {
        matches!(self, ResizeHandle::South | ResizeHandle::SouthEast)
    }

    /// Handle position in board coordinates.
    pub fn position(self, node: &Node) -> Point {
        let b = node.bounds();
        match self {
            ResizeHandle::East => Point::new(b.x1, b.center().y),
            ResizeHandle::South => Point::new(b.center().x, b.y1),
            ResizeHandle::SouthEast => Point::new(b.x1, b.y1),
        }
    }
}

/// Resize handle of `node` under a board point. `tolerance` is in board units.
pub fn hit_test_handles(node: &Node, point: Point, tolerance: f64) -> Option<ResizeHandle> {
    // Corner first so it wins where handles overlap on small nodes
    [ResizeHandle::SouthEast, ResizeHandle::East, ResizeHandle::South]
        .into_iter()
        .find(|h| h.position(node).distance(point) <= tolerance)
}

/// Minimum size of a node when resized.
pub fn min_size(variant: NodeVariant) -> Size {
    match variant {
        NodeVariant::Checklist => MIN_CHECKLIST_SIZE,
        _ => MIN_NODE_SIZE,
    }
}

/// State for moving one or more nodes.
#[derive(Debug, Clone)]
pub struct MoveState {
    /// Board point where the drag began.
    pub start_point: Point,
    /// Current board point of the drag.
    pub current_point: Point,
    /// Original positions of the moved nodes.
    pub origins: Vec<(ElementId, Point)>,
    /// Whether the drag crossed the threshold and recorded its checkpoint.
    pub checkpointed: bool,
}

impl MoveState {
    pub fn new(start_point: Point, origins: Vec<(ElementId, Point)>) -> Self {
        Self {
            start_point,
            current_point: start_point,
            origins,
            checkpointed: false,
        }
    }

    /// Total drag delta since the start.
    pub fn delta(&self) -> Vec2 {
        self.current_point - self.start_point
    }

    pub fn exceeds_threshold(&self) -> bool {
        let d = self.delta();
        d.x.abs() > DRAG_THRESHOLD || d.y.abs() > DRAG_THRESHOLD
    }

    /// Snapped target position of every moved node.
    pub fn targets(&self) -> impl Iterator<Item = (&ElementId, Point)> {
        let delta = self.delta();
        self.origins
            .iter()
            .map(move |(id, origin)| (id, snap::snap_translation(*origin, delta)))
    }
}

/// State for resizing a single node.
#[derive(Debug, Clone)]
pub struct ResizeState {
    pub node_id: ElementId,
    pub handle: ResizeHandle,
    pub min: Size,
    pub checkpointed: bool,
}

impl ResizeState {
    pub fn new(node: &Node, handle: ResizeHandle) -> Self {
        Self {
            node_id: node.id.clone(),
            handle,
            min: min_size(node.variant()),
            checkpointed: false,
        }
    }

    /// Snapped size of `node` with its handle dragged to `point`.
    pub fn target_size(&self, node: &Node, point: Point) -> Size {
        let width = if self.handle.resizes_width() {
            snap::snap_dimension(point.x - node.x, self.min.width)
        } else {
            node.width
        };
        let height = if self.handle.resizes_height() {
            snap::snap_dimension(point.y - node.y, self.min.height)
        } else {
            node.height
        };
        Size::new(width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_and_edge_selection_exclusive() {
        let mut sel = Selection::new();
        sel.select_only("a");
        sel.toggle("b");
        assert_eq!(sel.nodes(), ["a".to_string(), "b".to_string()]);

        sel.select_edge("e");
        assert!(sel.nodes().is_empty());
        assert_eq!(sel.edge().map(String::as_str), Some("e"));

        sel.toggle("a");
        assert!(sel.edge().is_none());
        assert_eq!(sel.nodes().len(), 1);
    }

    #[test]
    fn test_toggle_removes() {
        let mut sel = Selection::new();
        sel.select_nodes(vec!["a".into(), "b".into(), "c".into()]);
        sel.toggle("b");
        assert_eq!(sel.nodes(), ["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_last_two() {
        let mut sel = Selection::new();
        sel.select_only("a");
        assert!(sel.last_two().is_none());
        sel.toggle("b");
        sel.toggle("c");
        let (x, y) = sel.last_two().unwrap();
        assert_eq!((x.as_str(), y.as_str()), ("b", "c"));
    }

    #[test]
    fn test_move_threshold_and_snap() {
        let mut state = MoveState::new(Point::new(0.0, 0.0), vec![("a".into(), Point::new(103.0, 47.0))]);
        state.current_point = Point::new(1.5, -2.0);
        assert!(!state.exceeds_threshold());

        state.current_point = Point::new(16.0, 2.5);
        assert!(state.exceeds_threshold());
        let (_, target) = state.targets().next().unwrap();
        assert_eq!(target, Point::new(120.0, 50.0));
    }

    #[test]
    fn test_resize_target_size() {
        let mut node = Node::from_template(NodeVariant::Checklist, Point::new(0.0, 0.0));
        node.width = 200.0;
        let state = ResizeState::new(&node, ResizeHandle::East);
        let size = state.target_size(&node, Point::new(10.0, 500.0));
        assert_eq!(size, Size::new(80.0, node.height));

        let state = ResizeState::new(&node, ResizeHandle::SouthEast);
        let size = state.target_size(&node, Point::new(143.0, 96.0));
        assert_eq!(size, Size::new(140.0, 100.0));
    }

    #[test]
    fn test_hit_test_handles() {
        let mut node = Node::from_template(NodeVariant::Text, Point::new(0.0, 0.0));
        node.width = 100.0;
        node.height = 50.0;
        assert_eq!(hit_test_handles(&node, Point::new(99.0, 49.0), 4.0), Some(ResizeHandle::SouthEast));
        assert_eq!(hit_test_handles(&node, Point::new(101.0, 25.0), 4.0), Some(ResizeHandle::East));
        assert_eq!(hit_test_handles(&node, Point::new(50.0, 52.0), 4.0), Some(ResizeHandle::South));
        assert_eq!(hit_test_handles(&node, Point::new(50.0, 25.0), 4.0), None);
    }
}

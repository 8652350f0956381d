//! Canvas: the board plus editor state, and every mutation of the board.
//!
//! All structural mutations record a history checkpoint first; content edits
//! go through editing sessions (see [`crate::history`]). Each mutation that
//! should be persisted bumps [`Canvas::revision`].

use crate::board::{
    Board, BoardError, ChecklistItem, Edge, ElementId, Node, NodeKind, NodeVariant, new_id,
    CHECKLIST_PADDING, CHECKLIST_ROW_HEIGHT,
};
use crate::color::ColorSpec;
use crate::geometry;
use crate::history::{EditField, EditKey, History};
use crate::selection::{MoveState, ResizeHandle, ResizeState, Selection};
use kurbo::{Point, Rect, Size, Vec2};
use thiserror::Error;

/// Offset applied to duplicated nodes.
pub const DUPLICATE_OFFSET: Vec2 = Vec2::new(24.0, 24.0);

/// Errors from canvas mutations. A failed mutation leaves the board untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CanvasError {
    #[error("node not found: {0}")]
    UnknownNode(ElementId),
    #[error("edge not found: {0}")]
    UnknownEdge(ElementId),
    #[error("checklist item {item} not found in node {node}")]
    UnknownItem { node: ElementId, item: ElementId },
    #[error("cannot apply {update} to {variant} node {node}")]
    VariantMismatch {
        node: ElementId,
        variant: NodeVariant,
        update: &'static str,
    },
    #[error("cannot connect node {0} to itself")]
    SelfLoop(ElementId),
}

/// Typed partial update of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeUpdate {
    /// Node text. For a checklist this is the text of its first item.
    Text(String),
    /// Font size of a free-text node.
    FontSize(f64),
    /// Color of a status node.
    StatusColor(ColorSpec),
    /// Position and size.
    Frame(Rect),
}

impl NodeUpdate {
    fn name(&self) -> &'static str {
        match self {
            NodeUpdate::Text(_) => "text",
            NodeUpdate::FontSize(_) => "font size",
            NodeUpdate::StatusColor(_) => "status color",
            NodeUpdate::Frame(_) => "frame",
        }
    }

    fn applies_to(&self, variant: NodeVariant) -> bool {
        match self {
            NodeUpdate::Text(_) | NodeUpdate::Frame(_) => true,
            NodeUpdate::FontSize(_) => variant == NodeVariant::Text,
            NodeUpdate::StatusColor(_) => variant == NodeVariant::Status,
        }
    }
}

/// Typed partial update of a checklist item.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemUpdate {
    Text(String),
    Checked(bool),
}

/// Typed partial update of an edge.
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeUpdate {
    Color(ColorSpec),
    /// Label text; empty clears the label.
    Label(String),
    Dashed(bool),
    Bidirectional(bool),
}

/// Editor state around one board.
#[derive(Debug, Clone, Default)]
pub struct Canvas {
    board: Board,
    history: History,
    selection: Selection,
    move_state: Option<MoveState>,
    resize_state: Option<ResizeState>,
    revision: u64,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_board(board: Board) -> Self {
        Self {
            board,
            ..Self::default()
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Counter bumped by every mutation that should be persisted.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    fn checkpoint(&mut self) {
        self.history.record_checkpoint(&self.board);
    }

    fn require_node(&self, id: &str) -> Result<&Node, CanvasError> {
        self.board
            .node(id)
            .ok_or_else(|| CanvasError::UnknownNode(id.to_string()))
    }

    // --- Nodes -----------------------------------------------------------

    /// Add a node from the default template of `variant` and select it.
    pub fn add_node(&mut self, variant: NodeVariant, position: Point) -> ElementId {
        self.checkpoint();
        let node = Node::from_template(variant, position);
        let id = node.id.clone();
        self.board.nodes.push(node);
        self.selection.select_only(id.clone());
        self.touch();
        id
    }

    /// Delete nodes and every edge touching them. Returns how many nodes
    /// were removed.
    pub fn delete_nodes(&mut self, ids: &[ElementId]) -> usize {
        let doomed: Vec<ElementId> = ids
            .iter()
            .filter(|id| self.board.contains_node(id))
            .cloned()
            .collect();
        if doomed.is_empty() {
            return 0;
        }

        self.checkpoint();
        self.board.nodes.retain(|n| !doomed.contains(&n.id));
        self.board
            .edges
            .retain(|e| !doomed.iter().any(|id| e.touches(id)));
        for id in &doomed {
            self.selection.remove_node(id);
        }
        self.selection.retain_existing(&self.board);
        self.touch();
        doomed.len()
    }

    /// Delete the selected edge, or else the selected nodes.
    pub fn delete_selected(&mut self) -> bool {
        if let Some(edge_id) = self.selection.edge().cloned() {
            return self.delete_edge(&edge_id).is_ok();
        }
        let ids = self.selection.nodes().to_vec();
        self.delete_nodes(&ids) > 0
    }

    /// Apply a structural update to a node. Text updates are content edits
    /// and coalesce within an editing session.
    pub fn update_node(&mut self, id: &str, update: NodeUpdate) -> Result<(), CanvasError> {
        let variant = self.require_node(id)?.variant();
        if !update.applies_to(variant) {
            return Err(CanvasError::VariantMismatch {
                node: id.to_string(),
                variant,
                update: update.name(),
            });
        }

        match &update {
            NodeUpdate::Text(_) => {
                // A checklist's text is its first row; share that row's session
                let field = match self.require_node(id)?.items().first() {
                    Some(first) => EditField::ItemText(first.id.clone()),
                    None => EditField::Text,
                };
                self.history.checkpoint_edit(&self.board, EditKey::new(id, field));
            }
            _ => self.checkpoint(),
        }

        let node = self
            .board
            .node_mut(id)
            .ok_or_else(|| CanvasError::UnknownNode(id.to_string()))?;
        match update {
            NodeUpdate::Text(value) => match &mut node.kind {
                NodeKind::Text { text, .. } | NodeKind::Status { text, .. } => *text = value,
                NodeKind::Checklist { items } => {
                    if let Some(first) = items.first_mut() {
                        first.text = value;
                    }
                }
            },
            NodeUpdate::FontSize(size) => {
                if let NodeKind::Text { font_size, .. } = &mut node.kind {
                    *font_size = size;
                }
            }
            NodeUpdate::StatusColor(spec) => {
                if let NodeKind::Status { color, .. } = &mut node.kind {
                    *color = spec;
                }
            }
            NodeUpdate::Frame(rect) => {
                let rect = rect.abs();
                node.x = rect.x0;
                node.y = rect.y0;
                node.width = rect.width().max(1.0);
                node.height = rect.height().max(1.0);
            }
        }
        self.touch();
        Ok(())
    }

    /// Leave the current content field; the next edit starts a new session.
    pub fn end_edit_session(&mut self) {
        self.history.end_session();
    }

    /// Duplicate nodes with fresh ids, offset by [`DUPLICATE_OFFSET`], and
    /// select the copies.
    pub fn duplicate_nodes(&mut self, ids: &[ElementId]) -> Vec<ElementId> {
        let originals: Vec<Node> = ids
            .iter()
            .filter_map(|id| self.board.node(id))
            .cloned()
            .collect();
        if originals.is_empty() {
            return Vec::new();
        }

        self.checkpoint();
        let mut new_ids = Vec::with_capacity(originals.len());
        for mut node in originals {
            node.id = new_id();
            node.x += DUPLICATE_OFFSET.x;
            node.y += DUPLICATE_OFFSET.y;
            if let NodeKind::Checklist { items } = &mut node.kind {
                for item in items.iter_mut() {
                    item.id = new_id();
                }
            }
            new_ids.push(node.id.clone());
            self.board.nodes.push(node);
        }
        self.selection.select_nodes(new_ids.clone());
        self.touch();
        new_ids
    }

    pub fn duplicate_selected(&mut self) -> Vec<ElementId> {
        let ids = self.selection.nodes().to_vec();
        self.duplicate_nodes(&ids)
    }

    // --- Checklist items -------------------------------------------------

    fn checklist_items_mut(&mut self, node_id: &str) -> Result<&mut Vec<ChecklistItem>, CanvasError> {
        let node = self
            .board
            .node_mut(node_id)
            .ok_or_else(|| CanvasError::UnknownNode(node_id.to_string()))?;
        let variant = node.variant();
        match &mut node.kind {
            NodeKind::Checklist { items } => Ok(items),
            _ => Err(CanvasError::VariantMismatch {
                node: node_id.to_string(),
                variant,
                update: "checklist item",
            }),
        }
    }

    fn checklist_height(rows: usize) -> f64 {
        rows as f64 * CHECKLIST_ROW_HEIGHT + CHECKLIST_PADDING
    }

    /// Append a placeholder item and grow the node to fit it.
    pub fn add_checklist_item(&mut self, node_id: &str) -> Result<ElementId, CanvasError> {
        self.checklist_items_mut(node_id)?;
        self.checkpoint();

        let items = self.checklist_items_mut(node_id)?;
        let item = ChecklistItem::placeholder();
        let item_id = item.id.clone();
        items.push(item);
        let rows = items.len();

        if let Some(node) = self.board.node_mut(node_id) {
            node.height = node.height.max(Self::checklist_height(rows));
        }
        self.touch();
        Ok(item_id)
    }

    /// Remove an item; an emptied checklist gets a placeholder back.
    pub fn remove_checklist_item(&mut self, node_id: &str, item_id: &str) -> Result<(), CanvasError> {
        let exists = self.checklist_items_mut(node_id)?.iter().any(|i| i.id == item_id);
        if !exists {
            return Err(CanvasError::UnknownItem {
                node: node_id.to_string(),
                item: item_id.to_string(),
            });
        }
        self.checkpoint();

        let items = self.checklist_items_mut(node_id)?;
        items.retain(|i| i.id != item_id);
        if items.is_empty() {
            items.push(ChecklistItem::placeholder());
        }
        let rows = items.len();

        if let Some(node) = self.board.node_mut(node_id) {
            node.height = CHECKLIST_ROW_HEIGHT.max(Self::checklist_height(rows));
        }
        self.touch();
        Ok(())
    }

    /// Edit an item's text or checked state. Both are content edits.
    pub fn update_checklist_item(
        &mut self,
        node_id: &str,
        item_id: &str,
        update: ItemUpdate,
    ) -> Result<(), CanvasError> {
        let exists = self.checklist_items_mut(node_id)?.iter().any(|i| i.id == item_id);
        if !exists {
            return Err(CanvasError::UnknownItem {
                node: node_id.to_string(),
                item: item_id.to_string(),
            });
        }

        let field = match update {
            ItemUpdate::Text(_) => EditField::ItemText(item_id.to_string()),
            ItemUpdate::Checked(_) => EditField::ItemChecked(item_id.to_string()),
        };
        self.history
            .checkpoint_edit(&self.board, EditKey::new(node_id, field));

        let items = self.checklist_items_mut(node_id)?;
        if let Some(item) = items.iter_mut().find(|i| i.id == item_id) {
            match update {
                ItemUpdate::Text(text) => item.text = text,
                ItemUpdate::Checked(checked) => item.checked = checked,
            }
        }
        self.touch();
        Ok(())
    }

    // --- Edges -----------------------------------------------------------

    /// Connect two nodes. Returns `None` if an edge in this direction already
    /// exists.
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<Option<ElementId>, CanvasError> {
        if from == to {
            return Err(CanvasError::SelfLoop(from.to_string()));
        }
        self.require_node(from)?;
        self.require_node(to)?;
        if self.board.edge_from_to(from, to).is_some() {
            return Ok(None);
        }

        self.checkpoint();
        let edge = Edge::new(from, to);
        let id = edge.id.clone();
        self.board.edges.push(edge);
        self.touch();
        Ok(Some(id))
    }

    /// Connect the two most recently selected nodes, older to newer.
    pub fn connect_selected(&mut self) -> Result<Option<ElementId>, CanvasError> {
        let Some((from, to)) = self.selection.last_two() else {
            return Ok(None);
        };
        let (from, to) = (from.clone(), to.clone());
        self.add_edge(&from, &to)
    }

    /// Remove the edge joining exactly two selected nodes, in either
    /// direction.
    pub fn disconnect_selected(&mut self) -> Option<Edge> {
        let [a, b] = self.selection.nodes() else {
            return None;
        };
        let edge_id = self.board.edge_between(a, b)?.id.clone();
        self.delete_edge(&edge_id).ok()
    }

    pub fn delete_edge(&mut self, id: &str) -> Result<Edge, CanvasError> {
        let pos = self
            .board
            .edges
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| CanvasError::UnknownEdge(id.to_string()))?;

        self.checkpoint();
        let edge = self.board.edges.remove(pos);
        if self.selection.edge().is_some_and(|e| *e == edge.id) {
            self.selection.clear();
        }
        self.touch();
        Ok(edge)
    }

    /// Style updates are structural; label typing coalesces per session.
    pub fn update_edge(&mut self, id: &str, update: EdgeUpdate) -> Result<(), CanvasError> {
        if self.board.edge(id).is_none() {
            return Err(CanvasError::UnknownEdge(id.to_string()));
        }
        match update {
            EdgeUpdate::Label(_) => {
                self.history
                    .checkpoint_edit(&self.board, EditKey::new(id, EditField::EdgeLabel));
            }
            _ => self.checkpoint(),
        }

        let edge = self
            .board
            .edge_mut(id)
            .ok_or_else(|| CanvasError::UnknownEdge(id.to_string()))?;
        match update {
            EdgeUpdate::Color(color) => edge.color = color,
            EdgeUpdate::Label(label) => edge.label = Some(label).filter(|l| !l.is_empty()),
            EdgeUpdate::Dashed(dashed) => edge.dashed = dashed,
            EdgeUpdate::Bidirectional(bidirectional) => edge.bidirectional = bidirectional,
        }
        self.touch();
        Ok(())
    }

    // --- Selection -------------------------------------------------------

    pub fn select_only(&mut self, id: &str) -> Result<(), CanvasError> {
        self.require_node(id)?;
        self.selection.select_only(id);
        Ok(())
    }

    /// Shift-click: add or remove a node from the selection.
    pub fn toggle_selection(&mut self, id: &str) -> Result<(), CanvasError> {
        self.require_node(id)?;
        self.selection.toggle(id);
        Ok(())
    }

    pub fn select_edge(&mut self, id: &str) -> Result<(), CanvasError> {
        if self.board.edge(id).is_none() {
            return Err(CanvasError::UnknownEdge(id.to_string()));
        }
        self.selection.select_edge(id);
        Ok(())
    }

    pub fn select_all(&mut self) {
        let ids = self.board.nodes.iter().map(|n| n.id.clone()).collect();
        self.selection.select_nodes(ids);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Select the nodes overlapping a marquee drawn in screen space.
    pub fn marquee_select(&mut self, screen_rect: Rect) -> &[ElementId] {
        let ids = geometry::marquee_selection(&self.board, &self.board.view, screen_rect);
        self.selection.select_nodes(ids);
        self.selection.nodes()
    }

    // --- Drag move and resize ----------------------------------------------

    /// Start dragging `node_id` from a board point. If the node is part of a
    /// multi-selection the whole selection moves.
    pub fn begin_move(&mut self, node_id: &str, board_point: Point) -> Result<(), CanvasError> {
        self.require_node(node_id)?;
        let ids: Vec<ElementId> = if self.selection.nodes().len() > 1 && self.selection.contains_node(node_id) {
            self.selection.nodes().to_vec()
        } else {
            if !self.selection.contains_node(node_id) {
                self.selection.select_only(node_id);
            }
            vec![node_id.to_string()]
        };
        let origins = ids
            .into_iter()
            .filter_map(|id| {
                let origin = self.board.node(&id)?.origin();
                Some((id, origin))
            })
            .collect();
        self.move_state = Some(MoveState::new(board_point, origins));
        Ok(())
    }

    /// Continue a drag. Nothing moves until the drag exceeds the threshold,
    /// at which point one checkpoint is recorded. Returns whether nodes moved.
    pub fn move_to(&mut self, board_point: Point) -> bool {
        let Some(state) = self.move_state.as_mut() else {
            return false;
        };
        state.current_point = board_point;
        if !state.checkpointed {
            if !state.exceeds_threshold() {
                return false;
            }
            state.checkpointed = true;
            self.history.record_checkpoint(&self.board);
        }

        let Some(state) = self.move_state.as_ref() else {
            return false;
        };
        for (id, target) in state.targets() {
            if let Some(node) = self.board.nodes.iter_mut().find(|n| n.id == *id) {
                node.x = target.x;
                node.y = target.y;
            }
        }
        true
    }

    /// Finish a drag. Returns whether anything moved.
    pub fn end_move(&mut self) -> bool {
        let moved = self.move_state.take().is_some_and(|s| s.checkpointed);
        if moved {
            self.touch();
        }
        moved
    }

    pub fn is_moving(&self) -> bool {
        self.move_state.is_some()
    }

    pub fn begin_resize(&mut self, node_id: &str, handle: ResizeHandle) -> Result<(), CanvasError> {
        let node = self.require_node(node_id)?;
        self.resize_state = Some(ResizeState::new(node, handle));
        Ok(())
    }

    /// Continue a resize to the handle's new board position. The first size
    /// change records a checkpoint.
    pub fn resize_to(&mut self, board_point: Point) -> bool {
        let Some(state) = self.resize_state.as_ref() else {
            return false;
        };
        let Some(node) = self.board.node(&state.node_id) else {
            return false;
        };
        let size = state.target_size(node, board_point);
        if size == Size::new(node.width, node.height) {
            return false;
        }

        if !state.checkpointed {
            self.history.record_checkpoint(&self.board);
        }
        let Some(state) = self.resize_state.as_mut() else {
            return false;
        };
        state.checkpointed = true;
        let node_id = state.node_id.clone();
        if let Some(node) = self.board.node_mut(&node_id) {
            node.width = size.width;
            node.height = size.height;
        }
        true
    }

    pub fn end_resize(&mut self) -> bool {
        let resized = self.resize_state.take().is_some_and(|s| s.checkpointed);
        if resized {
            self.touch();
        }
        resized
    }

    // --- View --------------------------------------------------------------

    /// Pan by a screen delta. View changes are not checkpointed.
    pub fn pan_by(&mut self, delta: Vec2) {
        self.board.view.pan_by(delta);
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.board.view.set_zoom(zoom);
    }

    pub fn wheel_zoom(&mut self, screen_point: Point, delta_y: f64) {
        self.board.view.wheel_zoom(screen_point, delta_y);
    }

    /// Fit all nodes into a viewport. Does nothing on an empty board.
    pub fn zoom_to_fit(&mut self, viewport: Size) -> bool {
        let Some(bounds) = self.board.content_bounds() else {
            return false;
        };
        self.board.view.fit_to_bounds(bounds, viewport);
        true
    }

    // --- History -----------------------------------------------------------

    pub fn undo(&mut self) -> bool {
        self.move_state = None;
        self.resize_state = None;
        if !self.history.undo(&mut self.board) {
            return false;
        }
        self.selection.clear();
        self.touch();
        true
    }

    pub fn redo(&mut self) -> bool {
        self.move_state = None;
        self.resize_state = None;
        if !self.history.redo(&mut self.board) {
            return false;
        }
        self.selection.clear();
        self.touch();
        true
    }

    // --- Import, export and replication ----------------------------------

    pub fn export_json(&self) -> Result<String, BoardError> {
        self.board.to_json()
    }

    /// Replace the board with an imported one. On a parse error the board is
    /// left unchanged.
    pub fn import_json(&mut self, json: &str) -> Result<(), BoardError> {
        let board = Board::from_json(json)?;
        self.checkpoint();
        self.replace(board);
        self.touch();
        Ok(())
    }

    /// Adopt a board received from the relay. History is kept and the change
    /// is not scheduled for persistence.
    pub fn apply_remote_board(&mut self, board: Board) {
        self.history.end_session();
        self.replace(board);
    }

    /// Replace the board after loading from storage, without a checkpoint.
    pub fn load_board(&mut self, board: Board) {
        self.history.clear();
        self.replace(board);
    }

    fn replace(&mut self, board: Board) {
        self.board = board;
        self.selection.clear();
        self.move_state = None;
        self.resize_state = None;
    }
}

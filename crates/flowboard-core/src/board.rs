//! Board data model: nodes, edges and the view they are shown through.
//!
//! The board is the unit of persistence, undo snapshots and replication.
//! Loading is lenient: nodes or edges that fail to parse are dropped with a
//! warning so that one bad element never makes a whole board unreadable.

use crate::color::ColorSpec;
use crate::view::View;
use kurbo::{Point, Rect, Size};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Identifier of a node, edge or checklist item.
pub type ElementId = String;

/// Generate a fresh random element id.
pub fn new_id() -> ElementId {
    Uuid::new_v4().to_string()
}

pub const DEFAULT_NODE_WIDTH: f64 = 120.0;
pub const DEFAULT_NODE_HEIGHT: f64 = 40.0;
pub const DEFAULT_FONT_SIZE: f64 = 14.0;
pub const PLACEHOLDER_ITEM_TEXT: &str = "Task";

/// Height of one checklist row.
pub const CHECKLIST_ROW_HEIGHT: f64 = 32.0;
/// Vertical padding added to the rows of a checklist.
pub const CHECKLIST_PADDING: f64 = 12.0;

/// Errors produced when reading a board.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("invalid board JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn default_width() -> f64 {
    DEFAULT_NODE_WIDTH
}

fn default_height() -> f64 {
    DEFAULT_NODE_HEIGHT
}

fn default_font_size() -> f64 {
    DEFAULT_FONT_SIZE
}

/// A single row of a checklist node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    #[serde(default = "new_id")]
    pub id: ElementId,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub checked: bool,
}

impl ChecklistItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            text: text.into(),
            checked: false,
        }
    }

    pub fn placeholder() -> Self {
        Self::new(PLACEHOLDER_ITEM_TEXT)
    }
}

/// Variant tag of a node, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeVariant {
    Text,
    Checklist,
    Status,
}

impl fmt::Display for NodeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NodeVariant::Text => "text",
            NodeVariant::Checklist => "checkbox",
            NodeVariant::Status => "status",
        })
    }
}

/// Variant payload of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeKind {
    Text {
        #[serde(default)]
        text: String,
        #[serde(rename = "fontSize", default = "default_font_size")]
        font_size: f64,
    },
    #[serde(rename = "checkbox")]
    Checklist {
        #[serde(default)]
        items: Vec<ChecklistItem>,
    },
    Status {
        #[serde(default)]
        text: String,
        #[serde(default)]
        color: ColorSpec,
    },
}

impl NodeKind {
    pub fn variant(&self) -> NodeVariant {
        match self {
            NodeKind::Text { .. } => NodeVariant::Text,
            NodeKind::Checklist { .. } => NodeVariant::Checklist,
            NodeKind::Status { .. } => NodeVariant::Status,
        }
    }
}

/// A typed visual element placed on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: ElementId,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default = "default_height")]
    pub height: f64,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl Node {
    /// Create a node from the default template of `variant` with its top-left
    /// corner at `position`.
    pub fn from_template(variant: NodeVariant, position: Point) -> Self {
        let (size, kind) = match variant {
            NodeVariant::Text => (
                Size::new(200.0, 80.0),
                NodeKind::Text {
                    text: "New text".to_string(),
                    font_size: DEFAULT_FONT_SIZE,
                },
            ),
            NodeVariant::Checklist => (
                Size::new(200.0, CHECKLIST_ROW_HEIGHT),
                NodeKind::Checklist {
                    items: vec![ChecklistItem::placeholder()],
                },
            ),
            NodeVariant::Status => (
                Size::new(140.0, 44.0),
                NodeKind::Status {
                    text: "RFR".to_string(),
                    color: ColorSpec::STATUS_DEFAULT,
                },
            ),
        };
        Self {
            id: new_id(),
            x: position.x,
            y: position.y,
            width: size.width,
            height: size.height,
            kind,
        }
    }

    pub fn variant(&self) -> NodeVariant {
        self.kind.variant()
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }

    pub fn center(&self) -> Point {
        self.bounds().center()
    }

    /// Checklist items, empty for other variants.
    pub fn items(&self) -> &[ChecklistItem] {
        match &self.kind {
            NodeKind::Checklist { items } => items,
            _ => &[],
        }
    }

    /// Enforce per-variant invariants after a load.
    fn normalize(&mut self) {
        if !self.width.is_finite() || self.width <= 0.0 {
            self.width = DEFAULT_NODE_WIDTH;
        }
        if !self.height.is_finite() || self.height <= 0.0 {
            self.height = DEFAULT_NODE_HEIGHT;
        }
        if let NodeKind::Checklist { items } = &mut self.kind {
            if items.is_empty() {
                items.push(ChecklistItem::placeholder());
            }
            let mut seen = HashSet::new();
            for item in items.iter_mut() {
                if !seen.insert(item.id.clone()) {
                    item.id = new_id();
                }
            }
        }
    }
}

fn deserialize_label<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let label = Option::<String>::deserialize(deserializer)?;
    Ok(label.filter(|l| !l.is_empty()))
}

fn default_edge_color() -> ColorSpec {
    ColorSpec::EDGE_DEFAULT
}

/// Unset edge colors (`null`, `""`, any non-string) mean the default orange.
fn deserialize_edge_color<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ColorSpec, D::Error> {
    let raw = Value::deserialize(deserializer)?;
    Ok(match raw.as_str() {
        Some(s) if !s.is_empty() => ColorSpec::parse_or_default(s),
        _ => ColorSpec::EDGE_DEFAULT,
    })
}

/// Rewrite node fields written by older clients into the current layout.
///
/// Checklists used to be single-row nodes carrying `text` and `checked`
/// directly; their row becomes item `<id>_0`. Status pills used to keep
/// their caption in `label`.
fn upgrade_legacy_node(value: &mut Value) {
    let Some(node) = value.as_object_mut() else {
        return;
    };
    match node.get("type").and_then(Value::as_str) {
        Some("checkbox") => {
            let has_items = node
                .get("items")
                .and_then(Value::as_array)
                .is_some_and(|items| !items.is_empty());
            if has_items {
                return;
            }
            let Some(id) = node.get("id").and_then(Value::as_str) else {
                return;
            };
            let text = node
                .get("text")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .unwrap_or(PLACEHOLDER_ITEM_TEXT);
            let checked = node.get("checked").and_then(Value::as_bool).unwrap_or(false);
            let item = serde_json::json!({ "id": format!("{id}_0"), "text": text, "checked": checked });
            node.insert("items".to_string(), Value::Array(vec![item]));
        }
        Some("status") => {
            if node.get("text").is_some_and(|t| !t.is_null()) {
                return;
            }
            if let Some(label) = node.get("label").and_then(Value::as_str) {
                let label = label.to_string();
                node.insert("text".to_string(), Value::String(label));
            }
        }
        _ => {}
    }
}

/// A directed connection between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: ElementId,
    pub from_id: ElementId,
    pub to_id: ElementId,
    #[serde(default = "default_edge_color", deserialize_with = "deserialize_edge_color")]
    pub color: ColorSpec,
    #[serde(default, deserialize_with = "deserialize_label")]
    pub label: Option<String>,
    #[serde(default)]
    pub dashed: bool,
    #[serde(default)]
    pub bidirectional: bool,
}

impl Edge {
    pub fn new(from_id: impl Into<ElementId>, to_id: impl Into<ElementId>) -> Self {
        Self {
            id: new_id(),
            from_id: from_id.into(),
            to_id: to_id.into(),
            color: ColorSpec::EDGE_DEFAULT,
            label: None,
            dashed: false,
            bidirectional: false,
        }
    }

    /// Whether this edge joins `a` and `b` in either direction.
    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.from_id == a && self.to_id == b) || (self.from_id == b && self.to_id == a)
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.from_id == node_id || self.to_id == node_id
    }
}

/// Nodes, edges and view: everything that is persisted and replicated.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Board {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub view: View,
}

/// Loosely typed shape a board is first read into.
#[derive(Deserialize)]
struct RawBoard {
    #[serde(default)]
    nodes: Option<Vec<Value>>,
    #[serde(default)]
    edges: Option<Vec<Value>>,
    #[serde(default)]
    view: Option<Value>,
}

impl<'de> Deserialize<'de> for Board {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawBoard::deserialize(deserializer).map(Board::from_raw)
    }
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a board, dropping malformed elements.
    pub fn from_json(json: &str) -> Result<Self, BoardError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a board from an already decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self, BoardError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Serialize to pretty JSON, the format of files and wire payloads.
    pub fn to_json(&self) -> Result<String, BoardError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn from_raw(raw: RawBoard) -> Self {
        let mut node_ids = HashSet::new();
        let mut nodes = Vec::new();
        for mut value in raw.nodes.unwrap_or_default() {
            upgrade_legacy_node(&mut value);
            match serde_json::from_value::<Node>(value) {
                Ok(mut node) => {
                    if !node_ids.insert(node.id.clone()) {
                        log::warn!("Dropping node with duplicate id {}", node.id);
                        continue;
                    }
                    node.normalize();
                    nodes.push(node);
                }
                Err(e) => log::warn!("Dropping unreadable node: {e}"),
            }
        }

        let mut edge_ids = HashSet::new();
        let mut edges = Vec::new();
        for value in raw.edges.unwrap_or_default() {
            match serde_json::from_value::<Edge>(value) {
                Ok(edge) => {
                    if !edge_ids.insert(edge.id.clone()) {
                        log::warn!("Dropping edge with duplicate id {}", edge.id);
                        continue;
                    }
                    edges.push(edge);
                }
                Err(e) => log::warn!("Dropping unreadable edge: {e}"),
            }
        }

        let view = match raw.view {
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                log::warn!("Ignoring unreadable view: {e}");
                View::default()
            }),
            None => View::default(),
        };

        Self { nodes, edges, view }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn edge_mut(&mut self, id: &str) -> Option<&mut Edge> {
        self.edges.iter_mut().find(|e| e.id == id)
    }

    /// The edge going exactly from `from` to `to`, if any.
    pub fn edge_from_to(&self, from: &str, to: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.from_id == from && e.to_id == to)
    }

    /// An edge joining `a` and `b` in either direction.
    pub fn edge_between(&self, a: &str, b: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.connects(a, b))
    }

    /// Edges whose endpoints both exist.
    pub fn resolved_edges(&self) -> impl Iterator<Item = (&Edge, &Node, &Node)> {
        self.edges.iter().filter_map(|edge| {
            let from = self.node(&edge.from_id)?;
            let to = self.node(&edge.to_id)?;
            Some((edge, from, to))
        })
    }

    /// Number of edges referencing a missing node.
    pub fn dangling_edge_count(&self) -> usize {
        self.edges
            .iter()
            .filter(|e| !self.contains_node(&e.from_id) || !self.contains_node(&e.to_id))
            .count()
    }

    /// Union of all node rectangles, or `None` for an empty board.
    pub fn content_bounds(&self) -> Option<Rect> {
        self.nodes
            .iter()
            .map(Node::bounds)
            .reduce(|acc, r| acc.union(r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::PaletteColor;

    const SAMPLE: &str = r##"{
        "nodes": [
            {"id": "a", "type": "text", "x": 10, "y": 20, "width": 200, "height": 80, "text": "Hello", "fontSize": 18},
            {"id": "b", "type": "checkbox", "x": 300, "y": 20, "width": 200, "height": 76,
             "items": [{"id": "i1", "text": "One", "checked": true}, {"id": "i2", "text": "Two", "checked": false}]},
            {"id": "c", "type": "status", "x": 0, "y": 200, "text": "RFR", "color": "#16a34a"}
        ],
        "edges": [
            {"id": "e1", "fromId": "a", "toId": "b", "color": "red", "label": "next", "dashed": true, "bidirectional": false}
        ],
        "view": {"panX": 12, "panY": -4, "zoom": 1.25}
    }"##;

    #[test]
    fn test_parse_sample() {
        let board = Board::from_json(SAMPLE).unwrap();
        assert_eq!(board.nodes.len(), 3);
        assert_eq!(board.edges.len(), 1);

        let status = board.node("c").unwrap();
        assert_eq!(status.width, DEFAULT_NODE_WIDTH);
        assert_eq!(status.height, DEFAULT_NODE_HEIGHT);
        assert_eq!(status.variant(), NodeVariant::Status);

        let edge = board.edge("e1").unwrap();
        assert_eq!(edge.color, ColorSpec::Named(PaletteColor::Red));
        assert_eq!(edge.label.as_deref(), Some("next"));
        assert!(edge.dashed);
        assert_eq!(board.view.zoom(), 1.25);
    }

    #[test]
    fn test_export_import_idempotent() {
        let board = Board::from_json(SAMPLE).unwrap();
        let exported = board.to_json().unwrap();
        let reimported = Board::from_json(&exported).unwrap();
        assert_eq!(board, reimported);
        assert_eq!(exported, reimported.to_json().unwrap());
    }

    #[test]
    fn test_unknown_variant_dropped() {
        let json = r#"{"nodes": [
            {"id": "a", "type": "text", "text": "keep"},
            {"id": "b", "type": "sticker", "emoji": "x"},
            {"type": "text"}
        ]}"#;
        let board = Board::from_json(json).unwrap();
        assert_eq!(board.nodes.len(), 1);
        assert_eq!(board.nodes[0].id, "a");
        assert!(board.edges.is_empty());
        assert_eq!(board.view, View::default());
    }

    #[test]
    fn test_empty_checklist_gets_placeholder() {
        let json = r#"{"nodes": [{"id": "a", "type": "checkbox", "items": []}]}"#;
        let board = Board::from_json(json).unwrap();
        let items = board.node("a").unwrap().items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, PLACEHOLDER_ITEM_TEXT);
        assert!(!items[0].checked);
    }

    #[test]
    fn test_legacy_single_row_checklist() {
        let json = r#"{"nodes": [
            {"id": "n", "type": "checkbox", "x": 0, "y": 0, "text": "Ship it", "checked": true},
            {"id": "m", "type": "checkbox", "items": [], "text": "Old row"},
            {"id": "k", "type": "checkbox"}
        ]}"#;
        let board = Board::from_json(json).unwrap();

        let items = board.node("n").unwrap().items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "n_0");
        assert_eq!(items[0].text, "Ship it");
        assert!(items[0].checked);

        assert_eq!(board.node("m").unwrap().items()[0].text, "Old row");

        let items = board.node("k").unwrap().items();
        assert_eq!(items[0].id, "k_0");
        assert_eq!(items[0].text, PLACEHOLDER_ITEM_TEXT);
        assert!(!items[0].checked);
    }

    #[test]
    fn test_legacy_status_label() {
        let json = r#"{"nodes": [
            {"id": "s", "type": "status", "label": "WFM", "color": null},
            {"id": "t", "type": "status", "text": "RFR", "label": "WFM"},
            {"id": "u", "type": "status", "text": null, "label": "LGTM", "color": 3}
        ]}"#;
        let board = Board::from_json(json).unwrap();
        assert_eq!(board.nodes.len(), 3);

        let status_of = |id: &str| match &board.node(id).unwrap().kind {
            NodeKind::Status { text, color } => (text.clone(), color.clone()),
            other => panic!("expected status, got {other:?}"),
        };
        assert_eq!(status_of("s"), ("WFM".to_string(), ColorSpec::STATUS_DEFAULT));
        assert_eq!(status_of("t").0, "RFR");
        assert_eq!(status_of("u"), ("LGTM".to_string(), ColorSpec::STATUS_DEFAULT));
    }

    #[test]
    fn test_unset_edge_color_is_orange() {
        let json = r##"{"edges": [
            {"id": "e1", "fromId": "a", "toId": "b", "color": null},
            {"id": "e2", "fromId": "a", "toId": "b", "color": ""},
            {"id": "e3", "fromId": "a", "toId": "b"},
            {"id": "e4", "fromId": "a", "toId": "b", "color": "#abc"}
        ]}"##;
        let board = Board::from_json(json).unwrap();
        assert_eq!(board.edges.len(), 4);
        for id in ["e1", "e2", "e3"] {
            assert_eq!(board.edge(id).unwrap().color, ColorSpec::EDGE_DEFAULT, "{id}");
        }
        assert_eq!(board.edge("e4").unwrap().color.to_string(), "#abc");
    }

    #[test]
    fn test_duplicate_item_ids_regenerated() {
        let json = r#"{"nodes": [{"id": "a", "type": "checkbox", "items": [
            {"id": "x", "text": "1"}, {"id": "x", "text": "2"}
        ]}]}"#;
        let board = Board::from_json(json).unwrap();
        let items = board.node("a").unwrap().items();
        assert_ne!(items[0].id, items[1].id);
        assert_eq!(items[0].id, "x");
    }

    #[test]
    fn test_duplicate_node_ids_dropped() {
        let json = r#"{"nodes": [
            {"id": "a", "type": "text", "text": "first"},
            {"id": "a", "type": "text", "text": "second"}
        ]}"#;
        let board = Board::from_json(json).unwrap();
        assert_eq!(board.nodes.len(), 1);
        assert!(matches!(&board.nodes[0].kind, NodeKind::Text { text, .. } if text == "first"));
    }

    #[test]
    fn test_dangling_edges_tolerated() {
        let json = r#"{"nodes": [{"id": "a", "type": "text"}],
            "edges": [{"id": "e", "fromId": "a", "toId": "ghost"}]}"#;
        let board = Board::from_json(json).unwrap();
        assert_eq!(board.edges.len(), 1);
        assert_eq!(board.dangling_edge_count(), 1);
        assert_eq!(board.resolved_edges().count(), 0);
    }

    #[test]
    fn test_null_collections_and_bad_view() {
        let json = r#"{"nodes": null, "edges": null, "view": "wide"}"#;
        let board = Board::from_json(json).unwrap();
        assert_eq!(board, Board::default());
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(Board::from_json("[1, 2, 3]").is_err());
        assert!(Board::from_json("{not json").is_err());
    }

    #[test]
    fn test_templates() {
        let text = Node::from_template(NodeVariant::Text, Point::new(5.0, 6.0));
        assert_eq!((text.width, text.height), (200.0, 80.0));
        assert_eq!(text.origin(), Point::new(5.0, 6.0));

        let checklist = Node::from_template(NodeVariant::Checklist, Point::ZERO);
        assert_eq!(checklist.items().len(), 1);
        assert_eq!(checklist.height, CHECKLIST_ROW_HEIGHT);

        let status = Node::from_template(NodeVariant::Status, Point::ZERO);
        assert!(matches!(status.kind, NodeKind::Status { ref text, .. } if text == "RFR"));
    }

    #[test]
    fn test_edge_lookup() {
        let board = Board::from_json(SAMPLE).unwrap();
        assert!(board.edge_from_to("a", "b").is_some());
        assert!(board.edge_from_to("b", "a").is_none());
        assert!(board.edge_between("b", "a").is_some());
    }

    #[test]
    fn test_content_bounds() {
        let board = Board::from_json(SAMPLE).unwrap();
        let bounds = board.content_bounds().unwrap();
        assert_eq!(bounds, Rect::new(0.0, 20.0, 500.0, 240.0));
        assert!(Board::new().content_bounds().is_none());
    }
}

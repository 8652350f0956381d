//! Flowboard Core Library
//!
//! Platform-agnostic data model, geometry, history and sync logic for the
//! Flowboard diagram editor.

pub mod board;
pub mod canvas;
pub mod collaboration;
pub mod color;
pub mod geometry;
pub mod history;
pub mod selection;
pub mod session;
pub mod snap;
pub mod storage;
pub mod sync;
pub mod view;

pub use board::{Board, BoardError, ChecklistItem, Edge, ElementId, Node, NodeKind, NodeVariant};
pub use canvas::{Canvas, CanvasError, EdgeUpdate, ItemUpdate, NodeUpdate};
pub use collaboration::{CollabEvent, CollaborationManager};
pub use color::{ColorSpec, HexColor, PaletteColor};
pub use geometry::{EdgeGeometry, anchor_points, edge_at_point, node_at_point};
pub use history::History;
pub use selection::{ResizeHandle, Selection};
pub use session::{SessionConfig, SessionError, SessionEvent, SyncSession};
pub use snap::{GRID_SIZE, snap_to_grid};
pub use storage::{AutoSaveManager, BoardStore, FileStore, HttpStore, MemoryStore, StorageError};
pub use sync::{ConnectionState, NativeWebSocket, PeerInfo, ServerMessage, SyncEvent, Transport};
pub use view::View;

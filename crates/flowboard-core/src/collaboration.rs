//! Client side of relay synchronization.
//!
//! The relay holds the authoritative board and replicates it whole: the last
//! accepted write wins and there is no merging. This manager tracks
//! connection and presence state, decides whether an incoming board replaces
//! the local one, and queues outgoing frames.

use crate::canvas::Canvas;
use crate::sync::{
    ClientMessage, ConnectionState, PeerInfo, ServerMessage, SyncEvent, normalize_display_name,
};
use crate::board::Board;
use std::time::{Duration, Instant};

/// Delay between reconnection attempts.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(3);

/// What handling a sync event did.
#[derive(Debug, Clone, PartialEq)]
pub enum CollabEvent {
    Connected,
    /// Connection lost; a reconnect is scheduled.
    Disconnected,
    /// The relay assigned this client an id.
    Joined { peer_id: String },
    PresenceChanged,
    /// The local board was replaced by the relay's.
    BoardReplaced,
    /// An incoming board was ignored because a local write is pending.
    BoardSkipped,
    Error(String),
}

/// Manages connection, presence and replication state for one client.
pub struct CollaborationManager {
    state: ConnectionState,
    /// Id assigned by the relay in `init`.
    peer_id: Option<String>,
    /// Current roster, in join order.
    users: Vec<PeerInfo>,
    display_name: String,
    /// Pending outgoing messages (JSON strings).
    outgoing: Vec<String>,
    reconnect_interval: Duration,
    reconnect_at: Option<Instant>,
}

impl CollaborationManager {
    pub fn new(display_name: &str) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            peer_id: None,
            users: Vec::new(),
            display_name: normalize_display_name(display_name),
            outgoing: Vec::new(),
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            reconnect_at: None,
        }
    }

    pub fn set_reconnect_interval(&mut self, interval: Duration) {
        self.reconnect_interval = interval;
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn peer_id(&self) -> Option<&str> {
        self.peer_id.as_deref()
    }

    pub fn users(&self) -> &[PeerInfo] {
        &self.users
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Change the display name; announced immediately when connected.
    pub fn set_display_name(&mut self, name: &str) {
        self.display_name = normalize_display_name(name);
        if self.state == ConnectionState::Connected {
            self.queue_hello();
        }
    }

    fn queue_hello(&mut self) {
        match ClientMessage::hello(&self.display_name).to_json() {
            Ok(json) => self.outgoing.push(json),
            Err(e) => log::error!("Failed to encode hello: {}", e),
        }
    }

    /// Take all pending outgoing messages.
    pub fn take_outgoing(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outgoing)
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    /// A connection attempt has started.
    pub fn begin_connect(&mut self) {
        self.state = ConnectionState::Connecting;
        self.reconnect_at = None;
    }

    /// Schedule a reconnect after a lost or failed connection.
    pub fn schedule_reconnect(&mut self, now: Instant) {
        self.state = ConnectionState::Reconnecting;
        self.peer_id = None;
        self.users.clear();
        self.reconnect_at = Some(now + self.reconnect_interval);
    }

    /// Whether a scheduled reconnect is due.
    pub fn reconnect_due(&self, now: Instant) -> bool {
        self.state == ConnectionState::Reconnecting && self.reconnect_at.is_some_and(|at| now >= at)
    }

    /// Stop syncing: no reconnects, no presence.
    pub fn shutdown(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.peer_id = None;
        self.users.clear();
        self.reconnect_at = None;
        self.outgoing.clear();
    }

    /// Apply one transport event. `write_pending` is whether a local
    /// debounced write has not gone out yet.
    pub fn handle_event(
        &mut self,
        event: SyncEvent,
        canvas: &mut Canvas,
        write_pending: bool,
        now: Instant,
    ) -> Option<CollabEvent> {
        match event {
            SyncEvent::Connected => {
                log::info!("Connected to relay");
                self.state = ConnectionState::Connected;
                self.reconnect_at = None;
                self.queue_hello();
                Some(CollabEvent::Connected)
            }
            SyncEvent::Disconnected => {
                if self.state == ConnectionState::Disconnected {
                    return None;
                }
                log::info!("Disconnected from relay; retrying in {:?}", self.reconnect_interval);
                self.schedule_reconnect(now);
                Some(CollabEvent::Disconnected)
            }
            SyncEvent::Error { message } => {
                log::warn!("Sync error: {}", message);
                Some(CollabEvent::Error(message))
            }
            SyncEvent::Message(msg) => self.handle_message(msg, canvas, write_pending),
        }
    }

    fn handle_message(
        &mut self,
        msg: ServerMessage,
        canvas: &mut Canvas,
        write_pending: bool,
    ) -> Option<CollabEvent> {
        match msg {
            ServerMessage::Init { your_id, users, board } => {
                log::info!("Joined relay as {} with {} peer(s)", your_id, users.len());
                self.peer_id = Some(your_id.clone());
                self.users = users;
                self.apply_board(board, canvas, write_pending);
                Some(CollabEvent::Joined { peer_id: your_id })
            }
            ServerMessage::Presence { users } => {
                self.users = users;
                Some(CollabEvent::PresenceChanged)
            }
            ServerMessage::Board(board) => self.apply_board(board, canvas, write_pending),
        }
    }

    fn apply_board(&self, board: Board, canvas: &mut Canvas, write_pending: bool) -> Option<CollabEvent> {
        if write_pending {
            log::debug!("Ignoring relay board: local write pending");
            return Some(CollabEvent::BoardSkipped);
        }
        if &board == canvas.board() {
            return None;
        }
        canvas.apply_remote_board(board);
        Some(CollabEvent::BoardReplaced)
    }
}

//! Editor session: one canvas kept in step with a durable store and, when
//! configured, a live relay.
//!
//! The session is driven by [`SyncSession::tick`] from the host's event
//! loop. Timers are deadlines compared against the `now` passed in, and
//! durable writes run on a [`BackgroundWriter`], so a tick never blocks and
//! always acts on the latest board.

use crate::board::Board;
use crate::canvas::Canvas;
use crate::collaboration::{CollabEvent, CollaborationManager, DEFAULT_RECONNECT_INTERVAL};
use crate::storage::{AutoSaveManager, BackgroundWriter, BoardStore, DEFAULT_DEBOUNCE, StorageError};
use crate::sync::{ConnectionState, NativeWebSocket, PeerInfo, SyncError, Transport, websocket_url};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

/// Errors from opening or flushing a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),
}

/// Client-side session settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// HTTP base URL of the relay; `None` keeps the session offline.
    pub relay_url: Option<String>,
    pub display_name: String,
    /// Quiet period before a local change is written.
    pub debounce: Duration,
    /// Delay between reconnection attempts.
    pub reconnect_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            relay_url: None,
            display_name: String::new(),
            debounce: DEFAULT_DEBOUNCE,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
        }
    }
}

/// Something the host may want to surface.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Sync(CollabEvent),
    /// A handed-off write reached the store.
    Saved,
    /// The pending write failed; local edits stay in memory.
    SaveFailed(String),
}

/// A canvas plus its persistence and replication machinery.
pub struct SyncSession<S: BoardStore, T: Transport = NativeWebSocket> {
    canvas: Canvas,
    autosave: AutoSaveManager<S>,
    writer: BackgroundWriter,
    collab: CollaborationManager,
    transport: T,
    ws_url: Option<Url>,
    /// Canvas revision last seen by `tick`.
    seen_revision: u64,
}

impl<S: BoardStore + 'static> SyncSession<S, NativeWebSocket> {
    /// Session over the native WebSocket client.
    pub fn native(config: SessionConfig, storage: Arc<S>) -> Result<Self, SessionError> {
        Self::new(config, storage, NativeWebSocket::new())
    }
}

impl<S: BoardStore + 'static, T: Transport> SyncSession<S, T> {
    pub fn new(config: SessionConfig, storage: Arc<S>, transport: T) -> Result<Self, SessionError> {
        let ws_url = config.relay_url.as_deref().map(websocket_url).transpose()?;

        let writer = BackgroundWriter::spawn(storage.clone());
        let mut autosave = AutoSaveManager::new(storage);
        autosave.set_debounce(config.debounce);
        let mut collab = CollaborationManager::new(&config.display_name);
        collab.set_reconnect_interval(config.reconnect_interval);

        Ok(Self {
            canvas: Canvas::new(),
            autosave,
            writer,
            collab,
            transport,
            ws_url,
            seen_revision: 0,
        })
    }

    /// Load the stored board (an absent one starts empty) and start
    /// connecting to the relay, if any.
    pub fn open(&mut self, now: Instant) -> Result<(), SessionError> {
        let board = match self.autosave.load() {
            Ok(board) => board,
            Err(StorageError::NotFound(what)) => {
                log::info!("No stored board ({}); starting empty", what);
                Board::new()
            }
            Err(e) => return Err(e.into()),
        };
        self.canvas.load_board(board);
        self.seen_revision = self.canvas.revision();
        self.connect(now);
        Ok(())
    }

    fn connect(&mut self, now: Instant) {
        let Some(url) = self.ws_url.as_ref() else {
            return;
        };
        self.collab.begin_connect();
        if let Err(e) = self.transport.connect(url.as_str()) {
            log::warn!("Relay connect failed: {}", e);
            self.collab.schedule_reconnect(now);
        }
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    /// Mutable access for edits; changes are picked up by the next tick.
    pub fn canvas_mut(&mut self) -> &mut Canvas {
        &mut self.canvas
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.collab.state()
    }

    pub fn peer_id(&self) -> Option<&str> {
        self.collab.peer_id()
    }

    pub fn users(&self) -> &[PeerInfo] {
        self.collab.users()
    }

    pub fn set_display_name(&mut self, name: &str) {
        self.collab.set_display_name(name);
    }

    /// Whether a local change is waiting for its debounce or is being
    /// written.
    pub fn is_write_pending(&self) -> bool {
        self.autosave.is_pending() || self.writer.is_busy()
    }

    pub fn autosave(&self) -> &AutoSaveManager<S> {
        &self.autosave
    }

    /// Advance timers and drain the relay connection.
    pub fn tick(&mut self, now: Instant) -> Vec<SessionEvent> {
        let mut events = Vec::new();

        for result in self.writer.poll() {
            events.push(self.record_write(now, result));
        }

        let revision = self.canvas.revision();
        if revision != self.seen_revision {
            self.seen_revision = revision;
            self.autosave.mark_dirty(now);
        }

        for event in self.transport.poll_events() {
            let pending = self.is_write_pending();
            if let Some(ev) = self.collab.handle_event(event, &mut self.canvas, pending, now) {
                events.push(SessionEvent::Sync(ev));
            }
        }
        self.seen_revision = self.canvas.revision();

        for msg in self.collab.take_outgoing() {
            if let Err(e) = self.transport.send(&msg) {
                log::warn!("Failed to send to relay: {}", e);
            }
        }

        if self.collab.reconnect_due(now) {
            log::info!("Reconnecting to relay");
            self.connect(now);
        }

        if self.autosave.take_due(now) {
            self.writer.submit(self.canvas.board().clone());
        }

        events
    }

    fn record_write(&mut self, now: Instant, result: Result<(), StorageError>) -> SessionEvent {
        self.autosave.finish_write(now, &result);
        match result {
            Ok(()) => SessionEvent::Saved,
            Err(e) => {
                log::warn!("Board write failed: {}", e);
                SessionEvent::SaveFailed(e.to_string())
            }
        }
    }

    /// Wait for writes in flight, then write any unsaved change now.
    pub fn flush(&mut self, now: Instant) -> Result<bool, SessionError> {
        let mut landed = false;
        for result in self.writer.wait_idle() {
            landed |= self.record_write(now, result) == SessionEvent::Saved;
        }
        if self.canvas.revision() != self.seen_revision {
            self.seen_revision = self.canvas.revision();
            self.autosave.mark_dirty(now);
        }
        if !self.autosave.is_dirty() {
            return Ok(landed);
        }
        self.autosave.save(now, self.canvas.board())?;
        Ok(true)
    }

    /// Flush and disconnect.
    pub fn close(&mut self, now: Instant) -> Result<(), SessionError> {
        let flushed = self.flush(now);
        self.writer.shutdown();
        self.collab.shutdown();
        self.transport.disconnect();
        flushed.map(|_| ())
    }
}

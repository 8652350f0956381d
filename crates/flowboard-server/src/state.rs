//! Shared relay state: the authoritative board, the roster and the
//! fan-out channel.

use crate::config::ServerConfig;
use crate::error::RelayError;
use crate::protocol::{DEFAULT_DISPLAY_NAME, PeerInfo, ServerMessage, normalize_name};
use dashmap::DashMap;
use serde::de::IgnoredAny;
use serde_json::value::RawValue;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Board served before anything has been written.
pub const DEFAULT_BOARD: &str = r#"{"nodes":[],"edges":[],"view":{"panX":80,"panY":80,"zoom":1}}"#;

/// A text frame fanned out to every connection.
pub type Frame = Arc<str>;

struct Peer {
    /// Join order
    seq: u64,
    name: String,
}

/// Shared application state
pub struct AppState {
    /// Current board JSON, exactly as last accepted. Held across
    /// validate, persist, swap and broadcast so writes are serialized.
    board: Mutex<Frame>,
    board_path: PathBuf,
    peers: DashMap<String, Peer>,
    next_seq: AtomicU64,
    tx: broadcast::Sender<Frame>,
}

impl AppState {
    /// State holding the default board.
    pub fn new(config: &ServerConfig) -> Self {
        Self::with_board(config, Arc::from(DEFAULT_BOARD))
    }

    fn with_board(config: &ServerConfig, board: Frame) -> Self {
        let (tx, _) = broadcast::channel(config.broadcast_capacity.max(1));
        Self {
            board: Mutex::new(board),
            board_path: config.board_path.clone(),
            peers: DashMap::new(),
            next_seq: AtomicU64::new(0),
            tx,
        }
    }

    /// State holding the board file's content if it exists and is valid
    /// JSON, else the default board.
    pub async fn load(config: &ServerConfig) -> Self {
        let path = &config.board_path;
        match tokio::fs::read_to_string(path).await {
            Ok(data) if data.trim().is_empty() => {}
            Ok(data) => match serde_json::from_str::<IgnoredAny>(&data) {
                Ok(_) => {
                    info!("Loaded board from {}", path.display());
                    return Self::with_board(config, Arc::from(data));
                }
                Err(e) => warn!("Board load: {} is not valid JSON: {}", path.display(), e),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No board file at {}", path.display());
            }
            Err(e) => warn!("Board load: {}", e),
        }
        Self::new(config)
    }

    pub fn board_path(&self) -> &Path {
        &self.board_path
    }

    /// Current board JSON.
    pub async fn board(&self) -> Frame {
        self.board.lock().await.clone()
    }

    /// Validate, persist, swap and broadcast a new board.
    pub async fn write_board(&self, body: &[u8]) -> Result<(), RelayError> {
        let text = std::str::from_utf8(body).map_err(|_| RelayError::InvalidJson)?;
        serde_json::from_str::<IgnoredAny>(text).map_err(|_| RelayError::InvalidJson)?;

        let mut board = self.board.lock().await;
        persist(&self.board_path, text).await?;
        *board = Arc::from(text);
        let receivers = self.tx.send(board.clone()).unwrap_or(0);
        debug!("Board accepted ({} bytes), sent to {} peer(s)", text.len(), receivers);
        Ok(())
    }

    /// Subscribe to broadcast frames.
    pub fn subscribe(&self) -> broadcast::Receiver<Frame> {
        self.tx.subscribe()
    }

    /// Add a peer to the roster as `Anonymous`; returns its id.
    pub fn join(&self) -> String {
        let id = Uuid::new_v4().to_string();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.peers.insert(
            id.clone(),
            Peer {
                seq,
                name: DEFAULT_DISPLAY_NAME.to_string(),
            },
        );
        id
    }

    pub fn rename(&self, id: &str, name: &str) {
        if let Some(mut peer) = self.peers.get_mut(id) {
            peer.name = normalize_name(name);
        }
    }

    pub fn leave(&self, id: &str) {
        self.peers.remove(id);
    }

    /// Roster in join order.
    pub fn roster(&self) -> Vec<PeerInfo> {
        let mut peers: Vec<(u64, PeerInfo)> = self
            .peers
            .iter()
            .map(|entry| {
                (
                    entry.seq,
                    PeerInfo {
                        id: entry.key().clone(),
                        name: entry.name.clone(),
                    },
                )
            })
            .collect();
        peers.sort_by_key(|(seq, _)| *seq);
        peers.into_iter().map(|(_, info)| info).collect()
    }

    /// The `init` frame for peer `id`.
    pub async fn init_frame(&self, id: &str) -> Result<String, RelayError> {
        let board = RawValue::from_string(self.board().await.to_string())?;
        let msg = ServerMessage::Init {
            your_id: id.to_string(),
            users: self.roster(),
            board,
        };
        Ok(serde_json::to_string(&msg)?)
    }

    /// Send the roster to everyone.
    pub fn broadcast_presence(&self) {
        let msg = ServerMessage::Presence { users: self.roster() };
        match serde_json::to_string(&msg) {
            Ok(json) => {
                let _ = self.tx.send(Arc::from(json));
            }
            Err(e) => warn!("Failed to encode presence: {}", e),
        }
    }
}

/// Write `text` next to `path` then rename over it.
async fn persist(path: &Path, text: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, text).await?;
    tokio::fs::rename(&tmp, path).await
}

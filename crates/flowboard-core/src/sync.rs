//! Relay wire protocol and WebSocket client.
//!
//! Frames are JSON text. The client sends `hello`; the relay sends `init`
//! once, `presence` whenever the roster changes, and a bare board after
//! every accepted write.

use crate::board::Board;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// Name used for peers that have not introduced themselves.
pub const DEFAULT_DISPLAY_NAME: &str = "Anonymous";
/// Maximum display name length, in characters.
pub const MAX_DISPLAY_NAME_LEN: usize = 32;
/// Path of the WebSocket endpoint on the relay.
pub const WS_PATH: &str = "/ws";

/// Errors from the sync layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    #[error("invalid relay URL: {0}")]
    InvalidUrl(String),
    #[error("already connected")]
    AlreadyConnected,
    #[error("not connected")]
    NotConnected,
    #[error("send failed: {0}")]
    Send(String),
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
}

/// Trim, truncate and default a display name.
pub fn normalize_display_name(name: &str) -> String {
    let name: String = name.trim().chars().take(MAX_DISPLAY_NAME_LEN).collect();
    if name.is_empty() {
        DEFAULT_DISPLAY_NAME.to_string()
    } else {
        name
    }
}

/// Derive the relay's WebSocket URL from its HTTP base URL.
pub fn websocket_url(base_url: &str) -> Result<Url, SyncError> {
    let mut url = Url::parse(base_url).map_err(|e| SyncError::InvalidUrl(format!("{}: {}", base_url, e)))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(SyncError::InvalidUrl(format!("unsupported scheme {}", other))),
    };
    url.set_scheme(scheme)
        .map_err(|_| SyncError::InvalidUrl(base_url.to_string()))?;
    url.set_path(WS_PATH);
    url.set_query(None);
    Ok(url)
}

/// Messages sent to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Introduce this peer by display name.
    Hello { name: String },
}

impl ClientMessage {
    pub fn hello(name: &str) -> Self {
        ClientMessage::Hello {
            name: normalize_display_name(name),
        }
    }

    pub fn to_json(&self) -> Result<String, SyncError> {
        serde_json::to_string(self).map_err(|e| SyncError::MalformedFrame(e.to_string()))
    }
}

/// A connected peer as listed in the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub id: String,
    pub name: String,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TaggedMessage {
    Init {
        #[serde(rename = "yourId")]
        your_id: String,
        #[serde(default)]
        users: Vec<PeerInfo>,
        board: Board,
    },
    Presence {
        #[serde(default)]
        users: Vec<PeerInfo>,
    },
}

/// Messages received from the relay.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// First frame after connecting.
    Init {
        your_id: String,
        users: Vec<PeerInfo>,
        board: Board,
    },
    /// Roster snapshot.
    Presence { users: Vec<PeerInfo> },
    /// The authoritative board after an accepted write.
    Board(Board),
}

impl ServerMessage {
    /// Parse a text frame. Frames with a `type` field are protocol messages;
    /// anything else is read as a bare board.
    pub fn parse(text: &str) -> Result<Self, SyncError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| SyncError::MalformedFrame(e.to_string()))?;
        if value.get("type").is_some() {
            let tagged: TaggedMessage =
                serde_json::from_value(value).map_err(|e| SyncError::MalformedFrame(e.to_string()))?;
            return Ok(match tagged {
                TaggedMessage::Init { your_id, users, board } => ServerMessage::Init { your_id, users, board },
                TaggedMessage::Presence { users } => ServerMessage::Presence { users },
            });
        }
        Board::from_value(value)
            .map(ServerMessage::Board)
            .map_err(|e| SyncError::MalformedFrame(e.to_string()))
    }
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Connection lost; a retry is scheduled.
    Reconnecting,
}

/// Events from the WebSocket client
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Connected to the relay
    Connected,
    /// Disconnected from the relay (or the connection attempt failed)
    Disconnected,
    /// Received a protocol message
    Message(ServerMessage),
    /// Error occurred
    Error { message: String },
}

/// A bidirectional text-frame connection to the relay.
///
/// Implementations never block: incoming events are buffered and handed out
/// by [`Transport::poll_events`].
pub trait Transport {
    /// Start connecting to a `ws://` or `wss://` URL.
    fn connect(&mut self, url: &str) -> Result<(), SyncError>;

    /// Close the connection, if any.
    fn disconnect(&mut self);

    /// Queue a text frame.
    fn send(&self, msg: &str) -> Result<(), SyncError>;

    /// Drain pending events (non-blocking).
    fn poll_events(&mut self) -> Vec<SyncEvent>;

    fn state(&self) -> ConnectionState;

    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

mod native_client {
    use super::*;
    use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tungstenite::{connect, Message};

    /// Commands sent to the WebSocket thread.
    enum WsCommand {
        Send(String),
        Close,
    }

    fn preview(text: &str) -> &str {
        let end = text
            .char_indices()
            .nth(100)
            .map(|(i, _)| i)
            .unwrap_or(text.len());
        &text[..end]
    }

    /// WebSocket client for native platforms.
    ///
    /// Uses a background thread for non-blocking operation.
    pub struct NativeWebSocket {
        state: ConnectionState,
        /// Channel to send commands to the WebSocket thread.
        cmd_tx: Option<Sender<WsCommand>>,
        /// Channel to receive events from the WebSocket thread.
        event_rx: Option<Receiver<SyncEvent>>,
        /// Handle to the WebSocket thread.
        _thread: Option<JoinHandle<()>>,
    }

    impl NativeWebSocket {
        /// Create a new disconnected WebSocket client.
        pub fn new() -> Self {
            Self {
                state: ConnectionState::Disconnected,
                cmd_tx: None,
                event_rx: None,
                _thread: None,
            }
        }
    }

    fn run_socket(url: String, cmd_rx: Receiver<WsCommand>, event_tx: Sender<SyncEvent>) {
        log::info!("WebSocket thread: connecting to {}", url);

        let (mut socket, response) = match connect(&url) {
            Ok(pair) => pair,
            Err(e) => {
                log::warn!("WebSocket connection failed: {}", e);
                let _ = event_tx.send(SyncEvent::Error {
                    message: format!("Connection failed: {}", e),
                });
                let _ = event_tx.send(SyncEvent::Disconnected);
                return;
            }
        };
        log::info!("WebSocket connected, status: {}", response.status());
        let _ = event_tx.send(SyncEvent::Connected);

        // Short read timeout so the loop can service outgoing commands
        match socket.get_mut() {
            tungstenite::stream::MaybeTlsStream::Plain(tcp) => {
                let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
                let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
            }
            #[allow(unreachable_patterns)]
            _ => log::debug!("Non-plain stream - using default timeout handling"),
        }

        loop {
            match cmd_rx.try_recv() {
                Ok(WsCommand::Send(msg)) => {
                    log::debug!("WebSocket sending: {}", preview(&msg));
                    if let Err(e) = socket.send(Message::Text(msg)) {
                        log::error!("WebSocket send error: {}", e);
                        break;
                    }
                }
                Ok(WsCommand::Close) => {
                    log::info!("WebSocket close requested");
                    let _ = socket.close(None);
                    break;
                }
                Err(TryRecvError::Disconnected) => {
                    log::info!("WebSocket command channel disconnected");
                    break;
                }
                Err(TryRecvError::Empty) => {}
            }

            match socket.read() {
                Ok(Message::Text(txt)) => {
                    log::debug!("WebSocket received: {}", preview(&txt));
                    match ServerMessage::parse(&txt) {
                        Ok(msg) => {
                            let _ = event_tx.send(SyncEvent::Message(msg));
                        }
                        Err(e) => log::warn!("Skipping frame: {}", e),
                    }
                }
                Ok(Message::Ping(data)) => {
                    let _ = socket.send(Message::Pong(data));
                }
                Ok(Message::Close(_)) => {
                    log::info!("WebSocket received close frame");
                    break;
                }
                Ok(_) => {}
                Err(tungstenite::Error::Io(ref e))
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(e) => {
                    log::error!("WebSocket read error: {}", e);
                    break;
                }
            }
        }

        log::info!("WebSocket thread exiting");
        let _ = event_tx.send(SyncEvent::Disconnected);
    }

    impl Transport for NativeWebSocket {
        fn connect(&mut self, url: &str) -> Result<(), SyncError> {
            if self.cmd_tx.is_some() {
                return Err(SyncError::AlreadyConnected);
            }

            let parsed = Url::parse(url).map_err(|e| SyncError::InvalidUrl(e.to_string()))?;
            if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
                return Err(SyncError::InvalidUrl(format!(
                    "Invalid WebSocket URL scheme: {}",
                    parsed.scheme()
                )));
            }

            self.state = ConnectionState::Connecting;
            let (cmd_tx, cmd_rx) = channel::<WsCommand>();
            let (event_tx, event_rx) = channel::<SyncEvent>();
            let url = url.to_string();
            let handle = thread::spawn(move || run_socket(url, cmd_rx, event_tx));

            self.cmd_tx = Some(cmd_tx);
            self.event_rx = Some(event_rx);
            self._thread = Some(handle);
            Ok(())
        }

        fn disconnect(&mut self) {
            if let Some(tx) = self.cmd_tx.take() {
                let _ = tx.send(WsCommand::Close);
            }
            self.event_rx = None;
            self._thread = None;
            self.state = ConnectionState::Disconnected;
        }

        fn send(&self, msg: &str) -> Result<(), SyncError> {
            let tx = self.cmd_tx.as_ref().ok_or(SyncError::NotConnected)?;
            tx.send(WsCommand::Send(msg.to_string()))
                .map_err(|e| SyncError::Send(e.to_string()))
        }

        fn poll_events(&mut self) -> Vec<SyncEvent> {
            let events: Vec<SyncEvent> = match &self.event_rx {
                Some(rx) => rx.try_iter().collect(),
                None => Vec::new(),
            };
            for event in &events {
                match event {
                    SyncEvent::Connected => self.state = ConnectionState::Connected,
                    SyncEvent::Disconnected => {
                        // Thread has exited; allow a fresh connect
                        self.cmd_tx = None;
                        self.event_rx = None;
                        self._thread = None;
                        self.state = ConnectionState::Disconnected;
                    }
                    _ => {}
                }
            }
            events
        }

        fn state(&self) -> ConnectionState {
            self.state
        }
    }

    impl Default for NativeWebSocket {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Drop for NativeWebSocket {
        fn drop(&mut self) {
            self.disconnect();
        }
    }
}

pub use native_client::NativeWebSocket;

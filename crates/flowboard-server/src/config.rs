//! Relay configuration from environment variables:
//! - `FLOWBOARD_ADDR`: listen address (default `0.0.0.0:3751`)
//! - `FLOWBOARD_BOARD_FILE`: board file path (default `board.json`)

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_ADDR: &str = "0.0.0.0:3751";
pub const DEFAULT_BOARD_FILE: &str = "board.json";
/// Frames buffered per peer before it counts as lagging.
pub const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid FLOWBOARD_ADDR {value:?}: {source}")]
    InvalidAddr {
        value: String,
        source: std::net::AddrParseError,
    },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub board_path: PathBuf,
    pub broadcast_capacity: usize,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let addr = lookup("FLOWBOARD_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let bind_addr = addr
            .parse()
            .map_err(|source| ConfigError::InvalidAddr { value: addr.clone(), source })?;
        let board_path = lookup("FLOWBOARD_BOARD_FILE")
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BOARD_FILE.to_string())
            .into();

        Ok(Self {
            bind_addr,
            board_path,
            broadcast_capacity: CHANNEL_CAPACITY,
        })
    }

    /// Config for a board file at `board_path`, listening on an ephemeral port.
    pub fn for_board(board_path: impl Into<PathBuf>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            board_path: board_path.into(),
            broadcast_capacity: CHANNEL_CAPACITY,
        }
    }
}

//! Flowboard relay server.
//!
//! Holds the single authoritative board, accepts whole-board writes over
//! HTTP and fans every accepted write out to all WebSocket peers, along with
//! a presence roster. The last accepted write wins.

pub mod config;
pub mod error;
pub mod protocol;
pub mod router;
pub mod state;

pub use config::ServerConfig;
pub use router::build_router;
pub use state::AppState;

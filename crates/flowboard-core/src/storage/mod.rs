//! Durable storage for the board.
//!
//! A store holds exactly one board. Loading a store that was never written
//! yields [`StorageError::NotFound`], which callers treat as "start empty".

mod autosave;
mod file;
mod http;
mod memory;
mod writer;

pub use autosave::{AutoSaveManager, DEFAULT_DEBOUNCE};
pub use file::FileStore;
pub use http::HttpStore;
pub use memory::MemoryStore;
pub use writer::BackgroundWriter;

use crate::board::Board;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Board not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("HTTP error: {0}")]
    Http(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for board storage backends.
///
/// Implementations keep the board in memory, in a local JSON file, or on a
/// relay reached over HTTP.
pub trait BoardStore: Send + Sync {
    /// Load the stored board.
    fn load(&self) -> StorageResult<Board>;

    /// Replace the stored board.
    fn save(&self, board: &Board) -> StorageResult<()>;
}

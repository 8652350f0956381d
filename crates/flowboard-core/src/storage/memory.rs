//! In-memory storage implementation.

use super::{BoardStore, StorageError, StorageResult};
use crate::board::Board;
use std::sync::RwLock;

/// In-memory storage for testing and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    board: RwLock<Option<Board>>,
    saves: RwLock<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `board`.
    pub fn with_board(board: Board) -> Self {
        Self {
            board: RwLock::new(Some(board)),
            saves: RwLock::new(0),
        }
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.read().map(|n| *n).unwrap_or(0)
    }
}

impl BoardStore for MemoryStore {
    fn load(&self) -> StorageResult<Board> {
        let board = self
            .board
            .read()
            .map_err(|e| StorageError::Io(format!("Lock error: {}", e)))?;
        board
            .clone()
            .ok_or_else(|| StorageError::NotFound("memory".to_string()))
    }

    fn save(&self, board: &Board) -> StorageResult<()> {
        let mut slot = self
            .board
            .write()
            .map_err(|e| StorageError::Io(format!("Lock error: {}", e)))?;
        *slot = Some(board.clone());
        if let Ok(mut saves) = self.saves.write() {
            *saves += 1;
        }
        Ok(())
    }
}

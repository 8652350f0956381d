//! File-based storage: the board as a single JSON file.

use super::{BoardStore, StorageError, StorageResult};
use crate::board::Board;
use std::fs;
use std::path::{Path, PathBuf};

/// File name used by [`FileStore::default_location`].
pub const DEFAULT_BOARD_FILE: &str = "board.json";

/// Stores the board as pretty JSON in one file.
///
/// Writes go to a sibling temporary file that is then renamed over the
/// target, so readers never observe a half-written board.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a store for `path`, creating its parent directory if needed.
    pub fn new(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    StorageError::Io(format!("Failed to create storage directory: {}", e))
                })?;
            }
        }
        Ok(Self { path })
    }

    /// Create file storage in the default location.
    ///
    /// On Unix: `~/.local/share/flowboard/board.json`
    /// On Windows: `%LOCALAPPDATA%\flowboard\board.json`
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;
        Self::new(base.join("flowboard").join(DEFAULT_BOARD_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl BoardStore for FileStore {
    fn load(&self) -> StorageResult<Board> {
        if !self.path.exists() {
            return Err(StorageError::NotFound(self.path.display().to_string()));
        }
        let json = fs::read_to_string(&self.path).map_err(|e| {
            StorageError::Io(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        Board::from_json(&json).map_err(|e| {
            StorageError::Serialization(format!("Failed to parse {}: {}", self.path.display(), e))
        })
    }

    fn save(&self, board: &Board) -> StorageResult<()> {
        let json = board
            .to_json()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let tmp = self.temp_path();
        fs::write(&tmp, json).map_err(|e| {
            StorageError::Io(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            StorageError::Io(format!("Failed to replace {}: {}", self.path.display(), e))
        })
    }
}

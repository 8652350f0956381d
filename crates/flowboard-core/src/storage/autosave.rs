//! Debounced board persistence.
//!
//! Every local change pushes the save deadline back; the save fires once the
//! board has been quiet for the debounce interval and always writes the
//! board as it is at that moment.

use crate::board::Board;
use crate::storage::{BoardStore, StorageResult};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default quiet period before a pending change is written.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(400);

/// Manages debounced persistence of the board.
pub struct AutoSaveManager<S: BoardStore> {
    /// Storage backend.
    storage: Arc<S>,
    /// Quiet period before saving.
    debounce: Duration,
    /// When the pending save is due, if one is scheduled.
    deadline: Option<Instant>,
    /// Last successful save.
    last_save: Option<Instant>,
    /// Whether the board has unsaved changes.
    dirty: bool,
}

impl<S: BoardStore> AutoSaveManager<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            debounce: DEFAULT_DEBOUNCE,
            deadline: None,
            last_save: None,
            dirty: false,
        }
    }

    pub fn set_debounce(&mut self, debounce: Duration) {
        self.debounce = debounce;
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Record a change at `now`, (re)starting the debounce window.
    pub fn mark_dirty(&mut self, now: Instant) {
        self.dirty = true;
        self.deadline = Some(now + self.debounce);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether a debounced save is scheduled and has not run yet.
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn last_save(&self) -> Option<Instant> {
        self.last_save
    }

    /// Check whether the debounce window has elapsed.
    pub fn should_save(&self, now: Instant) -> bool {
        self.dirty && self.deadline.is_some_and(|d| now >= d)
    }

    /// Save if the debounce window has elapsed.
    /// Returns true if a save was performed.
    pub fn maybe_save(&mut self, now: Instant, board: &Board) -> StorageResult<bool> {
        if !self.should_save(now) {
            return Ok(false);
        }
        self.save(now, board)?;
        Ok(true)
    }

    /// Save immediately. On failure the board stays dirty but no retry is
    /// scheduled; the next change schedules one.
    pub fn save(&mut self, now: Instant, board: &Board) -> StorageResult<()> {
        self.deadline = None;
        self.storage.save(board)?;
        self.dirty = false;
        self.last_save = Some(now);
        Ok(())
    }

    /// Claim a due save for a writer that runs elsewhere. Returns true if
    /// the board should be handed off now; report back with
    /// [`AutoSaveManager::finish_write`].
    pub fn take_due(&mut self, now: Instant) -> bool {
        if !self.should_save(now) {
            return false;
        }
        self.deadline = None;
        self.dirty = false;
        true
    }

    /// Record the outcome of a write claimed with `take_due`. A failure
    /// leaves the board dirty without scheduling a retry.
    pub fn finish_write(&mut self, now: Instant, result: &StorageResult<()>) {
        match result {
            Ok(()) => self.last_save = Some(now),
            Err(_) => self.dirty = true,
        }
    }

    /// Load the stored board and reset the dirty state.
    pub fn load(&mut self) -> StorageResult<Board> {
        let board = self.storage.load()?;
        self.dirty = false;
        self.deadline = None;
        Ok(board)
    }

    /// Drop any scheduled save.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Node, NodeVariant};
    use crate::storage::{MemoryStore, StorageError};
    use kurbo::Point;

    struct FailingStore;

    impl BoardStore for FailingStore {
        fn load(&self) -> StorageResult<Board> {
            Err(StorageError::NotFound("nothing".to_string()))
        }

        fn save(&self, _board: &Board) -> StorageResult<()> {
            Err(StorageError::Io("disk full".to_string()))
        }
    }

    #[test]
    fn test_debounce_resets_on_change() {
        let store = Arc::new(MemoryStore::new());
        let mut manager = AutoSaveManager::new(store.clone());
        let t0 = Instant::now();
        let board = Board::new();

        manager.mark_dirty(t0);
        manager.mark_dirty(t0 + Duration::from_millis(300));
        assert!(!manager.should_save(t0 + Duration::from_millis(500)));
        assert!(manager.should_save(t0 + Duration::from_millis(700)));

        assert!(manager.maybe_save(t0 + Duration::from_millis(700), &board).unwrap());
        assert!(!manager.is_dirty());
        assert!(!manager.is_pending());
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn test_saves_latest_board() {
        let store = Arc::new(MemoryStore::new());
        let mut manager = AutoSaveManager::new(store.clone());
        let t0 = Instant::now();

        let mut board = Board::new();
        manager.mark_dirty(t0);
        board.nodes.push(Node::from_template(NodeVariant::Text, Point::ZERO));
        manager.mark_dirty(t0 + Duration::from_millis(100));
        board.nodes.push(Node::from_template(NodeVariant::Status, Point::ZERO));

        manager.maybe_save(t0 + Duration::from_secs(1), &board).unwrap();
        assert_eq!(store.load().unwrap().nodes.len(), 2);
    }

    #[test]
    fn test_clean_manager_never_saves() {
        let store = Arc::new(MemoryStore::new());
        let mut manager = AutoSaveManager::new(store.clone());
        let later = Instant::now() + Duration::from_secs(10);
        assert!(!manager.maybe_save(later, &Board::new()).unwrap());
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn test_take_due_hands_off_once() {
        let mut manager = AutoSaveManager::new(Arc::new(MemoryStore::new()));
        let t0 = Instant::now();
        manager.mark_dirty(t0);
        assert!(!manager.take_due(t0));

        let t1 = t0 + Duration::from_secs(1);
        assert!(manager.take_due(t1));
        assert!(!manager.take_due(t1));
        assert!(!manager.is_pending());

        manager.finish_write(t1, &Err(StorageError::Io("disk full".to_string())));
        assert!(manager.is_dirty());
        assert!(manager.last_save().is_none());

        manager.mark_dirty(t1);
        let t2 = t1 + Duration::from_secs(1);
        assert!(manager.take_due(t2));
        manager.finish_write(t2, &Ok(()));
        assert!(!manager.is_dirty());
        assert_eq!(manager.last_save(), Some(t2));
    }

    #[test]
    fn test_failed_save_stays_dirty() {
        let mut manager = AutoSaveManager::new(Arc::new(FailingStore));
        let t0 = Instant::now();
        manager.mark_dirty(t0);

        let result = manager.maybe_save(t0 + Duration::from_secs(1), &Board::new());
        assert!(matches!(result, Err(StorageError::Io(_))));
        assert!(manager.is_dirty());
        assert!(!manager.is_pending());

        // The next change schedules another attempt
        manager.mark_dirty(t0 + Duration::from_secs(2));
        assert!(manager.should_save(t0 + Duration::from_secs(3)));
    }
}

//! Undo/redo over whole-board snapshots.
//!
//! Structural edits always record a checkpoint. Content edits (typing,
//! toggling) record one checkpoint per editing session, keyed by the element
//! and field being edited, so a burst of keystrokes undoes as a unit.

use crate::board::{Board, ElementId};
use std::collections::VecDeque;

/// Maximum number of undo states to keep.
pub const MAX_UNDO_HISTORY: usize = 50;

/// Field targeted by a content edit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EditField {
    /// Node text (free text, status label).
    Text,
    ItemText(ElementId),
    ItemChecked(ElementId),
    EdgeLabel,
}

/// Identifies an editing session: one field of one element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EditKey {
    pub element: ElementId,
    pub field: EditField,
}

impl EditKey {
    pub fn new(element: impl Into<ElementId>, field: EditField) -> Self {
        Self {
            element: element.into(),
            field,
        }
    }
}

/// Bounded undo and redo stacks of board snapshots.
#[derive(Debug, Clone, Default)]
pub struct History {
    undo_stack: VecDeque<Board>,
    redo_stack: Vec<Board>,
    session: Option<EditKey>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push the current board to the undo stack (call before making changes).
    ///
    /// Clears the redo stack, ends any editing session and evicts the oldest
    /// snapshot past [`MAX_UNDO_HISTORY`].
    pub fn record_checkpoint(&mut self, board: &Board) {
        self.session = None;
        self.undo_stack.push_back(board.clone());
        self.redo_stack.clear();

        if self.undo_stack.len() > MAX_UNDO_HISTORY {
            self.undo_stack.pop_front();
        }
    }

    /// Checkpoint for a content edit. Only the first edit of a session
    /// records; returns whether a checkpoint was taken.
    pub fn checkpoint_edit(&mut self, board: &Board, key: EditKey) -> bool {
        if self.session.as_ref() == Some(&key) {
            return false;
        }
        self.record_checkpoint(board);
        self.session = Some(key);
        true
    }

    /// End the current editing session (the field lost focus).
    pub fn end_session(&mut self) {
        self.session = None;
    }

    pub fn active_session(&self) -> Option<&EditKey> {
        self.session.as_ref()
    }

    /// Restore the previous snapshot into `board`.
    /// Returns true if undo was performed, false if nothing to undo.
    pub fn undo(&mut self, board: &mut Board) -> bool {
        let Some(snapshot) = self.undo_stack.pop_back() else {
            return false;
        };
        self.session = None;
        self.redo_stack.push(std::mem::replace(board, snapshot));
        true
    }

    /// Reapply the last undone snapshot into `board`.
    /// Returns true if redo was performed, false if nothing to redo.
    pub fn redo(&mut self, board: &mut Board) -> bool {
        let Some(snapshot) = self.redo_stack.pop() else {
            return false;
        };
        self.session = None;
        self.undo_stack.push_back(std::mem::replace(board, snapshot));
        if self.undo_stack.len() > MAX_UNDO_HISTORY {
            self.undo_stack.pop_front();
        }
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.session = None;
    }
}

//! Undo and redo.
//!
//! The history stores whole document snapshots taken before each change.
//! A run of plain typing shares one entry, so undo takes back a word or a
//! line rather than a single character.

use std::collections::VecDeque;

use crate::model::Document;
use crate::selection::Selection;

/// Oldest entries are dropped past this many.
pub const HISTORY_LIMIT: usize = 100;

/// A document and the selection it was edited through.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    pub document: Document,
    pub selection: Option<Selection>,
}

/// How a transaction changed the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Change {
    None,
    /// Plain text typed at the caret; consecutive typing coalesces.
    Typing,
    Edit,
}

impl Change {
    pub fn from_changed(changed: bool) -> Self {
        if changed { Change::Edit } else { Change::None }
    }

    pub fn is_change(self) -> bool {
        self != Change::None
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct History {
    undo: VecDeque<Snapshot>,
    redo: Vec<Snapshot>,
    /// The newest undo entry belongs to a run of typing that is still open.
    typing: bool,
}

impl History {
    /// Records the state from before a change. Any redo entries are gone
    /// once something new happens.
    pub fn record(&mut self, before: Snapshot, change: Change) {
        if !change.is_change() {
            return;
        }
        self.redo.clear();
        let typing = change == Change::Typing;
        if typing && self.typing {
            return;
        }
        self.typing = typing;
        self.undo.push_back(before);
        if self.undo.len() > HISTORY_LIMIT {
            self.undo.pop_front();
        }
    }

    /// Ends the current run of typing.
    pub fn seal(&mut self) {
        self.typing = false;
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Trades `current` for the newest undo entry.
    pub fn undo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let previous = self.undo.pop_back()?;
        self.redo.push(current);
        self.typing = false;
        Some(previous)
    }

    /// Trades `current` for the newest redo entry.
    pub fn redo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let next = self.redo.pop()?;
        self.undo.push_back(current);
        self.typing = false;
        Some(next)
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.typing = false;
    }
}

// Undo history: full-state snapshots taken before each accepted bid.

use chrono::{DateTime, Utc};

use super::engine::AuctionState;

/// One rollback point: the complete auction state as it was immediately
/// before a bid was accepted.
#[derive(Debug, Clone)]
pub struct UndoEntry {
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
    /// What the snapshot was taken ahead of, e.g. "bid of 120 by Strikers".
    pub description: String,
    /// The state to restore.
    pub state: AuctionState,
}

/// A stack of rollback points, most recent on top.
///
/// Cleared at every commit point (sold/unsold resolution, completion), so a
/// popped snapshot can never resurrect a committed outcome. Deliberately not
/// persisted: a resumed session starts with an empty stack.
#[derive(Debug, Clone, Default)]
pub struct UndoStack {
    entries: Vec<UndoEntry>,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a rollback point.
    pub fn push(&mut self, state: AuctionState, description: impl Into<String>) {
        self.entries.push(UndoEntry {
            taken_at: Utc::now(),
            description: description.into(),
            state,
        });
    }

    /// Pop the most recent rollback point.
    pub fn pop(&mut self) -> Option<UndoEntry> {
        self.entries.pop()
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Description of the operation that would be undone next.
    pub fn last_description(&self) -> Option<&str> {
        self.entries.last().map(|e| e.description.as_str())
    }

    /// Drop all rollback points. Called when an outcome commits.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

//! Bounded linear undo/redo over [`GraphSnapshot`]s.
//!
//! Snapshots are taken *before* each undoable mutation. Because of that, the
//! live graph after the last mutation has no entry of its own; `undo` first
//! checkpoints the live graph when it has been edited since the cursor last
//! moved, so that `undo` followed by `redo` returns exactly to where it
//! started.
//!
//! Edits are tracked explicitly rather than by comparing the live graph with
//! the entry under the cursor. Layout passes rewrite positions without being
//! edits, and must not cost the user their redo branch.

use tracing::debug;

use crate::model::{GraphModel, GraphSnapshot};

/// Default number of retained snapshots.
pub const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<GraphSnapshot>,
    /// Cursor into `entries`; `None` exactly when `entries` is empty.
    index: Option<usize>,
    capacity: usize,
    /// The live graph was edited after the cursor last moved.
    edited: bool,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl History {
    /// Capacities below two are raised to two, the room `undo` needs to
    /// checkpoint the live graph and still step back.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            index: None,
            capacity: capacity.max(2),
            edited: false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn entries(&self) -> &[GraphSnapshot] {
        &self.entries
    }

    /// Whether `undo` would move the cursor given the live graph.
    pub fn can_undo(&self, live: &GraphModel) -> bool {
        match self.index {
            None => false,
            Some(0) => self.needs_checkpoint(live),
            Some(_) => true,
        }
    }

    /// Whether `redo` would move the cursor.
    pub fn can_redo(&self) -> bool {
        match self.index {
            Some(i) => i + 1 < self.entries.len() && !self.edited,
            None => false,
        }
    }

    /// Record a direct edit of the live graph that took no snapshot, such as
    /// a drag. The redo branch is stale from here on.
    pub fn mark_edited(&mut self) {
        self.edited = true;
    }

    /// Push a deep copy of `live`, discarding any redo branch and evicting
    /// the oldest entry past capacity. The caller is about to mutate `live`.
    pub fn snapshot(&mut self, live: &GraphModel) {
        self.push(live);
        self.edited = true;
        debug!(len = self.entries.len(), "History snapshot");
    }

    /// Step back one entry, restoring it into `live`. Returns whether anything changed.
    pub fn undo(&mut self, live: &mut GraphModel) -> bool {
        if self.index.is_none() {
            return false;
        }
        if self.needs_checkpoint(live) {
            self.push(live);
            debug!(len = self.entries.len(), "Checkpointed live graph before undo");
        }
        self.edited = false;
        let Some(i) = self.index.filter(|&i| i > 0) else {
            return false;
        };
        self.index = Some(i - 1);
        live.restore(&self.entries[i - 1]);
        debug!(index = i - 1, len = self.entries.len(), "Undo");
        true
    }

    /// Step forward one entry. An edit since the last undo leaves nothing to
    /// redo; the branch itself is only discarded by the next snapshot.
    pub fn redo(&mut self, live: &mut GraphModel) -> bool {
        if !self.can_redo() {
            return false;
        }
        let Some(i) = self.index else {
            return false;
        };
        self.index = Some(i + 1);
        live.restore(&self.entries[i + 1]);
        debug!(index = i + 1, len = self.entries.len(), "Redo");
        true
    }

    fn push(&mut self, live: &GraphModel) {
        let keep = self.index.map_or(0, |i| i + 1);
        self.entries.truncate(keep);
        self.entries.push(live.snapshot());
        if self.entries.len() > self.capacity {
            self.entries.remove(0);
        }
        self.index = Some(self.entries.len() - 1);
    }

    fn needs_checkpoint(&self, live: &GraphModel) -> bool {
        self.edited
            && self
                .index
                .and_then(|i| self.entries.get(i))
                .is_some_and(|entry| !entry.matches(live))
    }
}

// ── Tests ──────────────────────────────────────────────────────────

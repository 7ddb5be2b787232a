//! Undo/redo history.
//!
//! Every committed update pushes the state it replaced. Trees share their
//! untouched nodes, so a snapshot costs one map clone, and the dirty set for
//! restoring it is recovered by comparing node pointers.

use std::collections::VecDeque;

use crate::selection::Selection;
use crate::tree::DocumentTree;

/// Trait for managing undo/redo stacks.
///
/// Performing an undo needs the editor (it reconciles), so this only covers
/// the bookkeeping side.
pub trait UndoManager {
    /// Check if undo is available.
    fn can_undo(&self) -> bool;

    /// Check if redo is available.
    fn can_redo(&self) -> bool;

    /// Clear all undo/redo history.
    fn clear_history(&mut self);
}

/// Document state as it was before an update.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub tree: DocumentTree,
    pub selection: Option<Selection>,
}

#[derive(Debug, Clone)]
pub struct History {
    undo_stack: VecDeque<Snapshot>,
    redo_stack: Vec<Snapshot>,
    max_steps: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(100)
    }
}

impl History {
    pub fn new(max_steps: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_steps,
        }
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn set_max_steps(&mut self, max_steps: usize) {
        self.max_steps = max_steps;
        self.trim();
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Record the state replaced by a new edit. Clears the redo stack.
    pub fn record(&mut self, before: Snapshot) {
        self.redo_stack.clear();
        self.push_undo(before);
    }

    pub(crate) fn push_undo(&mut self, snapshot: Snapshot) {
        self.undo_stack.push_back(snapshot);
        self.trim();
    }

    pub(crate) fn pop_undo(&mut self) -> Option<Snapshot> {
        self.undo_stack.pop_back()
    }

    pub(crate) fn push_redo(&mut self, snapshot: Snapshot) {
        self.redo_stack.push(snapshot);
    }

    pub(crate) fn pop_redo(&mut self) -> Option<Snapshot> {
        self.redo_stack.pop()
    }

    fn trim(&mut self) {
        while self.undo_stack.len() > self.max_steps {
            self.undo_stack.pop_front();
        }
    }
}

impl UndoManager for History {
    fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    fn clear_history(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::TreeBuilder;

    fn snapshot(text: &str) -> Snapshot {
        let mut b = TreeBuilder::new();
        let root = b.root();
        let p = b.paragraph(&root, "p");
        b.text(&p, "t", text);
        Snapshot {
            tree: b.build(),
            selection: None,
        }
    }

    fn text_of(snapshot: &Snapshot) -> String {
        snapshot.tree.text_content()
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let mut history = History::new(10);
        history.record(snapshot("a"));
        let undone = history.pop_undo().unwrap();
        history.push_redo(undone);
        assert!(history.can_redo());

        history.record(snapshot("b"));
        assert!(!history.can_redo());
        assert_eq!(history.undo_len(), 1);
    }

    #[test]
    fn test_max_steps() {
        let mut history = History::new(3);
        for text in ["a", "b", "c", "d"] {
            history.record(snapshot(text));
        }
        assert_eq!(history.undo_len(), 3);
        assert_eq!(text_of(&history.pop_undo().unwrap()), "d");
        assert_eq!(text_of(&history.pop_undo().unwrap()), "c");
        assert_eq!(text_of(&history.pop_undo().unwrap()), "b");
        // "a" was evicted.
        assert!(history.pop_undo().is_none());
    }

    #[test]
    fn test_shrinking_depth_drops_oldest() {
        let mut history = History::new(5);
        for text in ["a", "b", "c"] {
            history.record(snapshot(text));
        }
        history.set_max_steps(1);
        assert_eq!(history.undo_len(), 1);
        assert_eq!(text_of(&history.pop_undo().unwrap()), "c");
    }

    #[test]
    fn test_clear_history() {
        let mut history = History::default();
        history.record(snapshot("a"));
        history.push_redo(snapshot("b"));
        history.clear_history();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }
}

//! Dirty key tracking between two tree versions.

use std::collections::HashMap;
use std::collections::hash_map;
use std::sync::Arc;

use crate::node::NodeKey;
use crate::tree::DocumentTree;

/// Why a node was marked dirty.
///
/// Only user-initiated changes count as content changes for decorators;
/// editor-initiated marks come from bookkeeping such as moving a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirtyCause {
    UserInitiated,
    EditorInitiated,
}

/// Keys changed by an update, each with the strongest cause seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtySet {
    entries: HashMap<NodeKey, DirtyCause>,
}

impl DirtySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key`. A user-initiated mark is never downgraded.
    pub fn mark(&mut self, key: NodeKey, cause: DirtyCause) {
        self.entries
            .entry(key)
            .and_modify(|existing| {
                if cause == DirtyCause::UserInitiated {
                    *existing = DirtyCause::UserInitiated;
                }
            })
            .or_insert(cause);
    }

    pub fn mark_user(&mut self, key: NodeKey) {
        self.mark(key, DirtyCause::UserInitiated);
    }

    pub fn mark_editor(&mut self, key: NodeKey) {
        self.mark(key, DirtyCause::EditorInitiated);
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn cause(&self, key: &NodeKey) -> Option<DirtyCause> {
        self.entries.get(key).copied()
    }

    pub fn is_user_initiated(&self, key: &NodeKey) -> bool {
        self.cause(key) == Some(DirtyCause::UserInitiated)
    }

    pub fn remove(&mut self, key: &NodeKey) {
        self.entries.remove(key);
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&NodeKey) -> bool) {
        self.entries.retain(|key, _| keep(key));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &NodeKey> {
        self.entries.keys()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, NodeKey, DirtyCause> {
        self.entries.iter()
    }

    /// Every key whose node differs between `prev` and `next`.
    ///
    /// Nodes shared by pointer are unchanged. A node whose only change is
    /// its parent was moved and is marked editor-initiated; every other
    /// difference is user-initiated.
    pub fn between(prev: &DocumentTree, next: &DocumentTree) -> Self {
        let mut dirty = Self::new();
        for key in next.keys() {
            let Some(after) = next.get_arc(key) else {
                continue;
            };
            match prev.get_arc(key) {
                Some(before) if Arc::ptr_eq(before, after) => {}
                Some(before) if before.kind == after.kind => {
                    dirty.mark_editor(key.clone());
                }
                _ => dirty.mark_user(key.clone()),
            }
        }
        for key in prev.keys() {
            if !next.contains(key) {
                dirty.mark_user(key.clone());
            }
        }
        dirty
    }
}

impl FromIterator<(NodeKey, DirtyCause)> for DirtySet {
    fn from_iter<I: IntoIterator<Item = (NodeKey, DirtyCause)>>(iter: I) -> Self {
        let mut dirty = Self::new();
        for (key, cause) in iter {
            dirty.mark(key, cause);
        }
        dirty
    }
}

#[cfg(test)]
mod tests {
    use smol_str::SmolStr;

    use super::*;
    use crate::tree::TreeBuilder;

    fn k(s: &str) -> NodeKey {
        SmolStr::new(s)
    }

    #[test]
    fn test_user_mark_wins() {
        let mut dirty = DirtySet::new();
        dirty.mark_editor(k("a"));
        dirty.mark_user(k("a"));
        dirty.mark_editor(k("a"));
        assert_eq!(dirty.cause(&k("a")), Some(DirtyCause::UserInitiated));
        assert_eq!(dirty.len(), 1);
    }

    #[test]
    fn test_between_detects_changes() {
        let mut b = TreeBuilder::new();
        let root = b.root();
        let p = b.paragraph(&root, "p");
        b.text(&p, "t", "hi");
        b.text(&p, "u", "there");
        let prev = b.build();

        let mut next = prev.clone();
        assert!(DirtySet::between(&prev, &next).is_empty());

        if let Some(text) = next.node_mut(&k("t")).and_then(|n| n.as_text_mut()) {
            text.text.push('!');
        }
        let dirty = DirtySet::between(&prev, &next);
        assert_eq!(dirty.len(), 1);
        assert!(dirty.is_user_initiated(&k("t")));

        // Touching a node without changing its data counts as a move.
        next.node_mut(&k("u"));
        let dirty = DirtySet::between(&prev, &next);
        assert_eq!(dirty.cause(&k("u")), Some(DirtyCause::EditorInitiated));
    }

    #[test]
    fn test_between_marks_removed_keys() {
        let mut b = TreeBuilder::new();
        let root = b.root();
        let p = b.paragraph(&root, "p");
        b.text(&p, "t", "hi");
        let prev = b.build();

        let mut next = prev.clone();
        if let Some(children) = next.node_mut(&k("p")).and_then(|n| n.children_mut()) {
            children.clear();
        }
        next.collect_garbage();

        let dirty = DirtySet::between(&prev, &next);
        assert!(dirty.contains(&k("t")));
        assert!(dirty.is_user_initiated(&k("p")));
    }
}

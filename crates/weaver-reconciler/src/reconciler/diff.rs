//! Structural comparison of two tree versions, driven by the dirty set.

use std::collections::{BTreeSet, HashSet};

use crate::dirty::DirtySet;
use crate::node::NodeKey;
use crate::tree::DocumentTree;

/// Child-list changes between two versions.
#[derive(Debug, Clone, Default)]
pub(crate) struct StructuralDiff {
    /// Containers in both trees whose child lists differ.
    pub changed_parents: BTreeSet<NodeKey>,
    /// Keys only in the next tree.
    pub added: HashSet<NodeKey>,
    /// Keys only in the previous tree.
    pub removed: HashSet<NodeKey>,
    /// Keys in both trees whose parent changed.
    pub moved: BTreeSet<NodeKey>,
}

impl StructuralDiff {
    pub fn compute(prev: &DocumentTree, next: &DocumentTree, dirty: &DirtySet) -> Self {
        let mut diff = Self::default();
        let mut candidates: BTreeSet<NodeKey> = BTreeSet::new();

        for key in dirty.keys() {
            match (prev.get(key), next.get(key)) {
                (Some(before), Some(after)) => {
                    if before.is_container() {
                        candidates.insert(key.clone());
                    }
                    if before.parent != after.parent {
                        diff.moved.insert(key.clone());
                        candidates.extend(before.parent.iter().cloned());
                        candidates.extend(after.parent.iter().cloned());
                    }
                }
                (None, Some(after)) => {
                    candidates.extend(after.parent.iter().cloned());
                }
                (Some(before), None) => {
                    candidates.extend(before.parent.iter().cloned());
                }
                (None, None) => {}
            }
        }

        for key in candidates {
            let (Some(before), Some(after)) = (prev.get(&key), next.get(&key)) else {
                continue;
            };
            if before.children() == after.children() {
                continue;
            }
            for child in before.children() {
                if !next.contains(child) {
                    for gone in prev.subtree_keys(child) {
                        if !next.contains(&gone) {
                            diff.removed.insert(gone);
                        }
                    }
                }
            }
            for child in after.children() {
                if !prev.contains(child) {
                    for fresh in next.subtree_keys(child) {
                        if !prev.contains(&fresh) {
                            diff.added.insert(fresh);
                        }
                    }
                }
            }
            diff.changed_parents.insert(key);
        }

        // Dirty keys only in one tree but under an unchanged parent.
        for key in dirty.keys() {
            match (prev.contains(key), next.contains(key)) {
                (false, true) => {
                    diff.added.insert(key.clone());
                }
                (true, false) => {
                    diff.removed.insert(key.clone());
                }
                _ => {}
            }
        }
        diff
    }

    pub fn is_structural(&self) -> bool {
        !self.changed_parents.is_empty()
            || !self.added.is_empty()
            || !self.removed.is_empty()
            || !self.moved.is_empty()
    }

    /// Keys whose subtree must be re-rendered, as seen in each tree.
    ///
    /// Returns `(previous-side, next-side)` touch points.
    pub fn touch_points(
        &self,
        prev: &DocumentTree,
        next: &DocumentTree,
        dirty: &DirtySet,
    ) -> (Vec<NodeKey>, Vec<NodeKey>) {
        let mut before: Vec<NodeKey> = self.changed_parents.iter().cloned().collect();
        let mut after = before.clone();

        for key in dirty.keys().chain(&self.moved) {
            if prev.contains(key) {
                before.push(key.clone());
            }
            if next.contains(key) {
                after.push(key.clone());
            }
        }
        for key in &self.moved {
            before.extend(prev.parent(key).cloned());
            after.extend(next.parent(key).cloned());
        }
        for key in &self.removed {
            before.extend(prev.parent(key).cloned());
        }
        for key in &self.added {
            after.extend(next.parent(key).cloned());
        }
        (before, after)
    }
}

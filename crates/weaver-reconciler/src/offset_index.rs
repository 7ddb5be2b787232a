//! Position index over document nodes, backed by a Fenwick tree of lengths.
//!
//! Nodes are stored in registration order in an arena; a hash map resolves a
//! key to its slot. A node's position is the sum of the lengths of every slot
//! before it, so changing one length shifts everything after it in O(log n).
//!
//! Registration order determines position. Registering a key after its
//! document successors appends it at the end; callers that change document
//! structure re-register from scratch in document order.

use std::collections::{HashMap, HashSet};
use std::ops::Range;

use crate::fenwick::FenwickTree;
use crate::node::NodeKey;

const INITIAL_CAPACITY: usize = 64;

/// Key → flat range index with dirty tracking.
#[derive(Debug, Clone)]
pub struct NodeOffsetIndex {
    slots: HashMap<NodeKey, usize>,
    keys: Vec<NodeKey>,
    lengths: FenwickTree,
    dirty: HashSet<NodeKey>,
}

impl Default for NodeOffsetIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeOffsetIndex {
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: HashMap::with_capacity(capacity),
            keys: Vec::with_capacity(capacity),
            lengths: FenwickTree::new(capacity),
            dirty: HashSet::new(),
        }
    }

    /// Number of registered keys, zero-length ones included.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Sum of all registered lengths.
    pub fn total_length(&self) -> usize {
        self.lengths.total().max(0) as usize
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.slots.contains_key(key)
    }

    /// Register `key` with `length`.
    ///
    /// A new key is appended after every registered key. A known key keeps its
    /// slot and only has its length updated.
    pub fn register_node(&mut self, key: NodeKey, length: usize) {
        if self.slots.contains_key(&key) {
            self.update_node_length(&key, length);
            return;
        }
        let slot = self.keys.len();
        if slot >= self.lengths.capacity() {
            self.lengths.grow((self.lengths.capacity() * 2).max(slot + 1));
        }
        self.slots.insert(key.clone(), slot);
        self.keys.push(key);
        self.lengths.set(slot, length as i64);
    }

    /// Set the length of `key`, shifting every later node by the difference.
    pub fn update_node_length(&mut self, key: &NodeKey, new_length: usize) {
        if let Some(&slot) = self.slots.get(key) {
            self.lengths.set(slot, new_length as i64);
        }
    }

    /// Start position of `key`.
    pub fn get_node_position(&self, key: &NodeKey) -> Option<usize> {
        let slot = *self.slots.get(key)?;
        Some(self.lengths.prefix_sum(slot as isize - 1) as usize)
    }

    /// `(position, length)` of `key`.
    pub fn get_node_range(&self, key: &NodeKey) -> Option<(usize, usize)> {
        let slot = *self.slots.get(key)?;
        let position = self.lengths.prefix_sum(slot as isize - 1) as usize;
        Some((position, self.lengths.get(slot) as usize))
    }

    /// Key whose `[position, position + length)` contains `position`.
    pub fn find_node_at(&self, position: usize) -> Option<&NodeKey> {
        let slot = self.lengths.lower_bound(position as i64)?;
        self.keys.get(slot)
    }

    /// Every non-empty entry with its range, in registration order.
    pub fn get_nodes_in_order(&self) -> Vec<(NodeKey, Range<usize>)> {
        let mut position = 0usize;
        let mut out = Vec::with_capacity(self.keys.len());
        for (slot, key) in self.keys.iter().enumerate() {
            let length = self.lengths.get(slot) as usize;
            if length > 0 {
                out.push((key.clone(), position..position + length));
            }
            position += length;
        }
        out
    }

    pub fn mark_dirty(&mut self, key: &NodeKey) {
        if self.slots.contains_key(key) {
            self.dirty.insert(key.clone());
        }
    }

    pub fn clear_dirty(&mut self, key: &NodeKey) {
        self.dirty.remove(key);
    }

    pub fn clear_all_dirty(&mut self) {
        self.dirty.clear();
    }

    pub fn get_dirty_nodes(&self) -> &HashSet<NodeKey> {
        &self.dirty
    }

    /// `(true, key)` when exactly one node is dirty, `(false, None)` otherwise.
    pub fn can_use_fast_path(&self) -> (bool, Option<&NodeKey>) {
        if self.dirty.len() == 1 {
            (true, self.dirty.iter().next())
        } else {
            (false, None)
        }
    }

    /// Vacate the space of `key`. It stays addressable with zero length.
    pub fn remove_node(&mut self, key: &NodeKey) {
        if let Some(&slot) = self.slots.get(key) {
            self.lengths.set(slot, 0);
            self.dirty.remove(key);
        }
    }

    pub fn reset(&mut self) {
        self.slots.clear();
        self.keys.clear();
        self.lengths.reset();
        self.dirty.clear();
    }
}

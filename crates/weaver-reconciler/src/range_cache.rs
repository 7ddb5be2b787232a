//! Per-node flat ranges and delta propagation.
//!
//! Every node's flat text is `preamble + children + own text + postamble`.
//! The cache stores where that text starts and how long each component is.
//! Incremental reconciliation describes its changes as length deltas
//! anchored in the emission order of the previous tree, then applies them
//! here in one pass.

use std::collections::HashMap;

use crate::error::InvariantViolation;
use crate::fenwick::FenwickTree;
use crate::node::NodeKey;
use crate::tree::{DocumentOrder, DocumentTree};

/// Flat location and component lengths of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RangeCacheItem {
    pub location: usize,
    pub preamble_length: usize,
    pub children_length: usize,
    pub text_length: usize,
    pub postamble_length: usize,
}

impl RangeCacheItem {
    pub fn total(&self) -> usize {
        self.preamble_length + self.children_length + self.text_length + self.postamble_length
    }

    pub fn end(&self) -> usize {
        self.location + self.total()
    }

    /// Where the children (or, for leaves, the own text) begin.
    pub fn content_start(&self) -> usize {
        self.location + self.preamble_length
    }

    /// Where the node's own text begins.
    pub fn text_start(&self) -> usize {
        self.content_start() + self.children_length
    }

    pub fn postamble_start(&self) -> usize {
        self.text_start() + self.text_length
    }
}

/// One length component of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Preamble,
    Text,
    Postamble,
}

impl Component {
    fn name(self) -> &'static str {
        match self {
            Component::Preamble => "preamble",
            Component::Text => "text",
            Component::Postamble => "postamble",
        }
    }
}

/// Where in emission order a delta takes effect.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Anchor {
    /// At the node's enter event: its preamble, or a leaf's own text.
    Enter(NodeKey),
    /// At the node's leave event: its postamble.
    Leave(NodeKey),
    /// Between the previous event and the node's enter event.
    BeforeEnter(NodeKey),
    /// Just after the node's enter event, before its first child.
    AfterEnter(NodeKey),
    /// Between the node's leave event and the next event.
    AfterLeave(NodeKey),
}

impl Anchor {
    pub fn key(&self) -> &NodeKey {
        match self {
            Anchor::Enter(key)
            | Anchor::Leave(key)
            | Anchor::BeforeEnter(key)
            | Anchor::AfterEnter(key)
            | Anchor::AfterLeave(key) => key,
        }
    }

    /// Position in the doubled event space: events sit at even slots,
    /// the gaps between them at odd slots.
    fn position(&self, order: &DocumentOrder) -> Option<usize> {
        Some(match self {
            Anchor::Enter(key) => 2 * order.enter(key)?,
            Anchor::Leave(key) => 2 * order.leave(key)?,
            Anchor::BeforeEnter(key) => (2 * order.enter(key)?).saturating_sub(1),
            Anchor::AfterEnter(key) => 2 * order.enter(key)? + 1,
            Anchor::AfterLeave(key) => 2 * order.leave(key)? + 1,
        })
    }
}

/// A signed length change at an anchor.
///
/// With a component, the anchored node's own component changes too. Without
/// one, the delta only shifts later nodes and grows enclosing elements; this
/// is used for inserted blocks and rebuilt subtrees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDelta {
    pub anchor: Anchor,
    pub delta: i64,
    pub component: Option<Component>,
}

impl LengthDelta {
    pub fn own(anchor: Anchor, component: Component, delta: i64) -> Self {
        Self {
            anchor,
            delta,
            component: Some(component),
        }
    }

    pub fn span(anchor: Anchor, delta: i64) -> Self {
        Self {
            anchor,
            delta,
            component: None,
        }
    }
}

/// Accumulated change for one node before it is written back.
#[derive(Debug, Default, Clone, Copy)]
struct Pending {
    shift: i64,
    children: i64,
    preamble: i64,
    text: i64,
    postamble: i64,
}

/// Node key → [`RangeCacheItem`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeCache {
    items: HashMap<NodeKey, RangeCacheItem>,
}

impl RangeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, key: &NodeKey) -> Option<&RangeCacheItem> {
        self.items.get(key)
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.items.contains_key(key)
    }

    pub fn insert(&mut self, key: NodeKey, item: RangeCacheItem) {
        self.items.insert(key, item);
    }

    pub fn remove(&mut self, key: &NodeKey) -> Option<RangeCacheItem> {
        self.items.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeKey, &RangeCacheItem)> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Drop entries whose key is absent from `tree`. Returns the dropped keys.
    pub fn prune(&mut self, tree: &DocumentTree) -> Vec<NodeKey> {
        let stale: Vec<NodeKey> = self
            .items
            .keys()
            .filter(|key| !tree.contains(key))
            .cloned()
            .collect();
        for key in &stale {
            self.items.remove(key);
        }
        stale
    }

    /// Apply `deltas`, anchored in `order`, to every cached node of `order`.
    ///
    /// A node shifts by every delta anchored strictly before its enter event.
    /// An element's children grow by every delta anchored strictly inside it.
    /// `central` sums the deltas once in a Fenwick tree; otherwise each delta
    /// walks every node. Both give the same result.
    pub fn apply_deltas(
        &mut self,
        order: &DocumentOrder,
        deltas: &[LengthDelta],
        central: bool,
    ) -> Result<(), InvariantViolation> {
        if deltas.iter().all(|d| d.delta == 0) {
            return Ok(());
        }

        let mut pending: HashMap<NodeKey, Pending> = HashMap::with_capacity(order.preorder().len());

        // Own component changes are the same either way.
        for delta in deltas {
            let Some(component) = delta.component else {
                continue;
            };
            let entry = pending.entry(delta.anchor.key().clone()).or_default();
            match component {
                Component::Preamble => entry.preamble += delta.delta,
                Component::Text => entry.text += delta.delta,
                Component::Postamble => entry.postamble += delta.delta,
            }
        }

        let anchored: Vec<(usize, i64)> = deltas
            .iter()
            .filter(|d| d.delta != 0)
            .filter_map(|d| d.anchor.position(order).map(|pos| (pos, d.delta)))
            .collect();

        if central {
            let mut sums = FenwickTree::new(2 * order.event_count() + 2);
            for &(pos, delta) in &anchored {
                sums.update(pos, delta);
            }
            for key in order.preorder() {
                let Some((enter, leave)) = order.events(key) else {
                    continue;
                };
                let shift = sums.prefix_sum(2 * enter as isize - 1);
                let children = sums.query_range(2 * enter + 1, (2 * leave).saturating_sub(1));
                if shift != 0 || children != 0 {
                    let entry = pending.entry(key.clone()).or_default();
                    entry.shift += shift;
                    entry.children += children;
                }
            }
        } else {
            for &(pos, delta) in &anchored {
                for key in order.preorder() {
                    let Some((enter, leave)) = order.events(key) else {
                        continue;
                    };
                    if pos < 2 * enter {
                        pending.entry(key.clone()).or_default().shift += delta;
                    } else if pos > 2 * enter && pos < 2 * leave {
                        pending.entry(key.clone()).or_default().children += delta;
                    }
                }
            }
        }

        for key in order.preorder() {
            let (Some(change), Some(item)) = (pending.get(key), self.items.get_mut(key)) else {
                continue;
            };
            let key = key.clone();
            item.location = apply_signed(item.location, change.shift)
                .ok_or_else(|| negative(&key, "location"))?;
            item.children_length = apply_signed(item.children_length, change.children)
                .ok_or_else(|| negative(&key, "children"))?;
            item.preamble_length = apply_signed(item.preamble_length, change.preamble)
                .ok_or_else(|| negative(&key, Component::Preamble.name()))?;
            item.text_length = apply_signed(item.text_length, change.text)
                .ok_or_else(|| negative(&key, Component::Text.name()))?;
            item.postamble_length = apply_signed(item.postamble_length, change.postamble)
                .ok_or_else(|| negative(&key, Component::Postamble.name()))?;
        }
        Ok(())
    }

    /// Check the cache against `tree` and the stored text length.
    ///
    /// Every node has an entry, no entry outlives its node, the root starts
    /// at 0 and covers `stored_len`, every first child starts right after
    /// its parent's preamble and every next sibling starts where the
    /// previous one ends.
    pub fn verify(&self, tree: &DocumentTree, stored_len: usize) -> Result<(), InvariantViolation> {
        for key in self.items.keys() {
            if !tree.contains(key) {
                return Err(InvariantViolation::StaleCacheEntry(key.clone()));
            }
        }
        let root_key = tree.root_key();
        let root = self
            .items
            .get(root_key)
            .ok_or_else(|| InvariantViolation::MissingCacheEntry(root_key.clone()))?;
        if root.location != 0 {
            return Err(InvariantViolation::LocationMismatch {
                key: root_key.clone(),
                expected: 0,
                actual: root.location,
            });
        }
        if root.total() != stored_len {
            return Err(InvariantViolation::LengthMismatch {
                cached: root.total(),
                stored: stored_len,
            });
        }

        for key in tree.subtree_keys(root_key) {
            let item = self
                .items
                .get(&key)
                .ok_or_else(|| InvariantViolation::MissingCacheEntry(key.clone()))?;
            let mut expected = item.content_start();
            for child in tree.children(&key) {
                let child_item = self
                    .items
                    .get(child)
                    .ok_or_else(|| InvariantViolation::MissingCacheEntry(child.clone()))?;
                if child_item.location != expected {
                    return Err(InvariantViolation::LocationMismatch {
                        key: child.clone(),
                        expected,
                        actual: child_item.location,
                    });
                }
                expected = child_item.end();
            }
            if expected != item.text_start() {
                // The children do not add up to the cached children length.
                return Err(InvariantViolation::LocationMismatch {
                    key: key.clone(),
                    expected,
                    actual: item.text_start(),
                });
            }
        }
        Ok(())
    }
}

fn apply_signed(value: usize, delta: i64) -> Option<usize> {
    let result = value as i64 + delta;
    (result >= 0).then_some(result as usize)
}

fn negative(key: &NodeKey, component: &'static str) -> InvariantViolation {
    InvariantViolation::NegativeLength {
        key: key.clone(),
        component,
    }
}

//! Decorator view lifecycle.
//!
//! Decorators are inline nodes rendered by the view layer. The tracker keeps
//! one cache entry per decorator key and moves it through
//! `NeedsCreation → Unmounted | Mounted → NeedsDecorating → removed`.
//! Moving a decorator, even to another parent, keeps its view.

use std::collections::{BTreeMap, BTreeSet};

use crate::dirty::DirtySet;
use crate::node::NodeKey;
use crate::platform::DecoratorHost;
use crate::range_cache::RangeCache;
use crate::tree::DocumentTree;

/// Handle to a view created by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub u64);

/// Lifecycle state of one decorator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoratorCacheEntry {
    /// Known to the tracker, no view yet.
    NeedsCreation,
    /// View exists but is not attached.
    Unmounted(ViewId),
    /// View exists and is attached.
    Mounted(ViewId),
    /// Content changed; the view must be refreshed.
    NeedsDecorating(ViewId),
}

impl DecoratorCacheEntry {
    pub fn view(&self) -> Option<ViewId> {
        match *self {
            DecoratorCacheEntry::NeedsCreation => None,
            DecoratorCacheEntry::Unmounted(view)
            | DecoratorCacheEntry::Mounted(view)
            | DecoratorCacheEntry::NeedsDecorating(view) => Some(view),
        }
    }
}

/// Transition reported by a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoratorEvent {
    Created(NodeKey),
    NeedsDecorating(NodeKey),
    Moved { key: NodeKey, position: usize },
    Removed { key: NodeKey, view: Option<ViewId> },
}

#[derive(Debug, Clone, Default)]
pub struct DecoratorLifecycleTracker {
    entries: BTreeMap<NodeKey, DecoratorCacheEntry>,
    positions: BTreeMap<NodeKey, usize>,
    pending_moves: BTreeSet<NodeKey>,
    pending_destroy: Vec<(NodeKey, ViewId)>,
}

impl DecoratorLifecycleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, key: &NodeKey) -> Option<&DecoratorCacheEntry> {
        self.entries.get(key)
    }

    pub fn position(&self, key: &NodeKey) -> Option<usize> {
        self.positions.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeKey, &DecoratorCacheEntry)> {
        self.entries.iter()
    }

    /// Update entries after a pass from `prev` (if any) to `next`.
    ///
    /// Membership is decided against the full node map of `next`, never
    /// against the reconciled subtree.
    pub(crate) fn reconcile(
        &mut self,
        prev: Option<&DocumentTree>,
        next: &DocumentTree,
        dirty: &DirtySet,
        cache: &RangeCache,
    ) -> Vec<DecoratorEvent> {
        let mut events = Vec::new();

        let gone: Vec<NodeKey> = self
            .entries
            .keys()
            .filter(|key| !next.contains(key))
            .cloned()
            .collect();
        for key in gone {
            let view = self.entries.remove(&key).and_then(|entry| entry.view());
            self.positions.remove(&key);
            self.pending_moves.remove(&key);
            if let Some(view) = view {
                self.pending_destroy.push((key.clone(), view));
            }
            events.push(DecoratorEvent::Removed { key, view });
        }

        let mut candidates: Vec<NodeKey> = match prev {
            None => next.decorators(),
            Some(_) => dirty
                .keys()
                .filter(|key| next.get(key).is_some_and(|node| node.is_decorator()))
                .cloned()
                .collect(),
        };
        candidates.sort();

        for key in candidates {
            match self.entries.get_mut(&key) {
                None => {
                    self.entries
                        .insert(key.clone(), DecoratorCacheEntry::NeedsCreation);
                    events.push(DecoratorEvent::Created(key));
                }
                Some(entry) => {
                    if !dirty.is_user_initiated(&key) {
                        continue;
                    }
                    if let Some(view) = entry.view() {
                        if !matches!(entry, DecoratorCacheEntry::NeedsDecorating(_)) {
                            *entry = DecoratorCacheEntry::NeedsDecorating(view);
                            events.push(DecoratorEvent::NeedsDecorating(key));
                        }
                    }
                }
            }
        }

        for key in self.entries.keys() {
            let Some(item) = cache.get(key) else {
                continue;
            };
            if self.positions.insert(key.clone(), item.location) != Some(item.location) {
                self.pending_moves.insert(key.clone());
                events.push(DecoratorEvent::Moved {
                    key: key.clone(),
                    position: item.location,
                });
            }
        }

        if !events.is_empty() {
            tracing::trace!(target: "weaver::reconcile", events = events.len(), "decorator transitions");
        }
        events
    }

    /// The host created a view for `key`.
    pub fn view_created(&mut self, key: &NodeKey, view: ViewId) -> bool {
        self.transition(key, |entry| match entry {
            DecoratorCacheEntry::NeedsCreation => Some(DecoratorCacheEntry::Unmounted(view)),
            _ => None,
        })
    }

    pub fn mounted(&mut self, key: &NodeKey) -> bool {
        self.transition(key, |entry| match entry {
            DecoratorCacheEntry::Unmounted(view) => Some(DecoratorCacheEntry::Mounted(view)),
            _ => None,
        })
    }

    pub fn unmounted(&mut self, key: &NodeKey) -> bool {
        self.transition(key, |entry| match entry {
            DecoratorCacheEntry::Mounted(view) => Some(DecoratorCacheEntry::Unmounted(view)),
            _ => None,
        })
    }

    /// The host refreshed the view of `key`.
    pub fn decorated(&mut self, key: &NodeKey) -> bool {
        self.transition(key, |entry| match entry {
            DecoratorCacheEntry::NeedsDecorating(view) => Some(DecoratorCacheEntry::Mounted(view)),
            _ => None,
        })
    }

    fn transition(
        &mut self,
        key: &NodeKey,
        next: impl FnOnce(DecoratorCacheEntry) -> Option<DecoratorCacheEntry>,
    ) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        match next(*entry) {
            Some(state) => {
                *entry = state;
                true
            }
            None => false,
        }
    }

    /// Flush pending work to `host`: destroy removed views, create and place
    /// new ones, refresh changed ones and reposition moved ones.
    pub fn drive<H: DecoratorHost>(&mut self, host: &mut H, tree: &DocumentTree) {
        for (key, view) in self.pending_destroy.drain(..) {
            host.destroy(&key, view);
        }

        let keys: Vec<NodeKey> = self.entries.keys().cloned().collect();
        for key in keys {
            let Some(decorator) = tree.get(&key).and_then(|node| node.as_decorator()) else {
                continue;
            };
            let position = self.positions.get(&key).copied().unwrap_or(0);
            match self.entries.get(&key).copied() {
                Some(DecoratorCacheEntry::NeedsCreation) => {
                    let view = host.create_view(&key, decorator);
                    self.view_created(&key, view);
                    host.reposition(&key, view, position);
                    self.mounted(&key);
                    self.pending_moves.remove(&key);
                }
                Some(DecoratorCacheEntry::NeedsDecorating(view)) => {
                    host.redecorate(&key, view, decorator);
                    self.decorated(&key);
                }
                _ => {}
            }
            if self.pending_moves.remove(&key) {
                if let Some(view) = self.entries.get(&key).and_then(|entry| entry.view()) {
                    host.reposition(&key, view, position);
                }
            }
        }
    }
}

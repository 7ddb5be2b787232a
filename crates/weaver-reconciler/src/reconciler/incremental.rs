//! Stages that keep the tree structure: attribute-only, single node and
//! keyed multi-node diff.

use crate::dirty::DirtySet;
use crate::error::{InvariantViolation, Result};
use crate::node::{Node, NodeKey};
use crate::range_cache::{Anchor, Component, LengthDelta, RangeCacheItem};
use crate::text::{Fragment, TextEdit};
use crate::tree::{DocumentOrder, DocumentTree};

use super::Reconciler;
use super::render::{char_len, index_entry_length};

/// Dirty keys present in both trees, sorted for deterministic output.
fn shared_dirty_keys(prev: &DocumentTree, next: &DocumentTree, dirty: &DirtySet) -> Vec<NodeKey> {
    let mut keys: Vec<NodeKey> = dirty
        .keys()
        .filter(|key| prev.contains(key) && next.contains(key))
        .cloned()
        .collect();
    keys.sort();
    keys
}

/// Whether `key` produces the same flat strings in both trees.
fn flat_strings_equal(prev: &DocumentTree, next: &DocumentTree, key: &NodeKey) -> bool {
    let (Some(before), Some(after)) = (prev.get(key), next.get(key)) else {
        return false;
    };
    before.preamble() == after.preamble()
        && before.own_text() == after.own_text()
        && prev.postamble(key) == next.postamble(key)
}

/// Char counts of the common prefix and suffix of `a` and `b`.
///
/// The suffix never overlaps the prefix in either string.
pub(super) fn common_affixes(a: &str, b: &str) -> (usize, usize) {
    let prefix = a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count();
    let max_suffix = char_len(a).min(char_len(b)) - prefix;
    let suffix = a
        .chars()
        .rev()
        .zip(b.chars().rev())
        .take(max_suffix)
        .take_while(|(x, y)| x == y)
        .count();
    (prefix, suffix)
}

fn slice_chars(s: &str, range: std::ops::Range<usize>) -> String {
    s.chars().skip(range.start).take(range.len()).collect()
}

impl Reconciler {
    fn cached(&self, key: &NodeKey) -> Result<RangeCacheItem> {
        self.cache
            .get(key)
            .copied()
            .ok_or_else(|| InvariantViolation::MissingCacheEntry(key.clone()).into())
    }

    /// Stage 1. `None` when some dirty node changed a flat string.
    pub(super) fn attribute_only_edits(
        &self,
        prev: &DocumentTree,
        next: &DocumentTree,
        dirty: &DirtySet,
    ) -> Result<Option<Vec<TextEdit>>> {
        let keys = shared_dirty_keys(prev, next, dirty);
        if !keys.iter().all(|key| flat_strings_equal(prev, next, key)) {
            return Ok(None);
        }

        let mut edits = Vec::new();
        for key in keys {
            let (Some(before), Some(after)) = (prev.get(&key), next.get(&key)) else {
                continue;
            };
            let attributes = after.own_attributes();
            if before.own_attributes() == attributes || after.own_text().is_empty() {
                continue;
            }
            let item = self.cached(&key)?;
            edits.push(TextEdit::SetAttributes {
                range: item.text_start()..item.postamble_start(),
                attributes,
            });
        }
        edits.sort_by(|a, b| b.range().start.cmp(&a.range().start));
        tracing::trace!(target: "weaver::reconcile", edits = edits.len(), "attribute-only");
        Ok(Some(edits))
    }

    /// Stage 2. `None` when `key` is not a text node whose text changed.
    pub(super) fn single_node_edits(
        &mut self,
        prev: &DocumentTree,
        next: &DocumentTree,
        key: &NodeKey,
    ) -> Result<Option<Vec<TextEdit>>> {
        let (Some(before), Some(after)) = (
            prev.get(key).and_then(Node::as_text),
            next.get(key).and_then(Node::as_text),
        ) else {
            return Ok(None);
        };
        if before.text == after.text {
            return Ok(None);
        }

        let item = self.cached(key)?;
        let start = item.text_start();
        let attributes = after.attributes();
        let edit = if before.attributes() == attributes {
            let (prefix, suffix) = common_affixes(&before.text, &after.text);
            let old_len = char_len(&before.text);
            let new_len = char_len(&after.text);
            TextEdit::Replace {
                range: start + prefix..start + old_len - suffix,
                fragments: vec![Fragment::new(
                    slice_chars(&after.text, prefix..new_len - suffix),
                    attributes,
                )],
            }
        } else {
            TextEdit::Replace {
                range: start..start + item.text_length,
                fragments: vec![Fragment::new(after.text.clone(), attributes)],
            }
        };

        let delta = edit.length_delta();
        let order = DocumentOrder::of(prev);
        self.cache.apply_deltas(
            &order,
            &[LengthDelta::own(Anchor::Enter(key.clone()), Component::Text, delta)],
            self.config.central_aggregation,
        )?;
        self.index
            .update_node_length(key, index_entry_length(next, key));

        tracing::trace!(target: "weaver::reconcile", %key, delta, "single-node");
        Ok(Some(vec![edit]))
    }

    /// Stage 3. Per-node component edits, applied back to front.
    pub(super) fn keyed_diff_edits(
        &mut self,
        prev: &DocumentTree,
        next: &DocumentTree,
        dirty: &DirtySet,
    ) -> Result<Vec<TextEdit>> {
        let order = DocumentOrder::of(prev);
        // (start, end, anchor position, edit)
        let mut planned: Vec<(usize, usize, usize, TextEdit)> = Vec::new();
        let mut deltas = Vec::new();
        let keys = shared_dirty_keys(prev, next, dirty);

        for key in &keys {
            let (Some(before), Some(after)) = (prev.get(key), next.get(key)) else {
                continue;
            };
            let item = self.cached(key)?;
            let (enter, leave) = order
                .events(key)
                .ok_or_else(|| InvariantViolation::MissingCacheEntry(key.clone()))?;

            if before.preamble() != after.preamble() {
                let range = item.location..item.content_start();
                let edit = TextEdit::Replace {
                    range: range.clone(),
                    fragments: vec![Fragment::plain(after.preamble())],
                };
                deltas.push(LengthDelta::own(
                    Anchor::Enter(key.clone()),
                    Component::Preamble,
                    edit.length_delta(),
                ));
                planned.push((range.start, range.end, 2 * enter, edit));
            }

            let attributes = after.own_attributes();
            let range = item.text_start()..item.postamble_start();
            if before.own_text() != after.own_text() {
                let edit = TextEdit::Replace {
                    range: range.clone(),
                    fragments: vec![Fragment::new(after.own_text(), attributes)],
                };
                deltas.push(LengthDelta::own(
                    Anchor::Enter(key.clone()),
                    Component::Text,
                    edit.length_delta(),
                ));
                planned.push((range.start, range.end, 2 * enter, edit));
            } else if before.own_attributes() != attributes && !range.is_empty() {
                planned.push((
                    range.start,
                    range.end,
                    2 * enter,
                    TextEdit::SetAttributes {
                        range: range.clone(),
                        attributes,
                    },
                ));
            }

            let (old_post, new_post) = (prev.postamble(key), next.postamble(key));
            if old_post != new_post {
                let range = item.postamble_start()..item.end();
                let edit = TextEdit::Replace {
                    range: range.clone(),
                    fragments: vec![Fragment::plain(new_post)],
                };
                deltas.push(LengthDelta::own(
                    Anchor::Leave(key.clone()),
                    Component::Postamble,
                    edit.length_delta(),
                ));
                planned.push((range.start, range.end, 2 * leave, edit));
            }
        }

        // Back to front, so every range is still valid when applied.
        planned.sort_by(|a, b| (b.0, b.1, b.2).cmp(&(a.0, a.1, a.2)));

        self.cache
            .apply_deltas(&order, &deltas, self.config.central_aggregation)?;
        for key in &keys {
            self.index
                .update_node_length(key, index_entry_length(next, key));
        }

        tracing::trace!(
            target: "weaver::reconcile",
            nodes = keys.len(),
            edits = planned.len(),
            central = self.config.central_aggregation,
            "keyed diff"
        );
        Ok(planned.into_iter().map(|(_, _, _, edit)| edit).collect())
    }
}

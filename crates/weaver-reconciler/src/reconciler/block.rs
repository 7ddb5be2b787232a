//! Structural stages: the insert-block fast path and subtree rebuild.

use std::collections::HashSet;
use std::ops::Range;

use crate::dirty::DirtySet;
use crate::error::{InvariantViolation, Result};
use crate::node::{Attributes, NodeKey};
use crate::range_cache::{Anchor, Component, LengthDelta};
use crate::text::{Fragment, TextEdit, TextStorage, push_fragment};
use crate::tree::{DocumentOrder, DocumentTree};

use super::Reconciler;
use super::diff::StructuralDiff;
use super::render::{char_len, register_document, render_subtree};

/// A contiguous run of brand-new children inserted into one parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct InsertBlockPlan {
    pub parent: NodeKey,
    /// Index of the first new child in the next child list.
    pub index: usize,
    pub inserted: Vec<NodeKey>,
}

impl InsertBlockPlan {
    /// The plan, when the update is nothing but one such insertion.
    pub fn detect(
        prev: &DocumentTree,
        next: &DocumentTree,
        diff: &StructuralDiff,
        dirty: &DirtySet,
    ) -> Option<Self> {
        if diff.changed_parents.len() != 1 || !diff.removed.is_empty() || !diff.moved.is_empty() {
            return None;
        }
        let parent = diff.changed_parents.iter().next()?.clone();
        let before = prev.children(&parent);
        let after = next.children(&parent);
        if after.len() <= before.len() {
            return None;
        }
        let run = after.len() - before.len();
        let index = before
            .iter()
            .zip(after)
            .take_while(|(a, b)| a == b)
            .count();
        if after[index + run..] != before[index..] {
            return None;
        }
        let inserted = after[index..index + run].to_vec();

        let mut fresh: HashSet<NodeKey> = HashSet::new();
        for child in &inserted {
            for key in next.subtree_keys(child) {
                if prev.contains(&key) {
                    return None;
                }
                fresh.insert(key);
            }
        }
        if fresh != diff.added {
            return None;
        }
        if !dirty.keys().all(|key| key == &parent || fresh.contains(key)) {
            return None;
        }
        let parent_unchanged = prev.preamble(&parent) == next.preamble(&parent)
            && prev.postamble(&parent) == next.postamble(&parent);
        parent_unchanged.then_some(Self {
            parent,
            index,
            inserted,
        })
    }
}

/// Lowest node whose subtree covers every structural change in both trees.
pub(super) fn rebuild_root(
    prev: &DocumentTree,
    next: &DocumentTree,
    diff: &StructuralDiff,
    dirty: &DirtySet,
) -> NodeKey {
    let (before, after) = diff.touch_points(prev, next, dirty);
    let mut candidate = next.lowest_common_ancestor(&after);
    loop {
        let covers_previous = prev.contains(&candidate)
            && before
                .iter()
                .all(|key| prev.is_self_or_ancestor(&candidate, key));
        if covers_previous {
            return candidate;
        }
        match next.parent(&candidate) {
            Some(parent) => candidate = parent.clone(),
            None => return next.root_key().clone(),
        }
    }
}

impl Reconciler {
    /// Insert the new run with one edit and shift everything after it.
    pub(super) fn insert_block_edits(
        &mut self,
        prev: &DocumentTree,
        next: &DocumentTree,
        plan: &InsertBlockPlan,
    ) -> Result<Vec<TextEdit>> {
        let order = DocumentOrder::of(prev);
        let before = prev.children(&plan.parent);
        let mut fragments = Vec::new();
        let mut deltas = Vec::new();

        // Chars emitted ahead of the new run: a separator gained by the
        // previous last child.
        let mut lead = 0;
        let (range, anchor) = if let Some(following) = before.get(plan.index) {
            let item = self
                .cache
                .get(following)
                .ok_or_else(|| InvariantViolation::MissingCacheEntry(following.clone()))?;
            (item.location..item.location, Anchor::BeforeEnter(following.clone()))
        } else if let Some(last) = before.last() {
            // Appending: the previous last child may gain a separator.
            let item = self
                .cache
                .get(last)
                .ok_or_else(|| InvariantViolation::MissingCacheEntry(last.clone()))?;
            let old_post = prev.postamble(last);
            let new_post = next.postamble(last);
            push_fragment(&mut fragments, new_post, Attributes::plain());
            lead = char_len(new_post);
            let post_delta = char_len(new_post) as i64 - char_len(old_post) as i64;
            if post_delta != 0 {
                deltas.push(LengthDelta::own(
                    Anchor::Leave(last.clone()),
                    Component::Postamble,
                    post_delta,
                ));
            }
            (item.postamble_start()..item.end(), Anchor::AfterLeave(last.clone()))
        } else {
            let item = self
                .cache
                .get(&plan.parent)
                .ok_or_else(|| InvariantViolation::MissingCacheEntry(plan.parent.clone()))?;
            (item.content_start()..item.content_start(), Anchor::AfterEnter(plan.parent.clone()))
        };

        let mut cursor = range.start + lead;
        let mut items = Vec::new();
        let mut run_length = 0;
        for child in &plan.inserted {
            let subtree = render_subtree(next, child, cursor);
            cursor += subtree.length;
            run_length += subtree.length;
            for fragment in subtree.fragments {
                push_fragment(&mut fragments, &fragment.text, fragment.attributes);
            }
            items.extend(subtree.items);
        }
        deltas.push(LengthDelta::span(anchor, run_length as i64));

        self.cache
            .apply_deltas(&order, &deltas, self.config.central_aggregation)?;
        for (key, item) in items {
            self.cache.insert(key, item);
        }
        register_document(next, &mut self.index);

        tracing::trace!(
            target: "weaver::reconcile",
            parent = %plan.parent,
            index = plan.index,
            inserted = plan.inserted.len(),
            run_length,
            "insert block"
        );
        Ok(vec![TextEdit::Replace { range, fragments }])
    }

    /// Re-render the subtree at `root` and splice the part that differs over
    /// the old range. A reorder that leaves the text and attributes as they
    /// were produces no edit at all.
    pub(super) fn block_rebuild_edits<S: TextStorage>(
        &mut self,
        prev: &DocumentTree,
        next: &DocumentTree,
        root: &NodeKey,
        storage: &S,
    ) -> Result<Vec<TextEdit>> {
        let old = *self
            .cache
            .get(root)
            .ok_or_else(|| InvariantViolation::MissingCacheEntry(root.clone()))?;
        let subtree = render_subtree(next, root, old.location);
        let edit = changed_span(storage, old.location..old.end(), &subtree.fragments);

        if root != prev.root_key() {
            let order = DocumentOrder::of(prev);
            let delta = subtree.length as i64 - old.total() as i64;
            self.cache.apply_deltas(
                &order,
                &[LengthDelta::span(Anchor::Enter(root.clone()), delta)],
                self.config.central_aggregation,
            )?;
        }
        for key in prev.subtree_keys(root) {
            self.cache.remove(&key);
        }
        for (key, item) in subtree.items {
            self.cache.insert(key, item);
        }
        register_document(next, &mut self.index);

        tracing::trace!(
            target: "weaver::reconcile",
            %root,
            old_length = old.total(),
            new_length = subtree.length,
            replaced = edit.as_ref().map_or(0, |edit| edit.range().len()),
            "block rebuild"
        );
        Ok(edit.into_iter().collect())
    }
}

/// Chars of `range` in `storage`, each with its attributes.
fn stored_chars<S: TextStorage>(
    storage: &S,
    range: Range<usize>,
) -> Option<Vec<(char, Attributes)>> {
    let text = storage.slice(range.clone())?;
    let runs = storage.attribute_runs();
    let mut run = runs.partition_point(|run| run.range.end <= range.start);
    let mut out = Vec::with_capacity(range.len());
    for (offset, c) in range.zip(text.chars()) {
        while runs.get(run).is_some_and(|r| r.range.end <= offset) {
            run += 1;
        }
        out.push((c, runs.get(run)?.attributes.clone()));
    }
    Some(out)
}

/// The single replace turning `range` of `storage` into `fragments`, with the
/// common attributed prefix and suffix left untouched. `None` when the two
/// already agree.
fn changed_span<S: TextStorage>(
    storage: &S,
    range: Range<usize>,
    fragments: &[Fragment],
) -> Option<TextEdit> {
    let Some(old) = stored_chars(storage, range.clone()) else {
        return Some(TextEdit::Replace {
            range,
            fragments: fragments.to_vec(),
        });
    };
    let new: Vec<(char, &Attributes)> = fragments
        .iter()
        .flat_map(|fragment| fragment.text.chars().map(|c| (c, &fragment.attributes)))
        .collect();

    let same = |(a, x): &(char, Attributes), (b, y): &(char, &Attributes)| a == b && x == *y;
    let prefix = old.iter().zip(&new).take_while(|(a, b)| same(*a, *b)).count();
    if prefix == old.len() && prefix == new.len() {
        return None;
    }
    let suffix = old
        .iter()
        .rev()
        .zip(new.iter().rev())
        .take(old.len().min(new.len()) - prefix)
        .take_while(|(a, b)| same(*a, *b))
        .count();

    let mut replacement = Vec::new();
    let mut buf = [0u8; 4];
    for (c, attributes) in &new[prefix..new.len() - suffix] {
        push_fragment(&mut replacement, c.encode_utf8(&mut buf), (*attributes).clone());
    }
    Some(TextEdit::Replace {
        range: range.start + prefix..range.end - suffix,
        fragments: replacement,
    })
}

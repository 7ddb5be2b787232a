//! Reconciliation: turn the flat text of one tree version into the next.
//!
//! The reconciler owns the range cache, the offset index and the decorator
//! tracker. Each pass picks the cheapest stage whose preconditions hold:
//!
//! 1. attribute-only: no flat string changed, only attributes
//! 2. single node: one dirty leaf changed its text
//! 3. keyed diff: several dirty nodes, no structural change
//! 4. block rebuild: re-render the lowest subtree covering every structural
//!    change (with the insert-block fast path tried first)
//! 5. full rebuild: first render, optimizations disabled, or nothing else fits
//!
//! The full rebuild is the reference. With strict mode on every other stage
//! is checked against it.

mod block;
mod diff;
mod incremental;
pub mod render;
#[cfg(test)]
mod tests;

use std::time::Duration;

use web_time::Instant;

use crate::config::ReconcilerConfig;
use crate::decorator::{DecoratorEvent, DecoratorLifecycleTracker};
use crate::dirty::DirtySet;
use crate::error::{InvariantViolation, ReconcileError, Result};
use crate::offset_index::NodeOffsetIndex;
use crate::range_cache::RangeCache;
use crate::text::{Fragment, TextEdit, TextStorage, runs_from_fragments};
use crate::tree::DocumentTree;

use self::diff::StructuralDiff;
use self::render::{register_document, render_document};

/// Which stage produced a pass's edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconcileStage {
    AttributeOnly,
    SingleNode,
    KeyedDiff,
    InsertBlock,
    BlockRebuild,
    FullRebuild,
}

impl ReconcileStage {
    pub fn as_str(self) -> &'static str {
        match self {
            ReconcileStage::AttributeOnly => "attribute-only",
            ReconcileStage::SingleNode => "single-node",
            ReconcileStage::KeyedDiff => "keyed-diff",
            ReconcileStage::InsertBlock => "insert-block",
            ReconcileStage::BlockRebuild => "block-rebuild",
            ReconcileStage::FullRebuild => "full-rebuild",
        }
    }
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone)]
pub struct ReconcileOutput {
    pub stage: ReconcileStage,
    /// Edits in application order. Each edit's range is in the coordinates
    /// of the text after every earlier edit was applied.
    pub edits: Vec<TextEdit>,
    pub decorator_events: Vec<DecoratorEvent>,
    pub elapsed: Duration,
}

/// Per-editor reconciliation state.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    config: ReconcilerConfig,
    cache: RangeCache,
    index: NodeOffsetIndex,
    decorators: DecoratorLifecycleTracker,
}

impl Reconciler {
    pub fn new(config: ReconcilerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ReconcilerConfig) {
        self.config = config;
    }

    pub fn range_cache(&self) -> &RangeCache {
        &self.cache
    }

    pub fn offset_index(&self) -> &NodeOffsetIndex {
        &self.index
    }

    pub fn decorators(&self) -> &DecoratorLifecycleTracker {
        &self.decorators
    }

    pub fn decorators_mut(&mut self) -> &mut DecoratorLifecycleTracker {
        &mut self.decorators
    }

    /// Reconcile `storage` (which must hold the flat text of `prev`) to `next`.
    ///
    /// `prev` is `None` for the first render. On error the reconciler and
    /// the storage may be partially updated; callers that need atomicity
    /// reconcile on clones and keep the originals on failure.
    pub fn reconcile<S: TextStorage>(
        &mut self,
        prev: Option<&DocumentTree>,
        next: &DocumentTree,
        dirty: &DirtySet,
        storage: &mut S,
    ) -> Result<ReconcileOutput> {
        let started = Instant::now();

        if let Some(prev) = prev {
            if let Some(orphan) = dirty
                .keys()
                .find(|key| !prev.contains(key) && !next.contains(key))
            {
                return Err(InvariantViolation::OrphanedDirtyKey(orphan.clone()).into());
            }
        }

        let incremental_base = prev.filter(|_| self.config.optimized_path && !self.cache.is_empty());
        let (stage, edits) = match incremental_base {
            Some(prev) => self.reconcile_incremental(prev, next, dirty, storage)?,
            None => {
                if prev.is_some() && !self.config.optimized_path {
                    tracing::trace!(target: "weaver::reconcile", "optimized path disabled");
                }
                (ReconcileStage::FullRebuild, self.full_rebuild(next, storage))
            }
        };

        for edit in &edits {
            storage.apply(edit)?;
        }
        self.index.clear_all_dirty();

        let decorator_events = self.decorators.reconcile(prev, next, dirty, &self.cache);

        if self.config.validate_invariants {
            self.cache.verify(next, storage.len_chars())?;
        }
        if self.config.strict_mode && stage != ReconcileStage::FullRebuild {
            self.strict_check(stage, next, storage)?;
        }

        let elapsed = started.elapsed();
        tracing::debug!(
            target: "weaver::reconcile",
            stage = stage.as_str(),
            dirty = dirty.len(),
            edits = edits.len(),
            decorator_events = decorator_events.len(),
            elapsed_us = elapsed.as_micros() as u64,
            "reconciled"
        );

        Ok(ReconcileOutput {
            stage,
            edits,
            decorator_events,
            elapsed,
        })
    }

    fn reconcile_incremental<S: TextStorage>(
        &mut self,
        prev: &DocumentTree,
        next: &DocumentTree,
        dirty: &DirtySet,
        storage: &S,
    ) -> Result<(ReconcileStage, Vec<TextEdit>)> {
        let diff = StructuralDiff::compute(prev, next, dirty);

        if !diff.is_structural() {
            if let Some(edits) = self.attribute_only_edits(prev, next, dirty)? {
                return Ok((ReconcileStage::AttributeOnly, edits));
            }

            for key in dirty.keys() {
                self.index.mark_dirty(key);
            }
            if let (true, Some(key)) = self.index.can_use_fast_path() {
                let key = key.clone();
                if let Some(edits) = self.single_node_edits(prev, next, &key)? {
                    return Ok((ReconcileStage::SingleNode, edits));
                }
            }

            if self.config.keyed_diff {
                let edits = self.keyed_diff_edits(prev, next, dirty)?;
                return Ok((ReconcileStage::KeyedDiff, edits));
            }
        } else if self.config.insert_block_fast_path {
            if let Some(plan) = block::InsertBlockPlan::detect(prev, next, &diff, dirty) {
                let edits = self.insert_block_edits(prev, next, &plan)?;
                return Ok((ReconcileStage::InsertBlock, edits));
            }
        }

        if self.config.block_rebuild {
            let root = block::rebuild_root(prev, next, &diff, dirty);
            tracing::trace!(target: "weaver::reconcile", root = %root, "block rebuild root");
            let edits = self.block_rebuild_edits(prev, next, &root, storage)?;
            return Ok((ReconcileStage::BlockRebuild, edits));
        }

        tracing::warn!(
            target: "weaver::reconcile",
            structural = diff.is_structural(),
            dirty = dirty.len(),
            "no incremental stage enabled for this update, falling back to full rebuild"
        );
        Ok((ReconcileStage::FullRebuild, self.full_rebuild(next, storage)))
    }

    /// Replace the whole stored text with a fresh render of `next`.
    fn full_rebuild<S: TextStorage>(&mut self, next: &DocumentTree, storage: &S) -> Vec<TextEdit> {
        let rendered = render_document(next);
        self.cache = rendered.cache;
        register_document(next, &mut self.index);

        let old_len = storage.len_chars();
        if old_len == 0 && rendered.fragments.is_empty() {
            return Vec::new();
        }
        vec![TextEdit::Replace {
            range: 0..old_len,
            fragments: rendered.fragments,
        }]
    }

    /// Compare the stored result with a legacy full render of `next`.
    fn strict_check<S: TextStorage>(
        &self,
        stage: ReconcileStage,
        next: &DocumentTree,
        storage: &S,
    ) -> Result<()> {
        let oracle = render_document(next);
        let detail = strict_mismatch(
            &oracle.fragments,
            &oracle.cache,
            &self.cache,
            &self.index,
            next,
            storage,
        );
        let Some(detail) = detail else {
            return Ok(());
        };

        tracing::error!(
            target: "weaver::reconcile",
            stage = stage.as_str(),
            %detail,
            "optimized reconciliation disagrees with full rebuild"
        );
        if self.config.panic_on_mismatch {
            panic!("strict mode mismatch in {}: {detail}", stage.as_str());
        }
        Err(ReconcileError::StrictModeMismatch {
            stage: stage.as_str(),
            detail,
        })
    }
}

fn strict_mismatch<S: TextStorage>(
    fragments: &[Fragment],
    oracle_cache: &RangeCache,
    cache: &RangeCache,
    index: &NodeOffsetIndex,
    next: &DocumentTree,
    storage: &S,
) -> Option<String> {
    let expected: String = fragments.iter().map(|f| f.text.as_str()).collect();
    let actual = storage.to_string();
    if expected != actual {
        let at = expected
            .chars()
            .zip(actual.chars())
            .take_while(|(a, b)| a == b)
            .count();
        return Some(format!(
            "text differs at char {at}: expected {expected:?}, got {actual:?}"
        ));
    }

    let expected_runs = runs_from_fragments(fragments);
    let actual_runs = storage.attribute_runs();
    if expected_runs != actual_runs {
        return Some(format!(
            "attribute runs differ: expected {expected_runs:?}, got {actual_runs:?}"
        ));
    }

    if oracle_cache != cache {
        let mut keys = next.subtree_keys(next.root_key());
        keys.retain(|key| oracle_cache.get(key) != cache.get(key));
        return Some(match keys.first() {
            Some(key) => format!(
                "range cache differs at {key}: expected {:?}, got {:?}",
                oracle_cache.get(key),
                cache.get(key)
            ),
            None => "range cache holds stale entries".to_string(),
        });
    }

    for key in next.subtree_keys(next.root_key()) {
        let location = oracle_cache.get(&key).map(|item| item.location);
        if index.get_node_position(&key) != location {
            return Some(format!(
                "offset index places {key} at {:?}, expected {location:?}",
                index.get_node_position(&key)
            ));
        }
    }
    None
}

//! The editor session: committed document state plus everything needed to
//! move it forward.
//!
//! Updates are atomic. `update` runs the closure against a working copy,
//! reconciles clones of the storage and the reconciler state, and swaps the
//! results in only when every step succeeded.

use crate::actions::EditorAction;
use crate::config::ReconcilerConfig;
use crate::dirty::DirtySet;
use crate::error::Result;
use crate::execute::execute_action;
use crate::history::{History, Snapshot, UndoManager};
use crate::node::NodeKey;
use crate::offset_index::NodeOffsetIndex;
use crate::platform::DecoratorHost;
use crate::range_cache::RangeCache;
use crate::reconciler::{ReconcileOutput, Reconciler};
use crate::selection::{Point, Selection, SelectionCoordinateTranslator, remap_offset};
use crate::text::{EditorRope, TextEdit, TextStorage};
use crate::transaction::{Committed, Transaction};
use crate::tree::DocumentTree;

/// Read-only view of committed editor state.
#[derive(Debug, Clone, Copy)]
pub struct EditorState<'a, S> {
    tree: &'a DocumentTree,
    storage: &'a S,
    reconciler: &'a Reconciler,
    selection: Option<&'a Selection>,
}

impl<'a, S: TextStorage> EditorState<'a, S> {
    pub fn tree(&self) -> &'a DocumentTree {
        self.tree
    }

    pub fn storage(&self) -> &'a S {
        self.storage
    }

    pub fn text(&self) -> String {
        self.storage.to_string()
    }

    pub fn selection(&self) -> Option<&'a Selection> {
        self.selection
    }

    pub fn range_cache(&self) -> &'a RangeCache {
        self.reconciler.range_cache()
    }

    pub fn offset_index(&self) -> &'a NodeOffsetIndex {
        self.reconciler.offset_index()
    }

    pub fn translator(&self) -> SelectionCoordinateTranslator<'a> {
        SelectionCoordinateTranslator::new(
            self.tree,
            self.reconciler.range_cache(),
            self.reconciler.offset_index(),
        )
    }
}

/// One editor: a document, its flat text and the state that keeps them in sync.
#[derive(Debug, Clone)]
pub struct Editor<S = EditorRope> {
    tree: DocumentTree,
    storage: S,
    reconciler: Reconciler,
    selection: Option<Selection>,
    history: History,
    next_key: u64,
    last_output: Option<ReconcileOutput>,
}

impl Editor<EditorRope> {
    /// Editor holding one empty paragraph with the caret inside it.
    pub fn new(config: ReconcilerConfig) -> Result<Self> {
        let empty = DocumentTree::new();
        let mut txn = Transaction::new(empty.clone(), None, 0);
        let paragraph = txn.create_paragraph();
        let root = txn.root();
        txn.append(&root, &paragraph)?;
        let committed = txn.commit(&empty);

        let mut editor = Self::with_storage(config, committed.tree, EditorRope::new())?;
        editor.next_key = committed.next_key;
        editor.selection = Some(Selection::caret(Point::element(paragraph, 0)));
        Ok(editor)
    }

    /// Editor over an existing tree, e.g. one built with `TreeBuilder`.
    pub fn with_document(config: ReconcilerConfig, tree: DocumentTree) -> Result<Self> {
        Self::with_storage(config, tree, EditorRope::new())
    }
}

impl<S: TextStorage + Clone> Editor<S> {
    /// Editor rendering into `storage`, which must be empty.
    pub fn with_storage(config: ReconcilerConfig, tree: DocumentTree, mut storage: S) -> Result<Self> {
        let history = History::new(config.history_depth);
        let mut reconciler = Reconciler::new(config);
        let output = reconciler.reconcile(None, &tree, &DirtySet::new(), &mut storage)?;
        Ok(Self {
            tree,
            storage,
            reconciler,
            selection: None,
            history,
            next_key: 0,
            last_output: Some(output),
        })
    }

    pub fn config(&self) -> &ReconcilerConfig {
        self.reconciler.config()
    }

    pub fn set_config(&mut self, config: ReconcilerConfig) {
        self.history.set_max_steps(config.history_depth);
        self.reconciler.set_config(config);
    }

    pub fn tree(&self) -> &DocumentTree {
        &self.tree
    }

    pub fn text(&self) -> String {
        self.storage.to_string()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Output of the last reconciliation pass.
    pub fn last_output(&self) -> Option<&ReconcileOutput> {
        self.last_output.as_ref()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Run `f` against committed state.
    pub fn read<R>(&self, f: impl FnOnce(&EditorState<'_, S>) -> R) -> R {
        f(&self.state())
    }

    fn state(&self) -> EditorState<'_, S> {
        EditorState {
            tree: &self.tree,
            storage: &self.storage,
            reconciler: &self.reconciler,
            selection: self.selection.as_ref(),
        }
    }

    /// Replace the selection without touching the document. An invalid
    /// selection is ignored and `false` returned.
    pub fn set_selection(&mut self, selection: Option<Selection>) -> bool {
        if let Some(selection) = &selection {
            if !selection.is_valid_in(&self.tree) {
                return false;
            }
        }
        self.selection = selection;
        true
    }

    /// Mutate the document. On any error the editor keeps its previous state.
    pub fn update<R>(&mut self, f: impl FnOnce(&mut Transaction) -> Result<R>) -> Result<R> {
        let mut txn = Transaction::new(self.tree.clone(), self.selection.clone(), self.next_key);
        let value = f(&mut txn)?;
        let committed = txn.commit(&self.tree);

        if committed.dirty.is_empty() {
            self.next_key = committed.next_key;
            if committed.selection_set {
                self.set_selection(committed.selection);
            }
            return Ok(value);
        }

        let before = Snapshot {
            tree: self.tree.clone(),
            selection: self.selection.clone(),
        };
        let next_key = committed.next_key;
        self.commit(committed)?;
        self.next_key = next_key;
        self.history.record(before);
        Ok(value)
    }

    /// Restore the state before the last update. `false` when there is none.
    pub fn undo(&mut self) -> Result<bool> {
        let Some(snapshot) = self.history.pop_undo() else {
            return Ok(false);
        };
        let current = Snapshot {
            tree: self.tree.clone(),
            selection: self.selection.clone(),
        };
        match self.restore(&snapshot) {
            Ok(()) => {
                self.history.push_redo(current);
                Ok(true)
            }
            Err(err) => {
                self.history.push_undo(snapshot);
                Err(err)
            }
        }
    }

    pub fn redo(&mut self) -> Result<bool> {
        let Some(snapshot) = self.history.pop_redo() else {
            return Ok(false);
        };
        let current = Snapshot {
            tree: self.tree.clone(),
            selection: self.selection.clone(),
        };
        match self.restore(&snapshot) {
            Ok(()) => {
                self.history.push_undo(current);
                Ok(true)
            }
            Err(err) => {
                self.history.push_redo(snapshot);
                Err(err)
            }
        }
    }

    fn restore(&mut self, snapshot: &Snapshot) -> Result<()> {
        let dirty = DirtySet::between(&self.tree, &snapshot.tree);
        tracing::debug!(target: "weaver::reconcile", dirty = dirty.len(), "restoring snapshot");
        self.commit(Committed {
            tree: snapshot.tree.clone(),
            dirty,
            selection: snapshot.selection.clone(),
            next_key: self.next_key,
            selection_set: true,
        })
    }

    /// Execute a command against the current selection.
    pub fn dispatch(&mut self, action: &EditorAction) -> Result<bool> {
        execute_action(self, action)
    }

    /// Flush pending decorator work to the view layer.
    pub fn drive_decorators<H: DecoratorHost>(&mut self, host: &mut H) {
        self.reconciler.decorators_mut().drive(host, &self.tree);
    }

    /// Reconcile to `committed.tree` and swap in the result.
    fn commit(&mut self, committed: Committed) -> Result<()> {
        let Committed {
            tree: next,
            dirty,
            selection,
            selection_set,
            ..
        } = committed;

        let translator = self.state().translator();
        let old_flat = self
            .selection
            .as_ref()
            .map(|selection| flat_points(&translator, selection));

        let mut reconciler = self.reconciler.clone();
        let mut storage = self.storage.clone();
        let output = reconciler.reconcile(Some(&self.tree), &next, &dirty, &mut storage)?;

        let translator =
            SelectionCoordinateTranslator::new(&next, reconciler.range_cache(), reconciler.offset_index());
        let explicit = selection.filter(|selection| selection_set && selection.is_valid_in(&next));
        let selection = match explicit {
            Some(selection) => Some(selection),
            None => self.selection.as_ref().and_then(|selection| {
                let old_flat = old_flat.as_deref().unwrap_or(&[]);
                remap_selection(selection, old_flat, &output.edits, &next, &translator)
            }),
        };

        self.tree = next;
        self.storage = storage;
        self.reconciler = reconciler;
        self.selection = selection;
        self.last_output = Some(output);
        Ok(())
    }
}

/// Flat offsets of every point of `selection`, in the order `remap_selection`
/// consumes them.
fn flat_points(
    translator: &SelectionCoordinateTranslator<'_>,
    selection: &Selection,
) -> Vec<Option<usize>> {
    match selection {
        Selection::Range { anchor, focus } => {
            vec![translator.point_to_flat(anchor), translator.point_to_flat(focus)]
        }
        Selection::Node { .. } => {
            let flat = translator.selection_to_flat(selection);
            vec![flat.map(|flat| flat.start())]
        }
    }
}

/// Keep every point that still resolves, move the rest through `edits`.
fn remap_selection(
    selection: &Selection,
    old_flat: &[Option<usize>],
    edits: &[TextEdit],
    next: &DocumentTree,
    translator: &SelectionCoordinateTranslator<'_>,
) -> Option<Selection> {
    let remap = |point: &Point, flat: Option<usize>| -> Option<Point> {
        if point.is_valid_in(next) && next.is_attached(&point.key) {
            return Some(point.clone());
        }
        translator.flat_to_point(remap_offset(flat?, edits))
    };

    match selection {
        Selection::Range { anchor, focus } => {
            let anchor = remap(anchor, old_flat.first().copied().flatten())?;
            let focus = remap(focus, old_flat.get(1).copied().flatten())?;
            Some(Selection::Range { anchor, focus })
        }
        Selection::Node { keys } => {
            let kept: Vec<NodeKey> = keys
                .iter()
                .filter(|key| next.is_attached(key))
                .cloned()
                .collect();
            if !kept.is_empty() {
                return Some(Selection::Node { keys: kept });
            }
            let flat = old_flat.first().copied().flatten()?;
            translator
                .flat_to_point(remap_offset(flat, edits))
                .map(Selection::caret)
        }
    }
}

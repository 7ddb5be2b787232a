//! Copy-on-write mutation of a document tree.
//!
//! A transaction works on a clone of the committed tree. Every mutation goes
//! through `Arc::make_mut`, so nodes the transaction never touches stay
//! shared with the committed version, and records the key it changed in the
//! dirty set. Content changes are user-initiated; re-parenting and child list
//! bookkeeping are editor-initiated.

use smol_str::SmolStr;

use crate::dirty::{DirtyCause, DirtySet};
use crate::error::{ReconcileError, Result};
use crate::node::{
    DecoratorNode, ElementKind, Node, NodeKey, NodeKind, TextFormat, TextNode, make_node_key,
};
use crate::reconciler::render::char_len;
use crate::selection::Selection;
use crate::tree::DocumentTree;

/// In-flight update of one editor.
#[derive(Debug)]
pub struct Transaction {
    tree: DocumentTree,
    dirty: DirtySet,
    selection: Option<Selection>,
    selection_set: bool,
    next_key: u64,
}

/// What a finished transaction hands back to the editor.
#[derive(Debug)]
pub(crate) struct Committed {
    pub tree: DocumentTree,
    pub dirty: DirtySet,
    pub selection: Option<Selection>,
    pub next_key: u64,
    /// Whether the closure changed the selection explicitly.
    pub selection_set: bool,
}

impl Transaction {
    pub(crate) fn new(tree: DocumentTree, selection: Option<Selection>, next_key: u64) -> Self {
        Self {
            tree,
            dirty: DirtySet::new(),
            selection,
            selection_set: false,
            next_key,
        }
    }

    /// The working tree, including every change made so far.
    pub fn tree(&self) -> &DocumentTree {
        &self.tree
    }

    pub fn root(&self) -> NodeKey {
        self.tree.root_key().clone()
    }

    pub fn dirty(&self) -> &DirtySet {
        &self.dirty
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn set_selection(&mut self, selection: Option<Selection>) {
        self.selection = selection;
        self.selection_set = true;
    }

    pub fn mark_dirty(&mut self, key: &NodeKey, cause: DirtyCause) -> Result<()> {
        self.node(key)?;
        self.dirty.mark(key.clone(), cause);
        Ok(())
    }

    fn node(&self, key: &NodeKey) -> Result<&Node> {
        self.tree
            .get(key)
            .ok_or_else(|| ReconcileError::UnknownNode(key.clone()))
    }

    fn node_mut(&mut self, key: &NodeKey) -> Result<&mut Node> {
        self.tree
            .node_mut(key)
            .ok_or_else(|| ReconcileError::UnknownNode(key.clone()))
    }

    fn allocate_key(&mut self) -> NodeKey {
        loop {
            let key = make_node_key(self.next_key);
            self.next_key += 1;
            if !self.tree.contains(&key) {
                return key;
            }
        }
    }

    fn create(&mut self, kind: NodeKind) -> NodeKey {
        let key = self.allocate_key();
        self.tree.insert_node(Node::new(key.clone(), kind));
        self.dirty.mark_user(key.clone());
        key
    }

    // === Creation. New nodes are detached until inserted. ===

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeKey {
        self.create(NodeKind::Text(TextNode::new(text)))
    }

    pub fn create_formatted_text(
        &mut self,
        text: impl Into<String>,
        format: TextFormat,
        style: SmolStr,
    ) -> NodeKey {
        self.create(NodeKind::Text(TextNode {
            text: text.into(),
            format,
            style,
        }))
    }

    pub fn create_element(&mut self, kind: ElementKind) -> NodeKey {
        self.create(NodeKind::Element {
            kind,
            children: Vec::new(),
        })
    }

    pub fn create_paragraph(&mut self) -> NodeKey {
        self.create_element(ElementKind::Paragraph)
    }

    pub fn create_line_break(&mut self) -> NodeKey {
        self.create(NodeKind::LineBreak)
    }

    pub fn create_decorator(
        &mut self,
        kind: impl Into<SmolStr>,
        payload: impl Into<SmolStr>,
    ) -> NodeKey {
        self.create(NodeKind::Decorator(DecoratorNode {
            kind: kind.into(),
            payload: payload.into(),
        }))
    }

    // === Structure ===

    /// Append `child` as the last child of `parent`, moving it if attached.
    pub fn append(&mut self, parent: &NodeKey, child: &NodeKey) -> Result<()> {
        let index = self.node(parent)?.children().len();
        let index = if self.tree.parent(child) == Some(parent) {
            index - 1
        } else {
            index
        };
        self.insert(parent, index, child)
    }

    /// Insert `child` at `index` of `parent`, moving it if attached.
    ///
    /// `index` is interpreted after `child` left its old position.
    pub fn insert(&mut self, parent: &NodeKey, index: usize, child: &NodeKey) -> Result<()> {
        if !self.node(parent)?.is_container() {
            return Err(ReconcileError::InvalidOperation(format!(
                "{parent} cannot hold children"
            )));
        }
        if self.node(child)?.is_root() {
            return Err(ReconcileError::InvalidOperation(
                "the root cannot be inserted".to_string(),
            ));
        }
        if self.tree.is_self_or_ancestor(child, parent) {
            return Err(ReconcileError::InvalidOperation(format!(
                "inserting {child} into {parent} would create a cycle"
            )));
        }

        self.detach(child)?;
        let children = self
            .node_mut(parent)?
            .children_mut()
            .ok_or_else(|| ReconcileError::UnknownNode(parent.clone()))?;
        let index = index.min(children.len());
        children.insert(index, child.clone());
        self.node_mut(child)?.parent = Some(parent.clone());

        self.dirty.mark_editor(parent.clone());
        self.dirty.mark_editor(child.clone());
        Ok(())
    }

    pub fn insert_before(&mut self, sibling: &NodeKey, child: &NodeKey) -> Result<()> {
        let parent = self.attached_parent(sibling)?;
        if child != sibling {
            self.detach(child)?;
        }
        let index = self
            .tree
            .index_in_parent(sibling)
            .ok_or_else(|| ReconcileError::UnknownNode(sibling.clone()))?;
        self.insert(&parent, index, child)
    }

    pub fn insert_after(&mut self, sibling: &NodeKey, child: &NodeKey) -> Result<()> {
        let parent = self.attached_parent(sibling)?;
        if child != sibling {
            self.detach(child)?;
        }
        let index = self
            .tree
            .index_in_parent(sibling)
            .ok_or_else(|| ReconcileError::UnknownNode(sibling.clone()))?;
        self.insert(&parent, index + 1, child)
    }

    fn attached_parent(&self, key: &NodeKey) -> Result<NodeKey> {
        self.node(key)?
            .parent
            .clone()
            .ok_or_else(|| ReconcileError::InvalidOperation(format!("{key} has no parent")))
    }

    /// Take `key` out of its parent. The subtree stays alive until commit, so
    /// it can be inserted elsewhere.
    pub fn detach(&mut self, key: &NodeKey) -> Result<()> {
        let Some(parent) = self.node(key)?.parent.clone() else {
            return Ok(());
        };
        if let Some(children) = self.node_mut(&parent)?.children_mut() {
            children.retain(|child| child != key);
        }
        self.node_mut(key)?.parent = None;
        self.dirty.mark_editor(parent);
        self.dirty.mark_editor(key.clone());
        Ok(())
    }

    /// Remove `key` and its subtree from the document.
    pub fn remove(&mut self, key: &NodeKey) -> Result<()> {
        if self.node(key)?.is_root() {
            return Err(ReconcileError::InvalidOperation(
                "the root cannot be removed".to_string(),
            ));
        }
        self.detach(key)?;
        for gone in self.tree.subtree_keys(key) {
            self.dirty.mark_user(gone);
        }
        Ok(())
    }

    /// Split text node `key` at char `offset`. The tail moves into a new
    /// sibling with the same formatting, whose key is returned.
    pub fn split_text(&mut self, key: &NodeKey, offset: usize) -> Result<NodeKey> {
        let text = self
            .node(key)?
            .as_text()
            .cloned()
            .ok_or_else(|| ReconcileError::InvalidOperation(format!("{key} is not text")))?;
        let byte = byte_offset(&text.text, offset);
        let tail = text.text[byte..].to_string();
        let head = text.text[..byte].to_string();

        let new = self.create_formatted_text(tail, text.format, text.style.clone());
        self.set_text(key, head)?;
        self.insert_after(key, &new)?;
        Ok(new)
    }

    // === Content ===

    fn text_mut(&mut self, key: &NodeKey) -> Result<&mut TextNode> {
        self.node_mut(key)?
            .as_text_mut()
            .ok_or_else(|| ReconcileError::InvalidOperation(format!("{key} is not text")))
    }

    pub fn set_text(&mut self, key: &NodeKey, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        if self.node(key)?.as_text().is_some_and(|t| t.text == text) {
            return Ok(());
        }
        self.text_mut(key)?.text = text;
        self.dirty.mark_user(key.clone());
        Ok(())
    }

    /// Insert `text` at char `offset` of text node `key`.
    pub fn insert_text(&mut self, key: &NodeKey, offset: usize, text: &str) -> Result<()> {
        let node = self.text_mut(key)?;
        let byte = byte_offset(&node.text, offset);
        node.text.insert_str(byte, text);
        self.dirty.mark_user(key.clone());
        Ok(())
    }

    /// Delete the chars `range` of text node `key`.
    pub fn delete_text(&mut self, key: &NodeKey, range: std::ops::Range<usize>) -> Result<()> {
        let node = self.text_mut(key)?;
        let len = char_len(&node.text);
        let start = byte_offset(&node.text, range.start.min(len));
        let end = byte_offset(&node.text, range.end.min(len));
        if start >= end {
            return Ok(());
        }
        node.text.replace_range(start..end, "");
        self.dirty.mark_user(key.clone());
        Ok(())
    }

    pub fn set_format(&mut self, key: &NodeKey, format: TextFormat) -> Result<()> {
        let node = self.text_mut(key)?;
        if node.format == format {
            return Ok(());
        }
        node.format = format;
        self.dirty.mark_user(key.clone());
        Ok(())
    }

    pub fn toggle_format(&mut self, key: &NodeKey, format: TextFormat) -> Result<()> {
        let current = self.text_mut(key)?.format;
        self.set_format(key, current.symmetric_difference(format))
    }

    pub fn set_style(&mut self, key: &NodeKey, style: impl Into<SmolStr>) -> Result<()> {
        let style = style.into();
        let node = self.text_mut(key)?;
        if node.style == style {
            return Ok(());
        }
        node.style = style;
        self.dirty.mark_user(key.clone());
        Ok(())
    }

    pub fn set_payload(&mut self, key: &NodeKey, payload: impl Into<SmolStr>) -> Result<()> {
        let payload = payload.into();
        match &mut self.node_mut(key)?.kind {
            NodeKind::Decorator(decorator) => {
                if decorator.payload != payload {
                    decorator.payload = payload;
                    self.dirty.mark_user(key.clone());
                }
                Ok(())
            }
            _ => Err(ReconcileError::InvalidOperation(format!(
                "{key} is not a decorator"
            ))),
        }
    }

    /// Drop unreachable nodes and dirty keys that exist in neither version.
    pub(crate) fn commit(mut self, prev: &DocumentTree) -> Committed {
        let dead = self.tree.collect_garbage();
        let next = &self.tree;
        self.dirty
            .retain(|key| prev.contains(key) || next.contains(key));
        if !self.dirty.is_empty() {
            self.tree.bump_version();
        }
        if !dead.is_empty() {
            tracing::trace!(target: "weaver::reconcile", collected = dead.len(), "garbage collected");
        }
        Committed {
            tree: self.tree,
            dirty: self.dirty,
            selection: self.selection,
            next_key: self.next_key,
            selection_set: self.selection_set,
        }
    }
}

/// Byte index of char `offset` in `s`, clamped to the end.
pub(crate) fn byte_offset(s: &str, offset: usize) -> usize {
    s.char_indices()
        .nth(offset)
        .map(|(byte, _)| byte)
        .unwrap_or(s.len())
}

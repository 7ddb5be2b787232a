//! Immutable document tree snapshots.
//!
//! A `DocumentTree` is a flat map from key to `Arc<Node>` plus the root key.
//! Cloning a tree clones the map, not the nodes; writers go through
//! `Arc::make_mut` so only touched nodes are copied.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use smol_str::SmolStr;

use crate::node::{
    BLOCK_SEPARATOR, DecoratorNode, ElementKind, Node, NodeKey, NodeKind, TextFormat, TextNode,
};

/// Key of the root node in every tree.
pub const ROOT_KEY: &str = "root";

/// One committed (or in-flight) version of the document.
#[derive(Debug, Clone)]
pub struct DocumentTree {
    root: NodeKey,
    nodes: HashMap<NodeKey, Arc<Node>>,
    version: u64,
}

impl Default for DocumentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentTree {
    /// Tree containing only an empty root.
    pub fn new() -> Self {
        let root = SmolStr::new_static(ROOT_KEY);
        let mut nodes = HashMap::new();
        nodes.insert(root.clone(), Arc::new(Node::root(root.clone())));
        Self {
            root,
            nodes,
            version: 0,
        }
    }

    pub fn root_key(&self) -> &NodeKey {
        &self.root
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn bump_version(&mut self) {
        self.version += 1;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root_children().is_empty()
    }

    pub fn get(&self, key: &NodeKey) -> Option<&Node> {
        self.nodes.get(key).map(Arc::as_ref)
    }

    pub(crate) fn get_arc(&self, key: &NodeKey) -> Option<&Arc<Node>> {
        self.nodes.get(key)
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &NodeKey> {
        self.nodes.keys()
    }

    pub fn root_children(&self) -> &[NodeKey] {
        self.children(&self.root)
    }

    pub fn children(&self, key: &NodeKey) -> &[NodeKey] {
        self.get(key).map(Node::children).unwrap_or(&[])
    }

    pub fn parent(&self, key: &NodeKey) -> Option<&NodeKey> {
        self.get(key)?.parent.as_ref()
    }

    /// Position of `key` among its parent's children.
    pub fn index_in_parent(&self, key: &NodeKey) -> Option<usize> {
        let parent = self.parent(key)?;
        self.children(parent).iter().position(|k| k == key)
    }

    pub fn next_sibling(&self, key: &NodeKey) -> Option<&NodeKey> {
        let parent = self.parent(key)?;
        let siblings = self.children(parent);
        let idx = siblings.iter().position(|k| k == key)?;
        siblings.get(idx + 1)
    }

    pub fn previous_sibling(&self, key: &NodeKey) -> Option<&NodeKey> {
        let parent = self.parent(key)?;
        let siblings = self.children(parent);
        let idx = siblings.iter().position(|k| k == key)?;
        idx.checked_sub(1).and_then(|i| siblings.get(i))
    }

    /// Ancestors of `key`, nearest first, root last.
    pub fn ancestors(&self, key: &NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut current = self.parent(key);
        while let Some(parent) = current {
            out.push(parent.clone());
            current = self.parent(parent);
        }
        out
    }

    /// Whether `ancestor` is `key` or one of its ancestors.
    pub fn is_self_or_ancestor(&self, ancestor: &NodeKey, key: &NodeKey) -> bool {
        if ancestor == key {
            return true;
        }
        let mut current = self.parent(key);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.parent(parent);
        }
        false
    }

    /// Whether `key` can be reached from the root.
    pub fn is_attached(&self, key: &NodeKey) -> bool {
        self.contains(key) && self.is_self_or_ancestor(&self.root, key)
    }

    /// Nearest block element containing `key` (or `key` itself).
    pub fn enclosing_block(&self, key: &NodeKey) -> Option<&NodeKey> {
        let mut current = Some(key);
        while let Some(k) = current {
            let node = self.get(k)?;
            if node.is_element() {
                return Some(&node.key);
            }
            current = node.parent.as_ref();
        }
        None
    }

    /// Lowest node that is `key` or an ancestor of every key in `keys`.
    ///
    /// Keys missing from this tree are ignored. Returns the root when nothing
    /// narrower fits.
    pub fn lowest_common_ancestor<'a, I>(&self, keys: I) -> NodeKey
    where
        I: IntoIterator<Item = &'a NodeKey>,
    {
        let mut lca: Option<Vec<NodeKey>> = None;
        for key in keys {
            if !self.contains(key) {
                continue;
            }
            // Path from root down to key.
            let mut path = self.ancestors(key);
            path.reverse();
            path.push(key.clone());
            lca = Some(match lca {
                None => path,
                Some(current) => current
                    .into_iter()
                    .zip(path)
                    .take_while(|(a, b)| a == b)
                    .map(|(a, _)| a)
                    .collect(),
            });
        }
        lca.and_then(|path| path.last().cloned())
            .unwrap_or_else(|| self.root.clone())
    }

    /// Boundary emitted before the children of `key`.
    pub fn preamble(&self, key: &NodeKey) -> &'static str {
        self.get(key).map(Node::preamble).unwrap_or("")
    }

    /// Boundary emitted after `key`: a separator when a block has a next sibling.
    pub fn postamble(&self, key: &NodeKey) -> &'static str {
        match self.get(key) {
            Some(node) if node.is_element() && self.next_sibling(key).is_some() => {
                BLOCK_SEPARATOR
            }
            _ => "",
        }
    }

    /// Every key of the subtree rooted at `key`, in pre-order.
    pub fn subtree_keys(&self, key: &NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        if !self.contains(key) {
            return out;
        }
        let mut stack = vec![key.clone()];
        while let Some(k) = stack.pop() {
            stack.extend(self.children(&k).iter().rev().cloned());
            out.push(k);
        }
        out
    }

    /// Enter/leave events of the subtree rooted at `key`, in document order.
    pub fn walk(&self, key: &NodeKey) -> Vec<Visit> {
        let mut out = Vec::new();
        if !self.contains(key) {
            return out;
        }
        let mut stack = vec![Visit::Enter(key.clone())];
        while let Some(visit) = stack.pop() {
            if let Visit::Enter(k) = &visit {
                stack.push(Visit::Leave(k.clone()));
                stack.extend(self.children(k).iter().rev().cloned().map(Visit::Enter));
            }
            out.push(visit);
        }
        out
    }

    /// Decorator keys reachable from the root, in document order.
    pub fn decorators(&self) -> Vec<NodeKey> {
        self.subtree_keys(&self.root)
            .into_iter()
            .filter(|k| self.get(k).is_some_and(Node::is_decorator))
            .collect()
    }

    /// Flat text of the whole document, computed directly from the tree.
    pub fn text_content(&self) -> String {
        self.subtree_text(&self.root)
    }

    /// Flat text of one subtree including its own boundaries.
    pub fn subtree_text(&self, key: &NodeKey) -> String {
        let mut out = String::new();
        for visit in self.walk(key) {
            match visit {
                Visit::Enter(k) => {
                    out.push_str(self.preamble(&k));
                }
                Visit::Leave(k) => {
                    if let Some(node) = self.get(&k) {
                        out.push_str(node.own_text());
                    }
                    out.push_str(self.postamble(&k));
                }
            }
        }
        out
    }

    // === Crate-internal mutation, used by transactions ===

    pub(crate) fn node_mut(&mut self, key: &NodeKey) -> Option<&mut Node> {
        self.nodes.get_mut(key).map(Arc::make_mut)
    }

    pub(crate) fn insert_node(&mut self, node: Node) {
        self.nodes.insert(node.key.clone(), Arc::new(node));
    }

    pub(crate) fn remove_entry(&mut self, key: &NodeKey) -> Option<Arc<Node>> {
        self.nodes.remove(key)
    }

    /// Drop every node not reachable from the root. Returns the dropped keys.
    pub(crate) fn collect_garbage(&mut self) -> Vec<NodeKey> {
        let reachable: HashSet<NodeKey> = self.subtree_keys(&self.root).into_iter().collect();
        let dead: Vec<NodeKey> = self
            .nodes
            .keys()
            .filter(|k| !reachable.contains(*k))
            .cloned()
            .collect();
        for key in &dead {
            self.nodes.remove(key);
        }
        dead
    }
}

/// One step of a document-order traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visit {
    Enter(NodeKey),
    Leave(NodeKey),
}

/// Enter/leave event numbers of every node of a tree.
///
/// Events are numbered in emission order: a node's preamble is emitted at
/// its enter event, its own text and postamble at its leave event.
#[derive(Debug, Clone, Default)]
pub struct DocumentOrder {
    events: HashMap<NodeKey, (usize, usize)>,
    preorder: Vec<NodeKey>,
    event_count: usize,
}

impl DocumentOrder {
    pub fn of(tree: &DocumentTree) -> Self {
        let mut order = Self::default();
        let mut open: HashMap<NodeKey, usize> = HashMap::new();
        for (event, visit) in tree.walk(tree.root_key()).into_iter().enumerate() {
            match visit {
                Visit::Enter(key) => {
                    open.insert(key.clone(), event);
                    order.preorder.push(key);
                }
                Visit::Leave(key) => {
                    let enter = open.remove(&key).unwrap_or(event);
                    order.events.insert(key, (enter, event));
                }
            }
            order.event_count = event + 1;
        }
        order
    }

    pub fn enter(&self, key: &NodeKey) -> Option<usize> {
        self.events.get(key).map(|(enter, _)| *enter)
    }

    pub fn leave(&self, key: &NodeKey) -> Option<usize> {
        self.events.get(key).map(|(_, leave)| *leave)
    }

    pub fn events(&self, key: &NodeKey) -> Option<(usize, usize)> {
        self.events.get(key).copied()
    }

    /// Every key in pre-order.
    pub fn preorder(&self) -> &[NodeKey] {
        &self.preorder
    }

    pub fn event_count(&self) -> usize {
        self.event_count
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.events.contains_key(key)
    }
}

/// Builds trees with explicit keys. Used by tests and by callers importing
/// documents from elsewhere.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    tree: DocumentTree,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> NodeKey {
        self.tree.root.clone()
    }

    fn attach(&mut self, parent: &NodeKey, mut node: Node) -> NodeKey {
        let key = node.key.clone();
        node.parent = Some(parent.clone());
        self.tree.insert_node(node);
        if let Some(children) = self.tree.node_mut(parent).and_then(Node::children_mut) {
            children.push(key.clone());
        }
        key
    }

    pub fn element(&mut self, parent: &NodeKey, key: &str, kind: ElementKind) -> NodeKey {
        self.attach(
            parent,
            Node::new(
                key.into(),
                NodeKind::Element {
                    kind,
                    children: Vec::new(),
                },
            ),
        )
    }

    pub fn paragraph(&mut self, parent: &NodeKey, key: &str) -> NodeKey {
        self.element(parent, key, ElementKind::Paragraph)
    }

    pub fn text(&mut self, parent: &NodeKey, key: &str, text: &str) -> NodeKey {
        self.attach(parent, Node::new(key.into(), NodeKind::Text(TextNode::new(text))))
    }

    pub fn formatted_text(
        &mut self,
        parent: &NodeKey,
        key: &str,
        text: &str,
        format: TextFormat,
    ) -> NodeKey {
        let mut node = TextNode::new(text);
        node.format = format;
        self.attach(parent, Node::new(key.into(), NodeKind::Text(node)))
    }

    pub fn line_break(&mut self, parent: &NodeKey, key: &str) -> NodeKey {
        self.attach(parent, Node::new(key.into(), NodeKind::LineBreak))
    }

    pub fn decorator(&mut self, parent: &NodeKey, key: &str, kind: &str, payload: &str) -> NodeKey {
        self.attach(
            parent,
            Node::new(
                key.into(),
                NodeKind::Decorator(DecoratorNode {
                    kind: kind.into(),
                    payload: payload.into(),
                }),
            ),
        )
    }

    pub fn build(self) -> DocumentTree {
        self.tree
    }
}

//! Action execution.
//!
//! `execute_action` applies an `EditorAction` to the editor's selection
//! inside one update transaction, so every command is atomic and undoable
//! as a unit.

use crate::actions::EditorAction;
use crate::editor::Editor;
use crate::error::{ReconcileError, Result};
use crate::node::{ElementKind, Node, NodeKey, NodeKind, TextFormat};
use crate::reconciler::render::char_len;
use crate::selection::{FlatSelection, Point, PointKind, Selection};
use crate::text::TextStorage;
use crate::text_helpers::{next_grapheme_boundary, previous_grapheme_boundary};
use crate::transaction::Transaction;
use crate::tree::{DocumentOrder, DocumentTree};

/// Execute an editor action.
///
/// Returns true if the action was handled. Actions that need a selection
/// do nothing without one.
pub fn execute_action<S: TextStorage + Clone>(
    editor: &mut Editor<S>,
    action: &EditorAction,
) -> Result<bool> {
    match action {
        EditorAction::Undo => return editor.undo(),
        EditorAction::Redo => return editor.redo(),
        EditorAction::SelectAll => return Ok(execute_select_all(editor)),
        _ => {}
    }

    let Some(target) = resolve_target(editor) else {
        return Ok(false);
    };
    tracing::trace!(target: "weaver::reconcile", ?action, "execute");

    editor.update(|txn| match action {
        EditorAction::InsertText(text) => execute_insert_text(txn, target, text),
        EditorAction::InsertParagraph => execute_insert_paragraph(txn, target),
        EditorAction::InsertLineBreak => {
            execute_insert_inline(txn, target, |txn| txn.create_line_break())
        }
        EditorAction::InsertDecorator { kind, payload } => {
            execute_insert_inline(txn, target, |txn| {
                txn.create_decorator(kind.clone(), payload.clone())
            })
        }
        EditorAction::DeleteBackward => execute_delete_backward(txn, target),
        EditorAction::DeleteForward => execute_delete_forward(txn, target),
        EditorAction::ToggleFormat(format) => execute_toggle_format(txn, target, *format),
        EditorAction::SelectAll | EditorAction::Undo | EditorAction::Redo => Ok(false),
    })
}

/// The selection an action applies to, with range ends in document order.
#[derive(Debug, Clone)]
enum Target {
    Caret(Point),
    Range { start: Point, end: Point },
    Nodes(Vec<NodeKey>),
}

fn resolve_target<S: TextStorage + Clone>(editor: &Editor<S>) -> Option<Target> {
    editor.read(|state| match state.selection()? {
        Selection::Node { keys } => Some(Target::Nodes(keys.clone())),
        Selection::Range { anchor, focus } if anchor == focus => Some(Target::Caret(focus.clone())),
        Selection::Range { anchor, focus } => {
            let translator = state.translator();
            let from = translator.point_to_flat(anchor)?;
            let to = translator.point_to_flat(focus)?;
            Some(match from.cmp(&to) {
                std::cmp::Ordering::Equal => Target::Caret(focus.clone()),
                std::cmp::Ordering::Less => Target::Range {
                    start: anchor.clone(),
                    end: focus.clone(),
                },
                std::cmp::Ordering::Greater => Target::Range {
                    start: focus.clone(),
                    end: anchor.clone(),
                },
            })
        }
    })
}

fn execute_select_all<S: TextStorage + Clone>(editor: &mut Editor<S>) -> bool {
    let selection = editor.read(|state| {
        let flat = FlatSelection {
            anchor: 0,
            focus: state.storage().len_chars(),
        };
        state.translator().flat_to_selection(flat)
    });
    match selection {
        Some(selection) => editor.set_selection(Some(selection)),
        None => false,
    }
}

// === Positions ===

/// A gap between two children of a block: before `before`, or at the end.
#[derive(Debug, Clone)]
struct Boundary {
    block: NodeKey,
    before: Option<NodeKey>,
}

impl Boundary {
    fn index(&self, tree: &DocumentTree) -> usize {
        let end = tree.children(&self.block).len();
        match &self.before {
            Some(key) => tree.index_in_parent(key).unwrap_or(end),
            None => end,
        }
    }
}

/// Whether `key` holds inline content (text, decorators, line breaks).
fn is_inline_host(tree: &DocumentTree, key: &NodeKey) -> bool {
    tree.get(key)
        .and_then(Node::element_kind)
        .is_some_and(|kind| !kind.is_container())
}

fn invalid(message: impl Into<String>) -> ReconcileError {
    ReconcileError::InvalidOperation(message.into())
}

/// Caret for the gap before child `index` of `block`: the end of the
/// previous text, else the start of the next text, else an element point.
fn caret_at(tree: &DocumentTree, block: &NodeKey, index: usize) -> Point {
    let children = tree.children(block);
    if let Some(prev) = index.checked_sub(1).and_then(|i| children.get(i)) {
        if let Some(text) = tree.get(prev).and_then(Node::as_text) {
            return Point::text(prev.clone(), char_len(&text.text));
        }
    }
    if let Some(next) = children.get(index) {
        if tree.get(next).is_some_and(Node::is_text) {
            return Point::text(next.clone(), 0);
        }
    }
    Point::element(block.clone(), index)
}

/// Turn `point` into a gap between children, splitting a text node if the
/// point falls inside one.
fn split_at(txn: &mut Transaction, point: &Point) -> Result<Boundary> {
    match point.kind {
        PointKind::Element => Ok(Boundary {
            block: point.key.clone(),
            before: txn.tree().children(&point.key).get(point.offset).cloned(),
        }),
        PointKind::Text => {
            let tree = txn.tree();
            let node = tree
                .get(&point.key)
                .ok_or_else(|| ReconcileError::UnknownNode(point.key.clone()))?;
            let text = node
                .as_text()
                .ok_or_else(|| invalid(format!("{} is not text", point.key)))?;
            let block = node
                .parent
                .clone()
                .ok_or_else(|| invalid(format!("{} is detached", point.key)))?;
            if point.offset == 0 {
                return Ok(Boundary {
                    block,
                    before: Some(point.key.clone()),
                });
            }
            if point.offset >= char_len(&text.text) {
                let before = tree.next_sibling(&point.key).cloned();
                return Ok(Boundary { block, before });
            }
            let tail = txn.split_text(&point.key, point.offset)?;
            Ok(Boundary {
                block,
                before: Some(tail),
            })
        }
    }
}

/// Make sure `point` can take inline content, creating a block if it sits
/// between blocks.
fn ensure_inline(txn: &mut Transaction, point: Point) -> Result<Point> {
    if point.kind == PointKind::Text || is_inline_host(txn.tree(), &point.key) {
        return Ok(point);
    }
    let kind = match txn.tree().get(&point.key).and_then(Node::element_kind) {
        Some(ElementKind::List) => ElementKind::ListItem,
        _ => ElementKind::Paragraph,
    };
    let block = txn.create_element(kind);
    txn.insert(&point.key, point.offset, &block)?;
    Ok(Point::element(block, 0))
}

/// Remove text node `key` if it became empty. Returns the gap it left.
fn remove_if_empty(txn: &mut Transaction, key: &NodeKey) -> Result<Option<(NodeKey, usize)>> {
    let tree = txn.tree();
    let empty = tree
        .get(key)
        .and_then(Node::as_text)
        .is_some_and(|text| text.text.is_empty());
    if !empty {
        return Ok(None);
    }
    let (Some(parent), Some(index)) = (tree.parent(key).cloned(), tree.index_in_parent(key)) else {
        return Ok(None);
    };
    txn.remove(key)?;
    Ok(Some((parent, index)))
}

fn set_caret(txn: &mut Transaction, point: Point) {
    txn.set_selection(Some(Selection::caret(point)));
}

// === Deletion ===

/// Delete the selected content and return where the caret goes.
fn collapse(txn: &mut Transaction, target: Target) -> Result<Point> {
    match target {
        Target::Caret(point) => Ok(point),
        Target::Range { start, end } => delete_range(txn, &start, &end),
        Target::Nodes(keys) => delete_nodes(txn, &keys),
    }
}

fn delete_nodes(txn: &mut Transaction, keys: &[NodeKey]) -> Result<Point> {
    let first = keys
        .iter()
        .find(|key| txn.tree().is_attached(key))
        .ok_or_else(|| invalid("node selection is empty"))?
        .clone();
    let tree = txn.tree();
    let parent = tree
        .parent(&first)
        .cloned()
        .ok_or_else(|| invalid("the root cannot be selected"))?;
    let index = tree.index_in_parent(&first).unwrap_or(0);

    for key in keys {
        if txn.tree().is_attached(key) {
            txn.remove(key)?;
        }
    }
    let index = index.min(txn.tree().children(&parent).len());
    Ok(caret_at(txn.tree(), &parent, index))
}

fn delete_range(txn: &mut Transaction, start: &Point, end: &Point) -> Result<Point> {
    // End first, so splitting it cannot shift the start.
    let end = split_at(txn, end)?;
    let start = split_at(txn, start)?;

    if start.block == end.block {
        let tree = txn.tree();
        let from = start.index(tree);
        let to = end.index(tree).max(from);
        let doomed = tree.children(&start.block)[from..to].to_vec();
        for key in &doomed {
            txn.remove(key)?;
        }
        return Ok(caret_at(txn.tree(), &start.block, from));
    }

    let tree = txn.tree();
    if !is_inline_host(tree, &start.block)
        || !is_inline_host(tree, &end.block)
        || tree.is_self_or_ancestor(&start.block, &end.block)
        || tree.is_self_or_ancestor(&end.block, &start.block)
    {
        return Err(invalid("range ends must sit in separate text blocks"));
    }

    let from = start.index(tree);
    let to = end.index(tree);
    let mut doomed = tree.children(&start.block)[from..].to_vec();
    doomed.extend_from_slice(&tree.children(&end.block)[..to]);

    // Whole subtrees strictly between the two blocks.
    let order = DocumentOrder::of(tree);
    let after = order.leave(&start.block).unwrap_or(0);
    let before = order.enter(&end.block).unwrap_or(0);
    let inside = |key: &NodeKey| {
        order
            .events(key)
            .is_some_and(|(enter, leave)| enter > after && leave < before)
    };
    for key in order.preorder() {
        let topmost = tree.parent(key).is_none_or(|parent| !inside(parent));
        if inside(key) && topmost {
            doomed.push(key.clone());
        }
    }
    for key in &doomed {
        txn.remove(key)?;
    }

    merge_into(txn, &end.block, &start.block)?;
    Ok(caret_at(txn.tree(), &start.block, from))
}

/// Move every child of `from` to the end of `into`, then drop `from` and any
/// container left empty by its removal.
fn merge_into(txn: &mut Transaction, from: &NodeKey, into: &NodeKey) -> Result<usize> {
    let count = txn.tree().children(into).len();
    for child in txn.tree().children(from).to_vec() {
        txn.append(into, &child)?;
    }

    let mut doomed = from.clone();
    loop {
        let tree = txn.tree();
        let Some(parent) = tree.parent(&doomed).cloned() else {
            break;
        };
        let only_child = tree.children(&parent).len() == 1;
        let removable = only_child
            && tree.get(&parent).is_some_and(Node::is_element)
            && !tree.is_self_or_ancestor(&parent, into);
        if !removable {
            break;
        }
        doomed = parent;
    }
    txn.remove(&doomed)?;
    Ok(count)
}

/// Nearest inline block before `block`, descending into containers.
fn previous_block(tree: &DocumentTree, block: &NodeKey) -> Option<NodeKey> {
    let mut key = tree.previous_sibling(block)?.clone();
    while !is_inline_host(tree, &key) {
        key = tree.children(&key).last()?.clone();
    }
    Some(key)
}

fn next_block(tree: &DocumentTree, block: &NodeKey) -> Option<NodeKey> {
    let mut key = tree.next_sibling(block)?.clone();
    while !is_inline_host(tree, &key) {
        key = tree.children(&key).first()?.clone();
    }
    Some(key)
}

/// Delete the last grapheme of text `key`. Returns the caret.
fn delete_grapheme_before(txn: &mut Transaction, key: &NodeKey, offset: usize) -> Result<Point> {
    let text = txn
        .tree()
        .get(key)
        .and_then(Node::as_text)
        .map(|text| text.text.clone())
        .unwrap_or_default();
    let start = previous_grapheme_boundary(&text, offset);
    txn.delete_text(key, start..offset)?;
    Ok(match remove_if_empty(txn, key)? {
        Some((block, index)) => caret_at(txn.tree(), &block, index),
        None => Point::text(key.clone(), start),
    })
}

fn execute_delete_backward(txn: &mut Transaction, target: Target) -> Result<bool> {
    let point = match target {
        Target::Caret(point) => point,
        other => {
            let caret = collapse(txn, other)?;
            set_caret(txn, caret);
            return Ok(true);
        }
    };

    if point.kind == PointKind::Text && point.offset > 0 {
        let caret = delete_grapheme_before(txn, &point.key, point.offset)?;
        set_caret(txn, caret);
        return Ok(true);
    }

    let tree = txn.tree();
    let (block, index) = match point.kind {
        PointKind::Text => match (tree.parent(&point.key), tree.index_in_parent(&point.key)) {
            (Some(parent), Some(index)) => (parent.clone(), index),
            _ => return Ok(false),
        },
        PointKind::Element => (point.key.clone(), point.offset),
    };
    if !is_inline_host(tree, &block) {
        return Ok(false);
    }

    let previous = index
        .checked_sub(1)
        .and_then(|i| tree.children(&block).get(i))
        .cloned();
    let Some(previous) = previous else {
        // At the start of the block: merge into the block before.
        let Some(into) = previous_block(tree, &block) else {
            return Ok(false);
        };
        let count = merge_into(txn, &block, &into)?;
        set_caret(txn, Point::element(into, count));
        return Ok(true);
    };

    match tree.get(&previous).map(|node| &node.kind) {
        Some(NodeKind::Text(text)) => {
            let len = char_len(&text.text);
            let caret = delete_grapheme_before(txn, &previous, len)?;
            set_caret(txn, caret);
        }
        Some(NodeKind::Decorator(_)) => {
            // First press selects the decorator, the second deletes it.
            txn.set_selection(Some(Selection::node(previous)));
        }
        _ => {
            txn.remove(&previous)?;
            let caret = caret_at(txn.tree(), &block, index - 1);
            set_caret(txn, caret);
        }
    }
    Ok(true)
}

fn execute_delete_forward(txn: &mut Transaction, target: Target) -> Result<bool> {
    let point = match target {
        Target::Caret(point) => point,
        other => {
            let caret = collapse(txn, other)?;
            set_caret(txn, caret);
            return Ok(true);
        }
    };

    let tree = txn.tree();
    if let Some(text) = tree.get(&point.key).and_then(Node::as_text) {
        if point.kind == PointKind::Text && point.offset < char_len(&text.text) {
            let end = next_grapheme_boundary(&text.text, point.offset);
            let key = point.key.clone();
            txn.delete_text(&key, point.offset..end)?;
            let caret = match remove_if_empty(txn, &key)? {
                Some((block, index)) => caret_at(txn.tree(), &block, index),
                None => point,
            };
            set_caret(txn, caret);
            return Ok(true);
        }
    }

    let (block, index) = match point.kind {
        PointKind::Text => match (tree.parent(&point.key), tree.index_in_parent(&point.key)) {
            (Some(parent), Some(index)) => (parent.clone(), index + 1),
            _ => return Ok(false),
        },
        PointKind::Element => (point.key.clone(), point.offset),
    };
    if !is_inline_host(tree, &block) {
        return Ok(false);
    }

    let Some(next) = tree.children(&block).get(index).cloned() else {
        // At the end of the block: pull the next block in.
        let Some(from) = next_block(tree, &block) else {
            return Ok(false);
        };
        merge_into(txn, &from, &block)?;
        set_caret(txn, point);
        return Ok(true);
    };

    match tree.get(&next).map(|node| &node.kind) {
        Some(NodeKind::Text(text)) => {
            let end = next_grapheme_boundary(&text.text, 0);
            txn.delete_text(&next, 0..end)?;
            let caret = match remove_if_empty(txn, &next)? {
                Some((block, index)) => caret_at(txn.tree(), &block, index),
                None => point,
            };
            set_caret(txn, caret);
        }
        Some(NodeKind::Decorator(_)) => {
            txn.set_selection(Some(Selection::node(next)));
        }
        _ => {
            txn.remove(&next)?;
            let caret = caret_at(txn.tree(), &block, index);
            set_caret(txn, caret);
        }
    }
    Ok(true)
}

// === Insertion ===

fn execute_insert_text(txn: &mut Transaction, target: Target, text: &str) -> Result<bool> {
    if text.is_empty() {
        return Ok(false);
    }
    let point = collapse(txn, target)?;
    let point = ensure_inline(txn, point)?;
    let inserted = char_len(text);

    let caret = match point.kind {
        PointKind::Text => {
            txn.insert_text(&point.key, point.offset, text)?;
            Point::text(point.key, point.offset + inserted)
        }
        PointKind::Element => {
            let tree = txn.tree();
            let children = tree.children(&point.key);
            let previous = point
                .offset
                .checked_sub(1)
                .and_then(|i| children.get(i))
                .and_then(|key| Some((key.clone(), tree.get(key)?.as_text()?.text.clone())));
            let next = children
                .get(point.offset)
                .filter(|key| tree.get(key).is_some_and(Node::is_text))
                .cloned();
            if let Some((key, existing)) = previous {
                let offset = char_len(&existing);
                txn.insert_text(&key, offset, text)?;
                Point::text(key, offset + inserted)
            } else if let Some(key) = next {
                txn.insert_text(&key, 0, text)?;
                Point::text(key, inserted)
            } else {
                let key = txn.create_text(text);
                txn.insert(&point.key, point.offset, &key)?;
                Point::text(key, inserted)
            }
        }
    };
    set_caret(txn, caret);
    Ok(true)
}

fn execute_insert_paragraph(txn: &mut Transaction, target: Target) -> Result<bool> {
    let point = collapse(txn, target)?;
    let point = ensure_inline(txn, point)?;
    let boundary = split_at(txn, &point)?;

    let kind = txn
        .tree()
        .get(&boundary.block)
        .and_then(Node::element_kind)
        .unwrap_or(ElementKind::Paragraph);
    let block = txn.create_element(kind);
    txn.insert_after(&boundary.block, &block)?;

    let index = boundary.index(txn.tree());
    let tail = txn.tree().children(&boundary.block)[index..].to_vec();
    for child in &tail {
        txn.append(&block, child)?;
    }
    let caret = caret_at(txn.tree(), &block, 0);
    set_caret(txn, caret);
    Ok(true)
}

/// Insert a single inline node (line break or decorator) at the selection.
fn execute_insert_inline(
    txn: &mut Transaction,
    target: Target,
    create: impl FnOnce(&mut Transaction) -> NodeKey,
) -> Result<bool> {
    let point = collapse(txn, target)?;
    let point = ensure_inline(txn, point)?;
    let boundary = split_at(txn, &point)?;
    let index = boundary.index(txn.tree());

    let node = create(txn);
    txn.insert(&boundary.block, index, &node)?;
    let caret = caret_at(txn.tree(), &boundary.block, index + 1);
    set_caret(txn, caret);
    Ok(true)
}

// === Formatting ===

fn execute_toggle_format(txn: &mut Transaction, target: Target, format: TextFormat) -> Result<bool> {
    let Target::Range { start, end } = target else {
        return Ok(false);
    };
    let end = split_at(txn, &end)?;
    let start = split_at(txn, &start)?;

    let tree = txn.tree();
    let order = DocumentOrder::of(tree);
    let event = |boundary: &Boundary| match &boundary.before {
        Some(key) => order.enter(key),
        None => order.leave(&boundary.block),
    };
    let (Some(from), Some(to)) = (event(&start), event(&end)) else {
        return Ok(false);
    };
    let texts: Vec<NodeKey> = order
        .preorder()
        .iter()
        .filter(|key| tree.get(key).is_some_and(Node::is_text))
        .filter(|key| order.enter(key).is_some_and(|enter| enter >= from && enter < to))
        .cloned()
        .collect();
    let (Some(first), Some(last)) = (texts.first().cloned(), texts.last().cloned()) else {
        return Ok(false);
    };

    let all_set = texts.iter().all(|key| {
        tree.get(key)
            .and_then(Node::as_text)
            .is_some_and(|text| text.format.contains(format))
    });
    for key in &texts {
        let current = txn
            .tree()
            .get(key)
            .and_then(Node::as_text)
            .map(|text| text.format)
            .unwrap_or_default();
        let next = if all_set {
            current.difference(format)
        } else {
            current.union(format)
        };
        txn.set_format(key, next)?;
    }

    let last_len = txn
        .tree()
        .get(&last)
        .map(|node| char_len(node.own_text()))
        .unwrap_or(0);
    txn.set_selection(Some(Selection::range(
        Point::text(first, 0),
        Point::text(last, last_len),
    )));
    Ok(true)
}

#[cfg(test)]
mod tests {
    use smol_str::SmolStr;

    use super::*;
    use crate::config::ReconcilerConfig;
    use crate::tree::TreeBuilder;

    fn k(s: &str) -> NodeKey {
        SmolStr::new(s)
    }

    fn editor(text_a: &str, text_b: &str) -> Editor {
        let mut b = TreeBuilder::new();
        let root = b.root();
        let p1 = b.paragraph(&root, "p1");
        b.text(&p1, "t1", text_a);
        let p2 = b.paragraph(&root, "p2");
        b.text(&p2, "t2", text_b);
        Editor::with_document(ReconcilerConfig::strict(), b.build()).unwrap()
    }

    fn caret(editor: &mut Editor, point: Point) {
        assert!(editor.set_selection(Some(Selection::caret(point))));
    }

    #[test]
    fn test_insert_text_at_caret() {
        let mut editor = editor("Hello", "World");
        caret(&mut editor, Point::text("t1", 5));
        assert!(editor.dispatch(&EditorAction::insert_text(", you")).unwrap());
        assert_eq!(editor.text(), "Hello, you\nWorld");
        assert_eq!(
            editor.selection(),
            Some(&Selection::caret(Point::text("t1", 10)))
        );
    }

    #[test]
    fn test_delete_backward_grapheme() {
        let mut editor = editor("ae\u{301}", "x");
        caret(&mut editor, Point::text("t1", 3));
        editor.dispatch(&EditorAction::DeleteBackward).unwrap();
        assert_eq!(editor.text(), "a\nx");
        assert_eq!(
            editor.selection(),
            Some(&Selection::caret(Point::text("t1", 1)))
        );
    }

    #[test]
    fn test_delete_last_char_removes_text_node() {
        let mut editor = editor("a", "b");
        caret(&mut editor, Point::text("t1", 1));
        editor.dispatch(&EditorAction::DeleteBackward).unwrap();
        assert_eq!(editor.text(), "\nb");
        assert!(!editor.tree().contains(&k("t1")));
        assert_eq!(
            editor.selection(),
            Some(&Selection::caret(Point::element("p1", 0)))
        );
    }

    #[test]
    fn test_insert_paragraph_splits_block() {
        let mut editor = editor("Hello", "World");
        caret(&mut editor, Point::text("t1", 2));
        editor.dispatch(&EditorAction::InsertParagraph).unwrap();
        assert_eq!(editor.text(), "He\nllo\nWorld");
        let caret = editor.selection().and_then(Selection::caret_point).cloned().unwrap();
        assert_eq!(caret.offset, 0);
        assert_eq!(caret.kind, PointKind::Text);
    }

    #[test]
    fn test_insert_line_break() {
        let mut editor = editor("Hello", "World");
        caret(&mut editor, Point::text("t1", 5));
        editor.dispatch(&EditorAction::InsertLineBreak).unwrap();
        assert_eq!(editor.text(), "Hello\n\nWorld");
        assert_eq!(
            editor.selection(),
            Some(&Selection::caret(Point::element("p1", 2)))
        );
    }

    #[test]
    fn test_delete_forward_merges_next_block() {
        let mut editor = editor("Hello", "World");
        caret(&mut editor, Point::text("t1", 5));
        editor.dispatch(&EditorAction::DeleteForward).unwrap();
        assert_eq!(editor.text(), "HelloWorld");
        assert_eq!(editor.tree().children(&k("p1")), &[k("t1"), k("t2")]);
        assert!(!editor.tree().contains(&k("p2")));
    }

    #[test]
    fn test_range_delete_across_blocks() {
        let mut editor = editor("Hello", "World");
        editor.set_selection(Some(Selection::range(
            Point::text("t2", 2),
            Point::text("t1", 3),
        )));
        editor.dispatch(&EditorAction::DeleteBackward).unwrap();
        assert_eq!(editor.text(), "Helrld");
        assert_eq!(
            editor.selection(),
            Some(&Selection::caret(Point::text("t1", 3)))
        );
    }

    #[test]
    fn test_toggle_format_inside_text() {
        let mut editor = editor("Hello", "World");
        editor.set_selection(Some(Selection::range(
            Point::text("t1", 1),
            Point::text("t1", 4),
        )));
        editor.dispatch(&EditorAction::toggle_bold()).unwrap();
        assert_eq!(editor.text(), "Hello\nWorld");
        let bold: Vec<String> = editor
            .tree()
            .children(&k("p1"))
            .iter()
            .filter_map(|key| editor.tree().get(key).and_then(Node::as_text))
            .filter(|text| text.format.contains(TextFormat::BOLD))
            .map(|text| text.text.clone())
            .collect();
        assert_eq!(bold, vec!["ell".to_string()]);

        // Toggling the same range again clears it.
        editor.dispatch(&EditorAction::toggle_bold()).unwrap();
        let any_bold = editor.tree().children(&k("p1")).iter().any(|key| {
            editor
                .tree()
                .get(key)
                .and_then(Node::as_text)
                .is_some_and(|text| text.format.contains(TextFormat::BOLD))
        });
        assert!(!any_bold);
    }

    #[test]
    fn test_select_all_then_type() {
        let mut editor = editor("Hello", "World");
        assert!(editor.dispatch(&EditorAction::SelectAll).unwrap());
        editor.dispatch(&EditorAction::insert_text("x")).unwrap();
        assert_eq!(editor.text(), "x");
    }

    #[test]
    fn test_undo_action() {
        let mut editor = editor("Hello", "World");
        caret(&mut editor, Point::text("t2", 0));
        editor.dispatch(&EditorAction::insert_text(">")).unwrap();
        assert_eq!(editor.text(), "Hello\n>World");
        assert!(editor.dispatch(&EditorAction::Undo).unwrap());
        assert_eq!(editor.text(), "Hello\nWorld");
        assert!(editor.dispatch(&EditorAction::Redo).unwrap());
        assert_eq!(editor.text(), "Hello\n>World");
    }

    #[test]
    fn test_no_selection_does_nothing() {
        let mut editor = editor("Hello", "World");
        assert!(!editor.dispatch(&EditorAction::DeleteBackward).unwrap());
        assert_eq!(editor.text(), "Hello\nWorld");
    }
}

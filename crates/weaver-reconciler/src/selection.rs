//! Selection points and translation to and from flat text offsets.
//!
//! A point addresses either a char offset inside a text node or a child
//! index inside an element. Translation goes through the range cache (point
//! to flat) and the offset index (flat to point).

use crate::node::{NodeKey, NodeKind};
use crate::offset_index::NodeOffsetIndex;
use crate::range_cache::RangeCache;
use crate::reconciler::render::char_len;
use crate::text::{TextEdit, fragments_len};
use crate::tree::DocumentTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointKind {
    /// Offset is a char offset into a text node.
    Text,
    /// Offset is a child index of an element (or the root).
    Element,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Point {
    pub key: NodeKey,
    pub offset: usize,
    pub kind: PointKind,
}

impl Point {
    pub fn text(key: impl Into<NodeKey>, offset: usize) -> Self {
        Self {
            key: key.into(),
            offset,
            kind: PointKind::Text,
        }
    }

    pub fn element(key: impl Into<NodeKey>, offset: usize) -> Self {
        Self {
            key: key.into(),
            offset,
            kind: PointKind::Element,
        }
    }

    /// Whether the point still addresses something in `tree`.
    pub fn is_valid_in(&self, tree: &DocumentTree) -> bool {
        let Some(node) = tree.get(&self.key) else {
            return false;
        };
        match self.kind {
            PointKind::Text => node
                .as_text()
                .is_some_and(|text| self.offset <= char_len(&text.text)),
            PointKind::Element => node.is_container() && self.offset <= node.children().len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// A caret or a range between two points.
    Range { anchor: Point, focus: Point },
    /// Whole nodes, e.g. a decorator selected before deletion.
    Node { keys: Vec<NodeKey> },
}

impl Selection {
    pub fn caret(point: Point) -> Self {
        Selection::Range {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn range(anchor: Point, focus: Point) -> Self {
        Selection::Range { anchor, focus }
    }

    pub fn node(key: NodeKey) -> Self {
        Selection::Node { keys: vec![key] }
    }

    pub fn is_collapsed(&self) -> bool {
        match self {
            Selection::Range { anchor, focus } => anchor == focus,
            Selection::Node { .. } => false,
        }
    }

    /// The caret point of a collapsed range selection.
    pub fn caret_point(&self) -> Option<&Point> {
        match self {
            Selection::Range { anchor, focus } if anchor == focus => Some(focus),
            _ => None,
        }
    }

    pub fn is_valid_in(&self, tree: &DocumentTree) -> bool {
        match self {
            Selection::Range { anchor, focus } => anchor.is_valid_in(tree) && focus.is_valid_in(tree),
            Selection::Node { keys } => !keys.is_empty() && keys.iter().all(|key| tree.contains(key)),
        }
    }
}

/// A selection in flat coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatSelection {
    pub anchor: usize,
    pub focus: usize,
}

impl FlatSelection {
    pub fn caret(offset: usize) -> Self {
        Self {
            anchor: offset,
            focus: offset,
        }
    }

    pub fn start(&self) -> usize {
        self.anchor.min(self.focus)
    }

    pub fn end(&self) -> usize {
        self.anchor.max(self.focus)
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    /// Move both ends through `edits`.
    pub fn remap(self, edits: &[TextEdit]) -> Self {
        Self {
            anchor: remap_offset(self.anchor, edits),
            focus: remap_offset(self.focus, edits),
        }
    }
}

/// Translates between points and flat offsets for one committed state.
#[derive(Debug, Clone, Copy)]
pub struct SelectionCoordinateTranslator<'a> {
    tree: &'a DocumentTree,
    cache: &'a RangeCache,
    index: &'a NodeOffsetIndex,
}

impl<'a> SelectionCoordinateTranslator<'a> {
    pub fn new(tree: &'a DocumentTree, cache: &'a RangeCache, index: &'a NodeOffsetIndex) -> Self {
        Self { tree, cache, index }
    }

    pub fn point_to_flat(&self, point: &Point) -> Option<usize> {
        let node = self.tree.get(&point.key)?;
        let item = self.cache.get(&point.key)?;
        match point.kind {
            PointKind::Text => {
                node.as_text()?;
                Some(item.text_start() + point.offset.min(item.text_length))
            }
            PointKind::Element => {
                if !node.is_container() {
                    return None;
                }
                match node.children().get(point.offset) {
                    Some(child) => self.cache.get(child).map(|child| child.location),
                    None => Some(item.text_start()),
                }
            }
        }
    }

    pub fn flat_to_point(&self, offset: usize) -> Option<Point> {
        if offset >= self.index.total_length() {
            return self.end_point();
        }
        let key = self.index.find_node_at(offset)?;
        let node = self.tree.get(key)?;
        let item = self.cache.get(key)?;
        match &node.kind {
            NodeKind::Text(text) => Some(Point::text(
                key.clone(),
                (offset - item.text_start()).min(char_len(&text.text)),
            )),
            NodeKind::LineBreak | NodeKind::Decorator(_) => {
                let parent = node.parent.clone()?;
                let index = self.tree.index_in_parent(key)?;
                if offset == item.location {
                    Some(Point::element(parent, index))
                } else {
                    Some(Point::element(parent, index + 1))
                }
            }
            NodeKind::Root { .. } | NodeKind::Element { .. } => Some(Point::element(key.clone(), 0)),
        }
    }

    /// Point at the very end of the document.
    fn end_point(&self) -> Option<Point> {
        let mut key = self.tree.root_key().clone();
        while let Some(last) = self.tree.children(&key).last() {
            key = last.clone();
        }
        let node = self.tree.get(&key)?;
        match &node.kind {
            NodeKind::Text(text) => Some(Point::text(key, char_len(&text.text))),
            NodeKind::LineBreak | NodeKind::Decorator(_) => {
                let parent = node.parent.clone()?;
                let index = self.tree.index_in_parent(&key)?;
                Some(Point::element(parent, index + 1))
            }
            NodeKind::Root { .. } | NodeKind::Element { .. } => Some(Point::element(key, 0)),
        }
    }

    pub fn selection_to_flat(&self, selection: &Selection) -> Option<FlatSelection> {
        match selection {
            Selection::Range { anchor, focus } => Some(FlatSelection {
                anchor: self.point_to_flat(anchor)?,
                focus: self.point_to_flat(focus)?,
            }),
            Selection::Node { keys } => {
                let items: Vec<_> = keys.iter().filter_map(|key| self.cache.get(key)).collect();
                let start = items.iter().map(|item| item.location).min()?;
                let end = items.iter().map(|item| item.end()).max()?;
                Some(FlatSelection {
                    anchor: start,
                    focus: end,
                })
            }
        }
    }

    pub fn flat_to_selection(&self, flat: FlatSelection) -> Option<Selection> {
        Some(Selection::Range {
            anchor: self.flat_to_point(flat.anchor)?,
            focus: self.flat_to_point(flat.focus)?,
        })
    }
}

/// Move a flat offset through edits applied in order.
///
/// Offsets before an edit stay put, offsets after it shift by its length
/// delta, and offsets inside a replaced range are clamped into the
/// replacement.
pub fn remap_offset(offset: usize, edits: &[TextEdit]) -> usize {
    edits.iter().fold(offset, |offset, edit| match edit {
        TextEdit::Replace { range, fragments } => {
            let inserted = fragments_len(fragments);
            if offset <= range.start {
                offset
            } else if offset >= range.end {
                offset - range.len() + inserted
            } else {
                range.start + (offset - range.start).min(inserted)
            }
        }
        TextEdit::SetAttributes { .. } => offset,
    })
}

//! Full rendering of a tree (or one subtree) into attributed fragments.
//!
//! This is the legacy path and the oracle every incremental stage is
//! checked against.

use crate::node::{Attributes, NodeKey};
use crate::offset_index::NodeOffsetIndex;
use crate::range_cache::{RangeCache, RangeCacheItem};
use crate::text::{Fragment, fragments_len, push_fragment};
use crate::tree::{DocumentTree, Visit};

pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Flat text and range cache of a whole document.
#[derive(Debug, Clone, Default)]
pub struct Rendered {
    pub fragments: Vec<Fragment>,
    pub cache: RangeCache,
}

impl Rendered {
    pub fn text(&self) -> String {
        self.fragments.iter().map(|f| f.text.as_str()).collect()
    }

    pub fn len_chars(&self) -> usize {
        fragments_len(&self.fragments)
    }
}

/// Flat text of one subtree placed at a given location.
#[derive(Debug, Clone, Default)]
pub(crate) struct RenderedSubtree {
    pub fragments: Vec<Fragment>,
    pub items: Vec<(NodeKey, RangeCacheItem)>,
    pub length: usize,
}

/// Render the subtree rooted at `key` as if it started at `location`.
pub(crate) fn render_subtree(tree: &DocumentTree, key: &NodeKey, location: usize) -> RenderedSubtree {
    let mut out = RenderedSubtree::default();
    let mut cursor = location;
    // (location, preamble length) of every open node.
    let mut open: Vec<(usize, usize)> = Vec::new();

    for visit in tree.walk(key) {
        match visit {
            Visit::Enter(k) => {
                let preamble = tree.preamble(&k);
                push_fragment(&mut out.fragments, preamble, Attributes::plain());
                let preamble_length = char_len(preamble);
                open.push((cursor, preamble_length));
                cursor += preamble_length;
            }
            Visit::Leave(k) => {
                let Some((node_location, preamble_length)) = open.pop() else {
                    continue;
                };
                let children_length = cursor - node_location - preamble_length;
                let (text, attributes) = tree
                    .get(&k)
                    .map(|node| (node.own_text(), node.own_attributes()))
                    .unwrap_or(("", Attributes::plain()));
                push_fragment(&mut out.fragments, text, attributes);
                let text_length = char_len(text);
                let postamble = tree.postamble(&k);
                push_fragment(&mut out.fragments, postamble, Attributes::plain());
                let postamble_length = char_len(postamble);
                cursor += text_length + postamble_length;
                out.items.push((
                    k,
                    RangeCacheItem {
                        location: node_location,
                        preamble_length,
                        children_length,
                        text_length,
                        postamble_length,
                    },
                ));
            }
        }
    }
    out.length = cursor - location;
    out
}

/// Render the whole document from scratch.
pub fn render_document(tree: &DocumentTree) -> Rendered {
    let subtree = render_subtree(tree, tree.root_key(), 0);
    let mut cache = RangeCache::new();
    for (key, item) in subtree.items {
        cache.insert(key, item);
    }
    Rendered {
        fragments: subtree.fragments,
        cache,
    }
}

/// Length of `key`'s entry in the offset index.
///
/// Preamble plus own text. A node without children also carries the
/// postamble of every element it is the last pre-order node of, so that the
/// entries partition the flat text exactly.
pub(crate) fn index_entry_length(tree: &DocumentTree, key: &NodeKey) -> usize {
    let Some(node) = tree.get(key) else {
        return 0;
    };
    let mut length = char_len(node.preamble()) + char_len(node.own_text());
    if !node.children().is_empty() {
        return length;
    }
    length += char_len(tree.postamble(key));
    let mut current = key;
    while let Some(parent) = tree.parent(current) {
        if tree.children(parent).last() != Some(current) {
            break;
        }
        length += char_len(tree.postamble(parent));
        current = parent;
    }
    length
}

/// Re-register every node of `tree` in document order.
pub(crate) fn register_document(tree: &DocumentTree, index: &mut NodeOffsetIndex) {
    index.reset();
    for key in tree.subtree_keys(tree.root_key()) {
        let length = index_entry_length(tree, &key);
        index.register_node(key, length);
    }
}

//! Document nodes.
//!
//! Nodes are immutable once a tree version is committed. A transaction
//! clones the `Arc` it wants to change and writes through `Arc::make_mut`,
//! so untouched nodes are shared between consecutive versions.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use smol_str::{SmolStr, format_smolstr};

/// Stable node identity. Survives edits, moves and re-parenting.
pub type NodeKey = SmolStr;

/// Object replacement character standing in for a decorator in flat text.
pub const DECORATOR_CHAR: char = '\u{FFFC}';

/// Marker emitted before the children of a list item.
pub const LIST_ITEM_MARKER: &str = "• ";

/// Separator emitted after a block that has a next sibling.
pub const BLOCK_SEPARATOR: &str = "\n";

/// Generate a node key from a monotonic counter.
pub fn make_node_key(index: u64) -> NodeKey {
    format_smolstr!("n-{}", index)
}

bitflags! {
    /// Inline text formatting bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct TextFormat: u8 {
        const BOLD = 1;
        const ITALIC = 1 << 1;
        const UNDERLINE = 1 << 2;
        const STRIKETHROUGH = 1 << 3;
    }
}

/// Attributes attached to every character of flat text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Attributes {
    pub format: TextFormat,
    pub style: SmolStr,
    /// Set on the replacement character of a decorator.
    pub decorator: Option<NodeKey>,
}

impl Attributes {
    pub fn plain() -> Self {
        Self::default()
    }

    pub fn text(format: TextFormat, style: SmolStr) -> Self {
        Self {
            format,
            style,
            decorator: None,
        }
    }

    pub fn decorator(key: NodeKey) -> Self {
        Self {
            decorator: Some(key),
            ..Self::default()
        }
    }
}

/// Block element kinds. Every element is block level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Paragraph,
    Quote,
    Code,
    List,
    ListItem,
}

impl ElementKind {
    /// Fixed text emitted before the element's children.
    pub fn preamble(self) -> &'static str {
        match self {
            ElementKind::ListItem => LIST_ITEM_MARKER,
            ElementKind::Paragraph | ElementKind::Quote | ElementKind::Code | ElementKind::List => {
                ""
            }
        }
    }

    /// Whether this element holds other blocks rather than inline content.
    pub fn is_container(self) -> bool {
        matches!(
            self,
            ElementKind::Quote | ElementKind::List | ElementKind::Code
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextNode {
    pub text: String,
    pub format: TextFormat,
    pub style: SmolStr,
}

impl TextNode {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: TextFormat::empty(),
            style: SmolStr::default(),
        }
    }

    pub fn attributes(&self) -> Attributes {
        Attributes::text(self.format, self.style.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoratorNode {
    /// What the view layer should build, e.g. `image` or `mention`.
    pub kind: SmolStr,
    /// Content the view renders. Changing it redecorates the view.
    pub payload: SmolStr,
}

/// Type tag plus per-type data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Root { children: Vec<NodeKey> },
    Element {
        kind: ElementKind,
        children: Vec<NodeKey>,
    },
    Text(TextNode),
    LineBreak,
    Decorator(DecoratorNode),
}

/// One node of a document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub key: NodeKey,
    pub parent: Option<NodeKey>,
    pub kind: NodeKind,
}

impl Node {
    pub fn root(key: NodeKey) -> Self {
        Self {
            key,
            parent: None,
            kind: NodeKind::Root {
                children: Vec::new(),
            },
        }
    }

    pub fn new(key: NodeKey, kind: NodeKind) -> Self {
        Self {
            key,
            parent: None,
            kind,
        }
    }

    pub fn children(&self) -> &[NodeKey] {
        match &self.kind {
            NodeKind::Root { children } | NodeKind::Element { children, .. } => children,
            NodeKind::Text(_) | NodeKind::LineBreak | NodeKind::Decorator(_) => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<NodeKey>> {
        match &mut self.kind {
            NodeKind::Root { children } | NodeKind::Element { children, .. } => Some(children),
            NodeKind::Text(_) | NodeKind::LineBreak | NodeKind::Decorator(_) => None,
        }
    }

    /// Root or element: anything that can hold children.
    pub fn is_container(&self) -> bool {
        matches!(self.kind, NodeKind::Root { .. } | NodeKind::Element { .. })
    }

    /// Text, line break or decorator.
    pub fn is_leaf(&self) -> bool {
        !self.is_container()
    }

    pub fn is_root(&self) -> bool {
        matches!(self.kind, NodeKind::Root { .. })
    }

    pub fn is_element(&self) -> bool {
        matches!(self.kind, NodeKind::Element { .. })
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, NodeKind::Text(_))
    }

    pub fn is_decorator(&self) -> bool {
        matches!(self.kind, NodeKind::Decorator(_))
    }

    pub fn element_kind(&self) -> Option<ElementKind> {
        match self.kind {
            NodeKind::Element { kind, .. } => Some(kind),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextNode> {
        match &self.kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_text_mut(&mut self) -> Option<&mut TextNode> {
        match &mut self.kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_decorator(&self) -> Option<&DecoratorNode> {
        match &self.kind {
            NodeKind::Decorator(decorator) => Some(decorator),
            _ => None,
        }
    }

    /// Preamble, independent of position in the tree.
    pub fn preamble(&self) -> &'static str {
        self.element_kind().map(ElementKind::preamble).unwrap_or("")
    }

    /// The node's own text, not counting children or boundaries.
    pub fn own_text(&self) -> &str {
        match &self.kind {
            NodeKind::Text(text) => &text.text,
            NodeKind::LineBreak => "\n",
            NodeKind::Decorator(_) => "\u{FFFC}",
            NodeKind::Root { .. } | NodeKind::Element { .. } => "",
        }
    }

    /// Attributes for the node's own text.
    pub fn own_attributes(&self) -> Attributes {
        match &self.kind {
            NodeKind::Text(text) => text.attributes(),
            NodeKind::Decorator(_) => Attributes::decorator(self.key.clone()),
            NodeKind::Root { .. } | NodeKind::Element { .. } | NodeKind::LineBreak => {
                Attributes::plain()
            }
        }
    }
}

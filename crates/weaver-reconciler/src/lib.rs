//! weaver-reconciler: incremental reconciliation for the weaver rich-text editor.
//!
//! This crate provides:
//! - `DocumentTree` - immutable, structurally shared node trees
//! - `Reconciler` - turns the flat text of one tree version into the next
//!   with the cheapest applicable stage, backed by a `RangeCache` and a
//!   Fenwick-tree `NodeOffsetIndex`
//! - `DecoratorLifecycleTracker` - view lifecycle of inline decorators
//! - `SelectionCoordinateTranslator` - points ↔ flat offsets
//! - `Editor` - atomic update transactions, undo/redo and commands over a
//!   `TextStorage` (ropey-backed `EditorRope` by default)

pub mod actions;
pub mod config;
pub mod decorator;
pub mod dirty;
pub mod editor;
pub mod error;
pub mod execute;
pub mod fenwick;
pub mod history;
pub mod node;
pub mod offset_index;
pub mod platform;
pub mod range_cache;
pub mod reconciler;
pub mod selection;
pub mod text;
pub mod text_helpers;
pub mod transaction;
pub mod tree;

pub use actions::EditorAction;
pub use config::ReconcilerConfig;
pub use decorator::{DecoratorCacheEntry, DecoratorEvent, DecoratorLifecycleTracker, ViewId};
pub use dirty::{DirtyCause, DirtySet};
pub use editor::{Editor, EditorState};
pub use error::{ConfigError, InvariantViolation, ReconcileError, Result, StorageError};
pub use execute::execute_action;
pub use fenwick::FenwickTree;
pub use history::{History, Snapshot, UndoManager};
pub use node::{
    Attributes, DECORATOR_CHAR, DecoratorNode, ElementKind, Node, NodeKey, NodeKind, TextFormat,
    TextNode, make_node_key,
};
pub use offset_index::NodeOffsetIndex;
pub use platform::{DecoratorHost, HostCall, RecordingHost};
pub use range_cache::{RangeCache, RangeCacheItem};
pub use reconciler::render::{Rendered, render_document};
pub use reconciler::{ReconcileOutput, ReconcileStage, Reconciler};
pub use selection::{
    FlatSelection, Point, PointKind, Selection, SelectionCoordinateTranslator, remap_offset,
};
pub use smol_str::SmolStr;
pub use text::{AttributeRun, EditorRope, Fragment, TextEdit, TextStorage};
pub use transaction::Transaction;
pub use tree::{DocumentOrder, DocumentTree, ROOT_KEY, TreeBuilder};

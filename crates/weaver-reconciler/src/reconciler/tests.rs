use smol_str::SmolStr;

use super::*;
use crate::decorator::{DecoratorCacheEntry, ViewId};
use crate::dirty::DirtyCause;
use crate::error::ReconcileError;
use crate::node::{ElementKind, NodeKey, TextFormat};
use crate::platform::{HostCall, RecordingHost};
use crate::range_cache::{Anchor, Component, LengthDelta};
use crate::text::EditorRope;
use crate::transaction::Transaction;
use crate::tree::{DocumentOrder, TreeBuilder};

fn k(s: &str) -> NodeKey {
    SmolStr::new(s)
}

/// Tree, storage and reconciler moved forward together.
struct Harness {
    tree: DocumentTree,
    storage: EditorRope,
    reconciler: Reconciler,
}

impl Harness {
    fn new(tree: DocumentTree, config: ReconcilerConfig) -> Self {
        let mut storage = EditorRope::new();
        let mut reconciler = Reconciler::new(config);
        let output = reconciler
            .reconcile(None, &tree, &DirtySet::new(), &mut storage)
            .unwrap();
        assert_eq!(output.stage, ReconcileStage::FullRebuild);
        Self {
            tree,
            storage,
            reconciler,
        }
    }

    fn try_apply(
        &mut self,
        edit: impl FnOnce(&mut Transaction) -> Result<()>,
    ) -> Result<ReconcileOutput> {
        let mut txn = Transaction::new(self.tree.clone(), None, 100);
        edit(&mut txn)?;
        let committed = txn.commit(&self.tree);
        let output = self.reconciler.reconcile(
            Some(&self.tree),
            &committed.tree,
            &committed.dirty,
            &mut self.storage,
        )?;
        self.tree = committed.tree;
        Ok(output)
    }

    fn apply(&mut self, edit: impl FnOnce(&mut Transaction) -> Result<()>) -> ReconcileOutput {
        self.try_apply(edit).unwrap()
    }

    fn text(&self) -> String {
        self.storage.to_string()
    }

    fn location(&self, key: &str) -> usize {
        self.reconciler.range_cache().get(&k(key)).unwrap().location
    }
}

fn three_blocks() -> DocumentTree {
    let mut b = TreeBuilder::new();
    let root = b.root();
    for (p, t, text) in [("A", "a", "Hello"), ("B", "b", "World"), ("C", "c", "!!")] {
        let p = b.paragraph(&root, p);
        b.text(&p, t, text);
    }
    b.build()
}

#[test]
fn test_first_render_is_full_rebuild() {
    let harness = Harness::new(three_blocks(), ReconcilerConfig::strict());
    assert_eq!(harness.text(), "Hello\nWorld\n!!");
    assert_eq!(harness.reconciler.offset_index().total_length(), 14);
}

#[test]
fn test_attribute_only() {
    let mut harness = Harness::new(three_blocks(), ReconcilerConfig::strict());
    let output = harness.apply(|txn| txn.set_format(&k("b"), TextFormat::BOLD));
    assert_eq!(output.stage, ReconcileStage::AttributeOnly);
    assert!(output.edits.iter().all(TextEdit::is_attribute_only));
    assert_eq!(harness.text(), "Hello\nWorld\n!!");
    assert_eq!(
        harness.storage.attributes_at(7).map(|a| a.format),
        Some(TextFormat::BOLD)
    );
    assert_eq!(
        harness.storage.attributes_at(11).map(|a| a.format),
        Some(TextFormat::empty())
    );
}

#[test]
fn test_single_node_trims_edit() {
    let mut harness = Harness::new(three_blocks(), ReconcilerConfig::strict());
    let output = harness.apply(|txn| txn.set_text(&k("a"), "Help"));
    assert_eq!(output.stage, ReconcileStage::SingleNode);
    assert_eq!(output.edits.len(), 1);
    assert_eq!(output.edits[0].range(), &(3..5));
    assert_eq!(harness.text(), "Help\nWorld\n!!");
    assert_eq!(harness.location("B"), 5);
    assert_eq!(harness.location("c"), 11);
}

#[test]
fn test_single_node_with_new_format_replaces_whole_text() {
    let mut harness = Harness::new(three_blocks(), ReconcilerConfig::strict());
    let output = harness.apply(|txn| {
        txn.set_text(&k("b"), "Worlds")?;
        txn.set_format(&k("b"), TextFormat::ITALIC)
    });
    assert_eq!(output.stage, ReconcileStage::SingleNode);
    assert_eq!(output.edits[0].range(), &(6..11));
    assert_eq!(harness.text(), "Hello\nWorlds\n!!");
}

#[test]
fn test_keyed_diff_for_several_nodes() {
    let mut harness = Harness::new(three_blocks(), ReconcilerConfig::strict());
    let output = harness.apply(|txn| {
        txn.set_text(&k("a"), "Hi")?;
        txn.set_text(&k("c"), "?!?")?;
        txn.set_format(&k("b"), TextFormat::UNDERLINE)
    });
    assert_eq!(output.stage, ReconcileStage::KeyedDiff);
    assert_eq!(harness.text(), "Hi\nWorld\n?!?");
    // Applied back to front.
    let starts: Vec<usize> = output.edits.iter().map(|e| e.range().start).collect();
    let mut sorted = starts.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(starts, sorted);
    assert_eq!(harness.location("B"), 3);
    assert_eq!(harness.location("C"), 9);
}

#[test]
fn test_mixed_deltas_in_one_pass() {
    // A(0, 10), B(10, 5), C(15, 7) inside one paragraph.
    let mut b = TreeBuilder::new();
    let root = b.root();
    let p = b.paragraph(&root, "P");
    b.text(&p, "A", "0123456789");
    b.text(&p, "B", "abcde");
    b.text(&p, "C", "ABCDEFG");
    let tree = b.build();

    for central in [true, false] {
        let config = ReconcilerConfig::strict().with_central_aggregation(central);
        let mut harness = Harness::new(tree.clone(), config);
        assert_eq!(
            (harness.location("A"), harness.location("B"), harness.location("C")),
            (0, 10, 15)
        );
        let output = harness.apply(|txn| {
            txn.set_text(&k("A"), "0123456789xy")?;
            txn.set_text(&k("C"), "ABCDEF")
        });
        assert_eq!(output.stage, ReconcileStage::KeyedDiff);
        assert_eq!(
            (harness.location("A"), harness.location("B"), harness.location("C")),
            (0, 12, 17)
        );
        let index = harness.reconciler.offset_index();
        assert_eq!(index.get_node_position(&k("B")), Some(12));
        assert_eq!(index.get_node_position(&k("C")), Some(17));
    }

    // The same deltas applied straight to the cache.
    let order = DocumentOrder::of(&tree);
    let mut cache = render_document(&tree).cache;
    cache
        .apply_deltas(
            &order,
            &[
                LengthDelta::own(Anchor::Enter(k("A")), Component::Text, 2),
                LengthDelta::own(Anchor::Enter(k("C")), Component::Text, -1),
            ],
            true,
        )
        .unwrap();
    let locations: Vec<usize> = ["A", "B", "C"]
        .iter()
        .map(|key| cache.get(&k(key)).unwrap().location)
        .collect();
    assert_eq!(locations, vec![0, 12, 17]);
}

#[test]
fn test_insert_block_append_and_middle() {
    let mut harness = Harness::new(three_blocks(), ReconcilerConfig::strict());
    let output = harness.apply(|txn| {
        let p = txn.create_paragraph();
        let t = txn.create_text("new");
        txn.append(&p, &t)?;
        let root = txn.root();
        txn.append(&root, &p)
    });
    assert_eq!(output.stage, ReconcileStage::InsertBlock);
    assert_eq!(output.edits.len(), 1);
    assert_eq!(harness.text(), "Hello\nWorld\n!!\nnew");

    let output = harness.apply(|txn| {
        let p = txn.create_paragraph();
        let t = txn.create_text("mid");
        txn.append(&p, &t)?;
        txn.insert_after(&k("A"), &p)
    });
    assert_eq!(output.stage, ReconcileStage::InsertBlock);
    assert_eq!(output.edits[0].range(), &(6..6));
    assert_eq!(harness.text(), "Hello\nmid\nWorld\n!!\nnew");
    assert_eq!(harness.location("B"), 10);
}

#[test]
fn test_insert_into_empty_root() {
    let mut harness = Harness::new(DocumentTree::new(), ReconcilerConfig::strict());
    assert_eq!(harness.text(), "");
    let output = harness.apply(|txn| {
        let p = txn.create_paragraph();
        let t = txn.create_text("first");
        txn.append(&p, &t)?;
        let root = txn.root();
        txn.append(&root, &p)
    });
    assert_eq!(output.stage, ReconcileStage::InsertBlock);
    assert_eq!(harness.text(), "first");
}

#[test]
fn test_block_rebuild_on_removal() {
    let mut harness = Harness::new(three_blocks(), ReconcilerConfig::strict());
    let output = harness.apply(|txn| txn.remove(&k("C")));
    assert_eq!(output.stage, ReconcileStage::BlockRebuild);
    assert_eq!(harness.text(), "Hello\nWorld");
    assert!(harness.reconciler.range_cache().get(&k("c")).is_none());
}

#[test]
fn test_block_rebuild_limited_to_subtree() {
    let mut harness = Harness::new(three_blocks(), ReconcilerConfig::strict());
    let output = harness.apply(|txn| {
        let t = txn.create_text(" again");
        txn.append(&k("B"), &t)?;
        txn.set_text(&k("b"), "world")
    });
    assert_eq!(output.stage, ReconcileStage::BlockRebuild);
    assert_eq!(output.edits.len(), 1);
    // Inside B's old range 6..12, minus the separator both versions keep.
    assert_eq!(output.edits[0].range(), &(6..11));
    assert_eq!(harness.text(), "Hello\nworld again\n!!");
}

fn two_paragraphs(first: (&str, TextFormat), second: (&str, TextFormat)) -> DocumentTree {
    let mut b = TreeBuilder::new();
    let root = b.root();
    let p1 = b.paragraph(&root, "p1");
    b.formatted_text(&p1, "t1", first.0, first.1);
    let p2 = b.paragraph(&root, "p2");
    b.formatted_text(&p2, "t2", second.0, second.1);
    b.build()
}

#[test]
fn test_reorder_with_identical_text_leaves_storage_alone() {
    let plain = TextFormat::empty();
    let tree = two_paragraphs(("same", plain), ("same", plain));
    let mut harness = Harness::new(tree, ReconcilerConfig::strict());

    let output = harness.apply(|txn| txn.insert(&k("root"), 2, &k("p1")));
    assert_eq!(output.stage, ReconcileStage::BlockRebuild);
    assert!(output.edits.is_empty());
    assert_eq!(harness.text(), "same\nsame");
    assert_eq!(harness.location("p2"), 0);
    assert_eq!(harness.location("p1"), 5);
    assert_eq!(harness.reconciler.offset_index().find_node_at(6), Some(&k("t1")));
}

#[test]
fn test_reorder_replaces_only_differing_span() {
    let plain = TextFormat::empty();
    let tree = two_paragraphs(("ab", plain), ("ac", plain));
    let mut harness = Harness::new(tree, ReconcilerConfig::strict());

    let output = harness.apply(|txn| txn.insert(&k("root"), 0, &k("p2")));
    assert_eq!(output.stage, ReconcileStage::BlockRebuild);
    assert_eq!(
        output.edits,
        vec![TextEdit::Replace {
            range: 1..5,
            fragments: vec![Fragment::plain("c\nab")],
        }]
    );
    assert_eq!(harness.text(), "ac\nab");
}

#[test]
fn test_reorder_with_same_text_but_new_attributes() {
    let tree = two_paragraphs(("x", TextFormat::BOLD), ("x", TextFormat::empty()));
    let mut harness = Harness::new(tree, ReconcilerConfig::strict());

    let output = harness.apply(|txn| txn.insert(&k("root"), 0, &k("p2")));
    assert_eq!(output.stage, ReconcileStage::BlockRebuild);
    assert_eq!(output.edits.len(), 1);
    assert_eq!(output.edits[0].range(), &(0..3));
    assert_eq!(harness.text(), "x\nx");
    assert_eq!(
        harness.storage.attributes_at(2).map(|attributes| attributes.format),
        Some(TextFormat::BOLD)
    );
}

#[test]
fn test_keyed_diff_disabled_falls_back_to_block_rebuild() {
    let config = ReconcilerConfig::strict().with_keyed_diff(false);
    let mut harness = Harness::new(three_blocks(), config);
    let output = harness.apply(|txn| {
        txn.set_text(&k("a"), "Hi")?;
        txn.set_text(&k("b"), "There")
    });
    assert_eq!(output.stage, ReconcileStage::BlockRebuild);
    assert_eq!(harness.text(), "Hi\nThere\n!!");
}

#[test]
fn test_everything_disabled_falls_back_to_full() {
    let config = ReconcilerConfig::strict()
        .with_keyed_diff(false)
        .with_block_rebuild(false)
        .with_insert_block_fast_path(false);
    let mut harness = Harness::new(three_blocks(), config);
    let output = harness.apply(|txn| txn.remove(&k("A")));
    assert_eq!(output.stage, ReconcileStage::FullRebuild);
    assert_eq!(harness.text(), "World\n!!");
}

#[test]
fn test_legacy_config_always_rebuilds() {
    let mut harness = Harness::new(three_blocks(), ReconcilerConfig::legacy());
    let output = harness.apply(|txn| txn.set_text(&k("a"), "Hey"));
    assert_eq!(output.stage, ReconcileStage::FullRebuild);
    assert_eq!(harness.text(), "Hey\nWorld\n!!");
}

#[test]
fn test_orphaned_dirty_key_is_rejected() {
    let tree = three_blocks();
    let mut storage = EditorRope::new();
    let mut reconciler = Reconciler::new(ReconcilerConfig::strict());
    reconciler
        .reconcile(None, &tree, &DirtySet::new(), &mut storage)
        .unwrap();

    let dirty: DirtySet = [(k("ghost"), DirtyCause::UserInitiated)].into_iter().collect();
    let err = reconciler
        .reconcile(Some(&tree), &tree, &dirty, &mut storage)
        .unwrap_err();
    assert_eq!(
        err,
        ReconcileError::InvariantViolation(InvariantViolation::OrphanedDirtyKey(k("ghost")))
    );
}

#[test]
fn test_strict_mode_catches_missing_dirty_marks() {
    let tree = three_blocks();
    let mut storage = EditorRope::new();
    let mut reconciler = Reconciler::new(ReconcilerConfig::strict());
    reconciler
        .reconcile(None, &tree, &DirtySet::new(), &mut storage)
        .unwrap();

    // Change a node without telling the reconciler.
    let mut txn = Transaction::new(tree.clone(), None, 0);
    txn.set_text(&k("a"), "Sneaky").unwrap();
    let next = txn.commit(&tree).tree;

    let err = reconciler
        .reconcile(Some(&tree), &next, &DirtySet::new(), &mut storage)
        .unwrap_err();
    assert!(matches!(err, ReconcileError::StrictModeMismatch { .. }));
}

#[test]
fn test_moved_decorator_keeps_view() {
    let mut b = TreeBuilder::new();
    let root = b.root();
    let p1 = b.paragraph(&root, "p1");
    b.text(&p1, "t1", "a");
    b.decorator(&p1, "d", "image", "cat.png");
    let p2 = b.paragraph(&root, "p2");
    b.text(&p2, "t2", "b");
    let mut harness = Harness::new(b.build(), ReconcilerConfig::strict());

    let mut host = RecordingHost::new();
    harness
        .reconciler
        .decorators_mut()
        .drive(&mut host, &harness.tree);
    assert_eq!(
        host.take_calls(),
        vec![
            HostCall::Create(k("d"), ViewId(1)),
            HostCall::Reposition(k("d"), ViewId(1), 1),
        ]
    );

    let output = harness.apply(|txn| txn.append(&k("p2"), &k("d")));
    assert_eq!(harness.text(), "a\nb\u{FFFC}");
    assert!(output.decorator_events.contains(&DecoratorEvent::Moved {
        key: k("d"),
        position: 3
    }));
    assert_eq!(
        harness.reconciler.decorators().entry(&k("d")),
        Some(&DecoratorCacheEntry::Mounted(ViewId(1)))
    );

    harness
        .reconciler
        .decorators_mut()
        .drive(&mut host, &harness.tree);
    assert_eq!(
        host.take_calls(),
        vec![HostCall::Reposition(k("d"), ViewId(1), 3)]
    );
}

#[test]
fn test_payload_change_redecorates() {
    let mut b = TreeBuilder::new();
    let root = b.root();
    let p = b.paragraph(&root, "p");
    b.decorator(&p, "d", "mention", "@alice");
    let mut harness = Harness::new(b.build(), ReconcilerConfig::strict());
    let mut host = RecordingHost::new();
    harness
        .reconciler
        .decorators_mut()
        .drive(&mut host, &harness.tree);
    host.take_calls();

    let output = harness.apply(|txn| txn.set_payload(&k("d"), "@bob"));
    assert_eq!(output.stage, ReconcileStage::AttributeOnly);
    assert_eq!(
        output.decorator_events,
        vec![DecoratorEvent::NeedsDecorating(k("d"))]
    );
    harness
        .reconciler
        .decorators_mut()
        .drive(&mut host, &harness.tree);
    assert_eq!(host.take_calls(), vec![HostCall::Redecorate(k("d"), ViewId(1))]);
}

#[test]
fn test_list_preambles() {
    let mut b = TreeBuilder::new();
    let root = b.root();
    let list = b.element(&root, "l", ElementKind::List);
    let one = b.element(&list, "li1", ElementKind::ListItem);
    b.text(&one, "t1", "one");
    let mut harness = Harness::new(b.build(), ReconcilerConfig::strict());
    assert_eq!(harness.text(), "• one");

    let output = harness.apply(|txn| {
        let item = txn.create_element(ElementKind::ListItem);
        let t = txn.create_text("two");
        txn.append(&item, &t)?;
        txn.append(&k("l"), &item)
    });
    assert_eq!(output.stage, ReconcileStage::InsertBlock);
    assert_eq!(harness.text(), "• one\n• two");
}

//! End-to-end editing through actions: decorators, block merges, graphemes
//! and mixed scripts.

use weaver_reconciler::{
    DocumentTree, Editor, EditorAction, NodeKey, Point, PointKind, ReconcileStage,
    ReconcilerConfig, Selection, SmolStr, TextFormat, TreeBuilder,
};

fn k(s: &str) -> NodeKey {
    SmolStr::new(s)
}

fn editor(tree: DocumentTree) -> Editor {
    Editor::with_document(ReconcilerConfig::strict(), tree).unwrap()
}

fn two_paragraphs(first: &str, second: &str) -> Editor {
    let mut b = TreeBuilder::new();
    let root = b.root();
    let p1 = b.paragraph(&root, "p1");
    b.text(&p1, "t1", first);
    let p2 = b.paragraph(&root, "p2");
    b.text(&p2, "t2", second);
    editor(b.build())
}

fn place(editor: &mut Editor, point: Point) {
    assert!(editor.set_selection(Some(Selection::caret(point))));
}

fn caret(editor: &Editor) -> Point {
    editor
        .selection()
        .and_then(Selection::caret_point)
        .cloned()
        .unwrap()
}

fn press(editor: &mut Editor, action: EditorAction) {
    assert!(editor.dispatch(&action).unwrap(), "{action:?} was not handled");
}

#[test]
fn backspace_selects_then_deletes_decorator() {
    let mut b = TreeBuilder::new();
    let root = b.root();
    let p = b.paragraph(&root, "p");
    b.decorator(&p, "d", "image", "cat.png");
    b.text(&p, "hello", "Hello");
    let mut editor = editor(b.build());
    place(&mut editor, Point::text("hello", 0));
    assert_eq!(editor.text(), "\u{FFFC}Hello");

    press(&mut editor, EditorAction::DeleteBackward);
    assert_eq!(editor.selection(), Some(&Selection::node(k("d"))));
    assert_eq!(editor.text(), "\u{FFFC}Hello");

    press(&mut editor, EditorAction::DeleteBackward);
    assert_eq!(editor.text(), "Hello");
    assert!(!editor.tree().contains(&k("d")));
    assert_eq!(caret(&editor), Point::text("hello", 0));
}

#[test]
fn backspace_merges_decorator_block_into_previous() {
    let mut b = TreeBuilder::new();
    let root = b.root();
    let p1 = b.paragraph(&root, "p1");
    b.text(&p1, "t1", "Hello");
    let p2 = b.paragraph(&root, "p2");
    b.decorator(&p2, "d", "image", "cat.png");
    let mut editor = editor(b.build());
    place(&mut editor, Point::element("p2", 0));

    press(&mut editor, EditorAction::DeleteBackward);
    assert_eq!(editor.text(), "Hello\u{FFFC}");
    assert!(!editor.tree().contains(&k("p2")));
    assert_eq!(editor.tree().parent(&k("d")), Some(&k("p1")));
    assert_eq!(caret(&editor), Point::element("p1", 1));
}

#[test]
fn typing_into_new_editor() {
    let mut editor = Editor::new(ReconcilerConfig::strict()).unwrap();
    press(&mut editor, EditorAction::insert_text("hi"));
    press(&mut editor, EditorAction::insert_text(" there"));
    assert_eq!(editor.text(), "hi there");
    let point = caret(&editor);
    assert_eq!((point.kind, point.offset), (PointKind::Text, 8));
    assert_eq!(
        editor.last_output().map(|output| output.stage),
        Some(ReconcileStage::SingleNode)
    );
}

#[test]
fn emoji_sequences_delete_as_one() {
    let family = "👨\u{200D}👩\u{200D}👧";
    let mut editor = two_paragraphs(&format!("a{family}"), "b");
    place(&mut editor, Point::text("t1", 6));

    press(&mut editor, EditorAction::DeleteBackward);
    assert_eq!(editor.text(), "a\nb");
    assert_eq!(caret(&editor), Point::text("t1", 1));

    press(&mut editor, EditorAction::insert_text("🇯🇵"));
    place(&mut editor, Point::text("t1", 1));
    press(&mut editor, EditorAction::DeleteForward);
    assert_eq!(editor.text(), "a\nb");
}

#[test]
fn combining_marks_stay_with_base() {
    let mut editor = two_paragraphs("cafe\u{301}", "x");
    place(&mut editor, Point::text("t1", 5));
    press(&mut editor, EditorAction::DeleteBackward);
    assert_eq!(editor.text(), "caf\nx");
}

#[test]
fn cjk_editing() {
    let mut editor = two_paragraphs("日本語", "中文");
    place(&mut editor, Point::text("t1", 3));
    press(&mut editor, EditorAction::DeleteBackward);
    press(&mut editor, EditorAction::insert_text("人"));
    assert_eq!(editor.text(), "日本人\n中文");

    place(&mut editor, Point::text("t2", 0));
    press(&mut editor, EditorAction::DeleteBackward);
    assert_eq!(editor.text(), "日本人中文");
    assert_eq!(caret(&editor), Point::element("p1", 1));
}

#[test]
fn bidi_text_uses_logical_order() {
    let mut editor = two_paragraphs("שלום abc", "مرحبا");
    place(&mut editor, Point::text("t1", 0));
    press(&mut editor, EditorAction::DeleteForward);
    assert_eq!(editor.text(), "לום abc\nمرحبا");

    place(&mut editor, Point::text("t2", 5));
    press(&mut editor, EditorAction::DeleteBackward);
    assert_eq!(editor.text(), "לום abc\nمرحب");
    assert_eq!(caret(&editor), Point::text("t2", 4));
}

#[test]
fn enter_splits_and_backspace_joins() {
    let mut editor = two_paragraphs("Hello", "World");
    place(&mut editor, Point::text("t1", 2));
    press(&mut editor, EditorAction::InsertParagraph);
    assert_eq!(editor.text(), "He\nllo\nWorld");
    let point = caret(&editor);
    assert_eq!((point.kind, point.offset), (PointKind::Text, 0));
    assert_eq!(editor.tree().get(&point.key).map(|n| n.own_text()), Some("llo"));

    press(&mut editor, EditorAction::DeleteBackward);
    assert_eq!(editor.text(), "Hello\nWorld");
    assert_eq!(caret(&editor), Point::element("p1", 1));
}

#[test]
fn range_delete_across_blocks() {
    let mut editor = two_paragraphs("Hello", "World");
    assert!(editor.set_selection(Some(Selection::range(
        Point::text("t2", 3),
        Point::text("t1", 2),
    ))));
    press(&mut editor, EditorAction::DeleteBackward);
    assert_eq!(editor.text(), "Held");
    assert!(!editor.tree().contains(&k("p2")));
    assert_eq!(caret(&editor), Point::text("t1", 2));
}

#[test]
fn typing_replaces_selection() {
    let mut editor = two_paragraphs("Hello", "World");
    assert!(editor.set_selection(Some(Selection::range(
        Point::text("t1", 1),
        Point::text("t1", 4),
    ))));
    press(&mut editor, EditorAction::insert_text("ipp"));
    assert_eq!(editor.text(), "Hippo\nWorld");
}

#[test]
fn toggle_bold_on_and_off() {
    let mut editor = two_paragraphs("Hello", "World");
    assert!(editor.set_selection(Some(Selection::range(
        Point::text("t1", 1),
        Point::text("t1", 4),
    ))));
    press(&mut editor, EditorAction::toggle_bold());
    assert_eq!(editor.text(), "Hello\nWorld");

    let format_at = |editor: &Editor, offset: usize| {
        editor
            .storage()
            .attributes_at(offset)
            .map(|attributes| attributes.format)
    };
    assert_eq!(format_at(&editor, 0), Some(TextFormat::empty()));
    assert_eq!(format_at(&editor, 1), Some(TextFormat::BOLD));
    assert_eq!(format_at(&editor, 3), Some(TextFormat::BOLD));
    assert_eq!(format_at(&editor, 4), Some(TextFormat::empty()));

    press(&mut editor, EditorAction::toggle_bold());
    assert_eq!(format_at(&editor, 2), Some(TextFormat::empty()));
}

#[test]
fn line_breaks_and_decorators_inline() {
    let mut editor = two_paragraphs("Hello", "World");
    place(&mut editor, Point::text("t1", 5));
    press(&mut editor, EditorAction::InsertLineBreak);
    assert_eq!(editor.text(), "Hello\n\nWorld");
    assert_eq!(editor.tree().children(&k("p1")).len(), 2);

    press(
        &mut editor,
        EditorAction::InsertDecorator {
            kind: "mention".into(),
            payload: "@ana".into(),
        },
    );
    assert_eq!(editor.text(), "Hello\n\u{FFFC}\nWorld");
    assert_eq!(caret(&editor), Point::element("p1", 3));
    assert_eq!(editor.tree().decorators().len(), 1);
}

#[test]
fn select_all_and_delete_leaves_one_block() {
    let mut editor = two_paragraphs("Hello", "World");
    press(&mut editor, EditorAction::SelectAll);
    press(&mut editor, EditorAction::DeleteBackward);
    assert_eq!(editor.text(), "");
    assert_eq!(editor.tree().root_children().len(), 1);

    press(&mut editor, EditorAction::insert_text("again"));
    assert_eq!(editor.text(), "again");
}

#[test]
fn undo_redo_through_actions() {
    let mut editor = two_paragraphs("Hello", "World");
    place(&mut editor, Point::text("t1", 5));
    press(&mut editor, EditorAction::insert_text("!"));
    press(&mut editor, EditorAction::InsertParagraph);
    assert_eq!(editor.text(), "Hello!\n\nWorld");

    press(&mut editor, EditorAction::Undo);
    assert_eq!(editor.text(), "Hello!\nWorld");
    press(&mut editor, EditorAction::Undo);
    assert_eq!(editor.text(), "Hello\nWorld");
    assert_eq!(caret(&editor), Point::text("t1", 5));
    assert!(!editor.dispatch(&EditorAction::Undo).unwrap());

    press(&mut editor, EditorAction::Redo);
    assert_eq!(editor.text(), "Hello!\nWorld");
    assert_eq!(caret(&editor), Point::text("t1", 6));
}

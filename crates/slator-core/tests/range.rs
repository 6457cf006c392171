use pretty_assertions::assert_eq;
use slator_core::range::{before_range, range_string, text_before_cursor, unhang_range};
use slator_core::{
    Document, Editor, MarkKind, Marks, Node, PluginRegistry, Point, Selection, TextNode, kinds,
};

fn marked(text: &str, kind: MarkKind) -> Node {
    let mut marks = Marks::default();
    marks.set(kind, true);
    Node::Text(TextNode::with_marks(text, marks))
}

/// One paragraph of three leaves: "ab" bold, "cd" plain, "ef" italic.
fn three_leaves(focus: Point) -> Editor {
    Editor::new(
        Document {
            children: vec![
                Node::element(
                    kinds::PARAGRAPH,
                    vec![
                        marked("ab", MarkKind::Bold),
                        Node::text("cd"),
                        marked("ef", MarkKind::Italic),
                    ],
                ),
                Node::paragraph("next"),
            ],
        },
        Selection::collapsed(focus),
        PluginRegistry::richtext(),
    )
}

#[test]
fn before_range_runs_from_the_block_start_to_the_cursor() {
    let editor = three_leaves(Point::new(vec![0, 2], 1));

    let range = before_range(&editor).unwrap();
    assert_eq!(range.anchor, Point::new(vec![0, 0], 0));
    assert_eq!(range.focus, Point::new(vec![0, 2], 1));
    assert_eq!(
        range_string(editor.doc(), editor.registry(), &range).as_deref(),
        Some("abcde")
    );
    assert_eq!(text_before_cursor(&editor).as_deref(), Some("abcde"));
}

#[test]
fn before_range_needs_a_collapsed_cursor() {
    let mut editor = three_leaves(Point::new(vec![0, 0], 0));
    editor.set_selection(Selection::new(Point::new(vec![0, 0], 0), Point::new(vec![0, 1], 1)));

    assert_eq!(before_range(&editor), None);
    assert_eq!(text_before_cursor(&editor), None);
}

#[test]
fn range_string_stays_inside_one_block() {
    let editor = three_leaves(Point::new(vec![0, 0], 0));
    let across = Selection::new(Point::new(vec![0, 1], 1), Point::new(vec![1, 0], 2));

    assert_eq!(range_string(editor.doc(), editor.registry(), &across), None);
}

#[test]
fn text_before_cursor_keeps_the_last_characters() {
    let long = "x".repeat(310);
    let editor = Editor::new(
        Document {
            children: vec![Node::paragraph(&long)],
        },
        Selection::collapsed(Point::new(vec![0, 0], long.len())),
        PluginRegistry::richtext(),
    );

    assert_eq!(text_before_cursor(&editor).map(|t| t.len()), Some(300));
}

#[test]
fn unhang_moves_edges_off_neighbouring_leaves() {
    let editor = three_leaves(Point::new(vec![0, 1], 0));

    let hanging = Selection::new(Point::new(vec![0, 0], 2), Point::new(vec![0, 2], 0));
    let unhung = unhang_range(editor.doc(), editor.registry(), &hanging);
    assert_eq!(
        unhung,
        Selection::new(Point::new(vec![0, 1], 0), Point::new(vec![0, 1], 2))
    );

    // Direction is kept for a backward range.
    let backward = Selection::new(Point::new(vec![0, 2], 0), Point::new(vec![0, 0], 2));
    let unhung = unhang_range(editor.doc(), editor.registry(), &backward);
    assert_eq!(
        unhung,
        Selection::new(Point::new(vec![0, 1], 2), Point::new(vec![0, 1], 0))
    );

    // Edges inside their leaves stay put.
    let inner = Selection::new(Point::new(vec![0, 0], 1), Point::new(vec![0, 2], 1));
    assert_eq!(unhang_range(editor.doc(), editor.registry(), &inner), inner);
}

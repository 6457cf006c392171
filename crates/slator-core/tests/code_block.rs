use pretty_assertions::assert_eq;
use slator_core::{Document, Editor, Node, PluginRegistry, Point, Selection, kinds, toggle_code_block};

fn code(text: &str) -> Node {
    Node::element(kinds::CODE_BLOCK, vec![Node::text(text)])
}

fn editor_in_code(text: &str) -> Editor {
    Editor::new(
        Document {
            children: vec![code(text)],
        },
        Selection::collapsed(Point::new(vec![0, 0], text.len())),
        PluginRegistry::richtext(),
    )
}

#[test]
fn break_keeps_the_line_indent() {
    let mut editor = editor_in_code("fn main() {\n    let x = 1;");
    editor.insert_break().unwrap();
    editor.insert_text("x").unwrap();

    assert_eq!(
        editor.doc().children,
        vec![code("fn main() {\n    let x = 1;\n    x")]
    );
}

#[test]
fn first_line_indent_is_kept_too() {
    let mut editor = editor_in_code("\tfoo");
    editor.insert_break().unwrap();

    assert_eq!(editor.doc().children, vec![code("\tfoo\n\t")]);
}

#[test]
fn two_blank_lines_exit_the_block() {
    let mut editor = editor_in_code("  foo");
    editor.insert_break().unwrap();
    editor.insert_break().unwrap();
    assert_eq!(editor.doc().children, vec![code("  foo\n  \n  ")]);

    editor.insert_break().unwrap();
    assert_eq!(
        editor.doc().children,
        vec![code("  foo"), Node::paragraph("")]
    );
    assert_eq!(editor.selection().focus.path, vec![1, 0]);
}

#[test]
fn empty_code_block_exits_below_itself() {
    let mut editor = Editor::with_richtext_plugins();
    editor.type_text("`` ").unwrap();
    assert_eq!(editor.doc().children, vec![code("")]);

    editor.type_text("\n\n\nafter").unwrap();
    assert_eq!(
        editor.doc().children,
        vec![code(""), Node::paragraph("after")]
    );
    assert_eq!(editor.selection().focus.path, vec![1, 0]);
}

#[test]
fn toggle_off_splits_lines_into_paragraphs() {
    let mut editor = editor_in_code("a\n\nb");
    toggle_code_block(&mut editor).unwrap();

    assert_eq!(
        editor.doc().children,
        vec![Node::paragraph("a"), Node::paragraph("b")]
    );
    assert_eq!(editor.selection().focus.path, vec![1, 0]);
    assert_eq!(editor.selection().focus.offset, 1);
}

#[test]
fn toggle_command_round_trip_on_a_paragraph() {
    let mut editor = Editor::new(
        Document {
            children: vec![Node::paragraph("let y")],
        },
        Selection::collapsed(Point::new(vec![0, 0], 0)),
        PluginRegistry::richtext(),
    );

    editor.run_command("code_block.toggle", None).unwrap();
    assert_eq!(editor.doc().children, vec![code("let y")]);
    assert!(editor.run_query::<bool>("code_block.is_active", None).unwrap());

    editor.run_command("code_block.toggle", None).unwrap();
    assert_eq!(editor.doc().children, vec![Node::paragraph("let y")]);
}

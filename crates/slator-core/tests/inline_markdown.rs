use std::collections::BTreeSet;

use pretty_assertions::assert_eq;
use slator_core::range::cursor_block_offset;
use slator_core::{Editor, MarkKind, Marks, Node};

fn runs(editor: &Editor, block: usize) -> Vec<(String, Marks)> {
    let Some(Node::Element(el)) = editor.doc().children.get(block) else {
        panic!("expected a block at {block}");
    };
    el.children
        .iter()
        .filter_map(Node::as_text)
        .filter(|t| !t.text.is_empty())
        .map(|t| (t.text.clone(), t.marks.clone()))
        .collect()
}

fn closed(kind: MarkKind) -> Marks {
    let mut marks = Marks::default();
    marks.set(kind, true);
    marks.markdown = BTreeSet::from([kind]);
    marks
}

#[test]
fn bold_run_typed_char_by_char() {
    let mut editor = Editor::with_richtext_plugins();
    editor.type_text("**bold**").unwrap();

    assert_eq!(runs(&editor, 0), vec![("bold".to_string(), closed(MarkKind::Bold))]);
    assert_eq!(cursor_block_offset(&editor), Some((vec![0], 4)));
}

#[test]
fn marks_do_not_bleed_into_plain_text_between_runs() {
    let mut editor = Editor::with_richtext_plugins();
    editor.type_text("~~a~~ b **c**").unwrap();

    assert_eq!(
        runs(&editor, 0),
        vec![
            ("a".to_string(), closed(MarkKind::Strikethrough)),
            (" b ".to_string(), Marks::default()),
            ("c".to_string(), closed(MarkKind::Bold)),
        ]
    );
}

#[test]
fn nested_delimiters_stack_marks_on_one_run() {
    let mut editor = Editor::with_richtext_plugins();
    editor.type_text("~~**bold**~~").unwrap();

    let mut both = closed(MarkKind::Bold);
    both.set(MarkKind::Strikethrough, true);
    both.markdown.insert(MarkKind::Strikethrough);
    assert_eq!(runs(&editor, 0), vec![("bold".to_string(), both)]);
    assert_eq!(cursor_block_offset(&editor), Some((vec![0], 4)));
}

#[test]
fn adjacent_runs_keep_their_own_marks() {
    let mut editor = Editor::with_richtext_plugins();
    editor.type_text("**a**~~b~~c").unwrap();

    assert_eq!(
        runs(&editor, 0),
        vec![
            ("a".to_string(), closed(MarkKind::Bold)),
            ("b".to_string(), closed(MarkKind::Strikethrough)),
            ("c".to_string(), Marks::default()),
        ]
    );
}

#[test]
fn text_after_a_run_is_plain() {
    let mut editor = Editor::with_richtext_plugins();
    editor.type_text("`code` after").unwrap();

    assert_eq!(
        runs(&editor, 0),
        vec![
            ("code".to_string(), closed(MarkKind::Code)),
            (" after".to_string(), Marks::default()),
        ]
    );
}

#[test]
fn italic_run_after_plain_text() {
    let mut editor = Editor::with_richtext_plugins();
    editor.type_text("say __hi__").unwrap();

    assert_eq!(
        runs(&editor, 0),
        vec![
            ("say ".to_string(), Marks::default()),
            ("hi".to_string(), closed(MarkKind::Italic)),
        ]
    );
}

#[test]
fn unmatched_delimiters_stay_literal() {
    let mut editor = Editor::with_richtext_plugins();
    editor.type_text("a** b* ~~ `").unwrap();

    assert_eq!(editor.doc().children, vec![Node::paragraph("a** b* ~~ `")]);
}

#[test]
fn empty_run_is_not_a_match() {
    let mut editor = Editor::with_richtext_plugins();
    editor.type_text("****").unwrap();

    assert_eq!(editor.doc().children, vec![Node::paragraph("****")]);
}

#[test]
fn one_undo_restores_the_delimiters() {
    let mut editor = Editor::with_richtext_plugins();
    editor.type_text("**x**").unwrap();

    assert!(editor.undo());
    assert_eq!(editor.doc().children, vec![Node::paragraph("**x*")]);
}

#[test]
fn caret_mark_toggle_wins_over_run_end() {
    let mut editor = Editor::with_richtext_plugins();
    editor.type_text("**a**").unwrap();
    editor
        .run_command("marks.toggle", Some(serde_json::json!({ "mark": "italic" })))
        .unwrap();
    editor.type_text("b").unwrap();

    let mut italic_bold = closed(MarkKind::Bold);
    italic_bold.italic = true;
    assert_eq!(
        runs(&editor, 0),
        vec![
            ("a".to_string(), closed(MarkKind::Bold)),
            ("b".to_string(), italic_bold),
        ]
    );
}

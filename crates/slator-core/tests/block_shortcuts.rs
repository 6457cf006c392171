use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::Value;
use slator_core::markdown::block_shortcut;
use slator_core::{Document, Editor, Node, PluginRegistry, Point, Selection, focus_block, kinds};

fn editor_with(children: Vec<Node>, focus: Vec<usize>, offset: usize) -> Editor {
    let doc = Document { children };
    Editor::new(
        doc,
        Selection::collapsed(Point::new(focus, offset)),
        PluginRegistry::richtext(),
    )
}

fn block_kind(editor: &Editor, path: &[usize]) -> String {
    editor
        .doc()
        .element(path)
        .map(|el| el.kind.clone())
        .unwrap_or_default()
}

#[rstest]
#[case("# ", kinds::HEADING_ONE, None)]
#[case("## ", kinds::HEADING_TWO, None)]
#[case("### ", kinds::HEADING_THREE, None)]
#[case("> ", kinds::BLOCK_QUOTE, None)]
#[case("`` ", kinds::CODE_BLOCK, None)]
#[case("* ", kinds::LIST_ITEM, Some(kinds::BULLETED_LIST))]
#[case("- ", kinds::LIST_ITEM, Some(kinds::BULLETED_LIST))]
#[case("+ ", kinds::LIST_ITEM, Some(kinds::BULLETED_LIST))]
#[case("1. ", kinds::LIST_ITEM, Some(kinds::NUMBERED_LIST))]
#[case("[]- ", kinds::CHECK_LIST, None)]
#[case("[x]- ", kinds::CHECK_LIST, None)]
fn prefix_retypes_the_block(
    #[case] typed: &str,
    #[case] kind: &str,
    #[case] container: Option<&str>,
) {
    let mut editor = Editor::with_richtext_plugins();
    editor.type_text(typed).unwrap();

    let block = focus_block(&editor).unwrap();
    assert_eq!(block_kind(&editor, &block), kind);
    assert_eq!(editor.doc().node(&block).unwrap().string(), "");
    assert_eq!(editor.selection().focus.offset, 0);

    match container {
        Some(container) => {
            assert_eq!(block, vec![0, 0]);
            assert_eq!(block_kind(&editor, &[0]), container);
        }
        None => assert_eq!(block, vec![0]),
    }
}

#[test]
fn heading_prefix_leaves_an_empty_heading() {
    let mut editor = Editor::with_richtext_plugins();
    editor.type_text("# ").unwrap();

    assert_eq!(
        editor.doc().children,
        vec![Node::element(kinds::HEADING_ONE, vec![Node::text("")])]
    );
}

#[test]
fn numbered_prefix_wraps_only_the_current_block() {
    let mut editor = editor_with(
        vec![
            Node::paragraph("above"),
            Node::paragraph(""),
            Node::paragraph("below"),
        ],
        vec![1, 0],
        0,
    );
    editor.type_text("1. ").unwrap();

    assert_eq!(
        editor.doc().children,
        vec![
            Node::paragraph("above"),
            Node::element(
                kinds::NUMBERED_LIST,
                vec![Node::element(kinds::LIST_ITEM, vec![Node::text("")])]
            ),
            Node::paragraph("below"),
        ]
    );
    assert_eq!(editor.selection().focus.path, vec![1, 0, 0]);
}

#[test]
fn check_list_prefix_sets_checked() {
    let mut editor = Editor::with_richtext_plugins();
    editor.type_text("[x]- done").unwrap();

    let Node::Element(el) = &editor.doc().children[0] else {
        panic!("expected check-list");
    };
    assert_eq!(el.kind, kinds::CHECK_LIST);
    assert_eq!(el.attrs.get("checked"), Some(&Value::Bool(true)));
    assert_eq!(el.children, vec![Node::text("done")]);
}

#[test]
fn prefix_keeps_text_after_the_cursor() {
    let mut editor = editor_with(vec![Node::paragraph("##Title")], vec![0, 0], 2);
    editor.insert_text(" ").unwrap();

    assert_eq!(
        editor.doc().children,
        vec![Node::element(kinds::HEADING_TWO, vec![Node::text("Title")])]
    );
    assert_eq!(editor.selection().focus.offset, 0);
}

#[test]
fn divider_prefix_inserts_a_void_and_moves_on() {
    let mut editor = Editor::with_richtext_plugins();
    editor.type_text("--- next").unwrap();

    assert_eq!(
        editor.doc().children,
        vec![Node::divider(), Node::paragraph("next")]
    );
    assert_eq!(editor.selection().focus.path, vec![1, 0]);
}

#[test]
fn prefix_with_other_text_before_it_is_literal() {
    let mut editor = Editor::with_richtext_plugins();
    editor.type_text("a# b").unwrap();

    assert_eq!(editor.doc().children, vec![Node::paragraph("a# b")]);
}

#[test]
fn unknown_prefixes_do_not_match() {
    assert_eq!(block_shortcut("####"), None);
    assert_eq!(block_shortcut("2."), None);
    assert_eq!(block_shortcut("[ ]-"), None);
    assert!(block_shortcut("[]-").is_some_and(|s| s.checked == Some(false)));
}

#[test]
fn shortcut_is_a_single_undo_step() {
    let mut editor = Editor::with_richtext_plugins();
    editor.type_text("> ").unwrap();
    assert_eq!(block_kind(&editor, &[0]), kinds::BLOCK_QUOTE);

    assert!(editor.undo());
    assert_eq!(editor.doc().children, vec![Node::paragraph(">")]);
}

#[test]
fn list_prefix_inside_a_list_splits_it() {
    let mut editor = editor_with(
        vec![Node::element(
            kinds::BULLETED_LIST,
            vec![
                Node::element(kinds::LIST_ITEM, vec![Node::text("one")]),
                Node::element(kinds::LIST_ITEM, vec![Node::text("1.")]),
                Node::element(kinds::LIST_ITEM, vec![Node::text("three")]),
            ],
        )],
        vec![0, 1, 0],
        2,
    );
    editor.insert_text(" ").unwrap();

    let kinds_at_root: Vec<String> = (0..editor.doc().children.len())
        .map(|ix| block_kind(&editor, &[ix]))
        .collect();
    assert_eq!(
        kinds_at_root,
        vec![
            kinds::BULLETED_LIST.to_string(),
            kinds::NUMBERED_LIST.to_string(),
            kinds::BULLETED_LIST.to_string(),
        ]
    );
    assert_eq!(focus_block(&editor), Some(vec![1, 0]));
}

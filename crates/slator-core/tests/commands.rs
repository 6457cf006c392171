use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use slator_core::{
    ApplyError, Document, Editor, EditorPlugin, InputHandler, InputOutcome, MarkKind, Marks, Node,
    NodeSpec, PluginRegistry, Point, RegistryError, Selection, TextNode, kinds,
};

fn editor_with(children: Vec<Node>, focus: Vec<usize>, offset: usize) -> Editor {
    Editor::new(
        Document { children },
        Selection::collapsed(Point::new(focus, offset)),
        PluginRegistry::richtext(),
    )
}

fn bold() -> Marks {
    let mut marks = Marks::default();
    marks.set(MarkKind::Bold, true);
    marks
}

#[test]
fn toggle_mark_on_a_selection_splits_the_leaf() {
    let mut editor = editor_with(vec![Node::paragraph("hello")], vec![0, 0], 0);
    editor.set_selection(Selection::new(
        Point::new(vec![0, 0], 1),
        Point::new(vec![0, 0], 3),
    ));

    editor
        .run_command("marks.toggle", Some(json!({ "mark": "bold" })))
        .unwrap();
    assert_eq!(
        editor.doc().children,
        vec![Node::element(
            kinds::PARAGRAPH,
            vec![
                Node::text("h"),
                Node::Text(TextNode::with_marks("el", bold())),
                Node::text("lo"),
            ]
        )]
    );
    assert!(
        editor
            .run_query::<bool>("marks.is_active", Some(json!({ "mark": "bold" })))
            .unwrap()
    );

    editor
        .run_command("marks.toggle", Some(json!({ "mark": "bold" })))
        .unwrap();
    assert_eq!(editor.doc().children, vec![Node::paragraph("hello")]);
}

#[test]
fn toggle_mark_at_a_caret_applies_to_the_next_text() {
    let mut editor = Editor::with_richtext_plugins();
    editor
        .run_command("marks.toggle", Some(json!({ "mark": "bold" })))
        .unwrap();
    assert!(!editor.can_undo());
    let active: Marks = editor.run_query("marks.get_active", None).unwrap();
    assert!(active.bold);

    editor.type_text("hi").unwrap();
    assert_eq!(
        editor.doc().children,
        vec![Node::element(
            kinds::PARAGRAPH,
            vec![Node::Text(TextNode::with_marks("hi", bold()))]
        )]
    );
}

#[test]
fn pending_marks_drop_when_the_cursor_moves() {
    let mut editor = editor_with(vec![Node::paragraph("ab")], vec![0, 0], 0);
    editor
        .run_command("marks.toggle", Some(json!({ "mark": "italic" })))
        .unwrap();
    editor.set_selection(Selection::collapsed(Point::new(vec![0, 0], 2)));
    editor.insert_text("c").unwrap();

    assert_eq!(editor.doc().children, vec![Node::paragraph("abc")]);
}

#[test]
fn color_commands_set_and_clear() {
    let mut editor = editor_with(vec![Node::paragraph("red")], vec![0, 0], 0);
    editor.set_selection(Selection::new(
        Point::new(vec![0, 0], 0),
        Point::new(vec![0, 0], 3),
    ));

    editor
        .run_command("marks.set_color", Some(json!({ "color": "#ff0000" })))
        .unwrap();
    let Some(Node::Text(leaf)) = editor.doc().node(&[0, 0]) else {
        panic!("expected text");
    };
    assert_eq!(leaf.marks.color.as_deref(), Some("#ff0000"));

    editor.run_command("marks.set_color", None).unwrap();
    assert_eq!(editor.doc().children, vec![Node::paragraph("red")]);
}

#[test]
fn unknown_mark_is_rejected() {
    let mut editor = Editor::with_richtext_plugins();
    assert!(
        editor
            .run_command("marks.toggle", Some(json!({ "mark": "blink" })))
            .is_err()
    );
}

#[test]
fn block_toggle_heading_and_back() {
    let mut editor = editor_with(vec![Node::paragraph("Title")], vec![0, 0], 2);

    editor
        .run_command("block.toggle", Some(json!({ "kind": kinds::HEADING_TWO })))
        .unwrap();
    assert_eq!(
        editor.run_query::<Option<String>>("block.active_kind", None).unwrap(),
        Some(kinds::HEADING_TWO.to_string())
    );
    assert_eq!(editor.selection().focus.offset, 2);

    editor
        .run_command("block.toggle", Some(json!({ "kind": kinds::HEADING_TWO })))
        .unwrap();
    assert_eq!(editor.doc().children, vec![Node::paragraph("Title")]);

    let err = editor
        .run_command("block.toggle", Some(json!({ "kind": "table" })))
        .unwrap_err();
    assert_eq!(err.message(), "Unknown block kind: table");
}

#[test]
fn divider_command_inserts_after_the_current_block() {
    let mut editor = editor_with(vec![Node::paragraph("above")], vec![0, 0], 5);
    editor.run_command("divider.insert", None).unwrap();

    assert_eq!(
        editor.doc().children,
        vec![Node::paragraph("above"), Node::divider(), Node::paragraph("")]
    );
    assert_eq!(editor.selection().focus.path, vec![2, 0]);
}

#[test]
fn divider_command_replaces_an_empty_paragraph() {
    let mut editor = editor_with(
        vec![Node::paragraph("a"), Node::paragraph(""), Node::paragraph("b")],
        vec![1, 0],
        0,
    );
    editor.run_command("divider.insert", None).unwrap();

    assert_eq!(
        editor.doc().children,
        vec![Node::paragraph("a"), Node::divider(), Node::paragraph("b")]
    );
    assert_eq!(editor.selection().focus.path, vec![2, 0]);

    assert!(editor.undo());
    assert_eq!(
        editor.doc().children,
        vec![Node::paragraph("a"), Node::paragraph(""), Node::paragraph("b")]
    );
}

#[test]
fn unknown_command_and_query_are_errors() {
    let mut editor = Editor::with_richtext_plugins();
    assert_eq!(
        editor.run_command("nope", None).unwrap_err().message(),
        "Unknown command: nope"
    );
    assert_eq!(
        editor.run_query_json("nope", None).unwrap_err().message(),
        "Unknown query: nope"
    );
}

struct Shout;

impl InputHandler for Shout {
    fn id(&self) -> &'static str {
        "test.shout"
    }

    fn try_handle_insert_text(
        &self,
        editor: &mut Editor,
        text: &str,
    ) -> Result<InputOutcome, ApplyError> {
        if text != "!" {
            return Ok(InputOutcome::PassThrough);
        }
        slator_core::transforms::insert_text_with_marks(editor, "!!!", None)?;
        Ok(InputOutcome::Handled)
    }
}

struct ShoutPlugin;

impl EditorPlugin for ShoutPlugin {
    fn id(&self) -> &'static str {
        "test.shout"
    }

    fn input_handlers(&self) -> Vec<Arc<dyn InputHandler>> {
        vec![Arc::new(Shout)]
    }
}

#[test]
fn host_handlers_join_the_chain() {
    let mut registry = PluginRegistry::core();
    registry.register_plugin(Box::new(ShoutPlugin)).unwrap();
    let mut editor = Editor::empty(registry);

    editor.type_text("hi!").unwrap();
    assert_eq!(editor.doc().children, vec![Node::paragraph("hi!!!")]);
}

struct DuplicateParagraph;

impl EditorPlugin for DuplicateParagraph {
    fn id(&self) -> &'static str {
        "test.duplicate"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::text_block(kinds::PARAGRAPH)]
    }
}

#[test]
fn duplicate_node_spec_is_refused() {
    let mut registry = PluginRegistry::richtext();
    let err = registry
        .register_plugin(Box::new(DuplicateParagraph))
        .unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateNodeSpec(kind) if kind == kinds::PARAGRAPH));
}

use serde_json::Value;

use crate::core::{ApplyError, Editor, MarkKind, Marks};
use crate::plugin::{CommandError, CommandSpec, EditorPlugin, QueryError, QuerySpec, arg_str};
use crate::range;
use crate::transforms;

/// Marks at the cursor: the pending marks when set, otherwise the marks of
/// the leaf holding the focus.
pub fn active_marks(editor: &Editor) -> Marks {
    if let Some(marks) = editor.pending_marks() {
        return marks.clone();
    }
    editor
        .doc()
        .text(&editor.selection().focus.path)
        .map(|t| t.marks.clone())
        .unwrap_or_default()
}

pub fn is_mark_active(editor: &Editor, kind: MarkKind) -> bool {
    let selection = editor.selection();
    if selection.is_collapsed() {
        return active_marks(editor).get(kind);
    }
    let range = range::unhang_range(editor.doc(), editor.registry(), selection);
    transforms::range_has_mark(editor, &range, &|marks| marks.get(kind))
}

fn update_marks(editor: &mut Editor, apply: &dyn Fn(Marks) -> Marks) -> Result<(), ApplyError> {
    let selection = editor.selection().clone();
    if selection.is_collapsed() {
        let next = apply(active_marks(editor));
        editor.set_pending_marks(next);
        return Ok(());
    }
    let range = range::unhang_range(editor.doc(), editor.registry(), &selection);
    transforms::set_marks_on_range(editor, &range, apply)
}

/// Toggles a boolean mark on the selection. A collapsed selection only
/// affects the next typed text.
pub fn toggle_mark(editor: &mut Editor, kind: MarkKind) -> Result<(), ApplyError> {
    let target = !is_mark_active(editor, kind);
    update_marks(editor, &|mut marks| {
        marks.set(kind, target);
        marks
    })
}

pub fn set_color(editor: &mut Editor, color: Option<String>) -> Result<(), ApplyError> {
    update_marks(editor, &|mut marks| {
        marks.color = color.clone();
        marks
    })
}

pub fn set_background(editor: &mut Editor, background: Option<String>) -> Result<(), ApplyError> {
    update_marks(editor, &|mut marks| {
        marks.background = background.clone();
        marks
    })
}

fn parse_mark_arg(args: Option<&Value>) -> Result<MarkKind, String> {
    let name = arg_str(args, "mark").ok_or("Missing args.mark")?;
    MarkKind::parse(name).ok_or_else(|| format!("Unknown mark: {name}"))
}

/// A missing or null `color` clears the mark.
fn parse_color_arg(args: Option<&Value>) -> Option<String> {
    arg_str(args, "color").map(str::to_string)
}

pub(crate) struct MarksPlugin;

impl EditorPlugin for MarksPlugin {
    fn id(&self) -> &'static str {
        "marks"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("marks.toggle", "Toggle mark", |editor, args| {
                let kind = parse_mark_arg(args.as_ref()).map_err(CommandError::new)?;
                toggle_mark(editor, kind).map_err(Into::into)
            })
            .description("Toggle a text mark on the selection or for the next typed text.")
            .keywords([
                "bold",
                "italic",
                "underline",
                "strikethrough",
                "code",
                "superscript",
                "subscript",
            ])
            .args_example(serde_json::json!({ "mark": "bold" })),
            CommandSpec::new("marks.set_color", "Set text color", |editor, args| {
                set_color(editor, parse_color_arg(args.as_ref())).map_err(Into::into)
            })
            .description("Set the text color (args.color); omit it to clear.")
            .keywords(["color", "foreground"])
            .args_example(serde_json::json!({ "color": "#e03e2d" })),
            CommandSpec::new("marks.set_background", "Set background color", |editor, args| {
                set_background(editor, parse_color_arg(args.as_ref())).map_err(Into::into)
            })
            .description("Set the text background color (args.color); omit it to clear.")
            .keywords(["background", "highlight"])
            .args_example(serde_json::json!({ "color": "#fbeeb8" })),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![
            QuerySpec::new("marks.get_active", |editor, _args| {
                serde_json::to_value(active_marks(editor))
                    .map_err(|err| QueryError::new(format!("Failed to encode marks: {err}")))
            }),
            QuerySpec::new("marks.is_active", |editor, args| {
                let kind = parse_mark_arg(args.as_ref()).map_err(QueryError::new)?;
                Ok(Value::Bool(is_mark_active(editor, kind)))
            }),
        ]
    }
}

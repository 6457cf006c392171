use std::sync::Arc;

use serde_json::Value;

use crate::blocks::{focus_block, is_block_active, toggle_block};
use crate::core::{ApplyError, AttrPatch, Document, Editor, ElementNode, Node, kinds};
use crate::normalize::{child_path, visit_elements_post_order};
use crate::ops::{Op, Path};
use crate::plugin::{
    ChildConstraint, CommandError, CommandSpec, EditorPlugin, InputHandler, InputOutcome, NodeSpec,
    NormalizePass, PluginRegistry, QueryError, QuerySpec,
};
use crate::range;
use crate::transforms;

/// The block under a collapsed cursor, its kind and the cursor's block offset.
fn cursor_block(editor: &Editor) -> Option<(Path, String, usize)> {
    let (block, offset) = range::cursor_block_offset(editor)?;
    let kind = editor.doc().element(&block)?.kind.clone();
    Some((block, kind, offset))
}

struct ListBreak;

impl InputHandler for ListBreak {
    fn id(&self) -> &'static str {
        "lists.break"
    }

    fn try_handle_insert_break(&self, editor: &mut Editor) -> Result<InputOutcome, ApplyError> {
        let Some((block, kind, _)) = cursor_block(editor) else {
            return Ok(InputOutcome::PassThrough);
        };
        if kind != kinds::LIST_ITEM || !range::block_string(editor.doc(), &block).is_empty() {
            return Ok(InputOutcome::PassThrough);
        }
        tracing::debug!(?block, "break in empty list item lifts it");
        transforms::lift_list_item(editor, &block, kinds::PARAGRAPH)?;
        Ok(InputOutcome::Handled)
    }
}

struct ListBackspace;

impl InputHandler for ListBackspace {
    fn id(&self) -> &'static str {
        "lists.delete_backward"
    }

    fn try_handle_delete_backward(
        &self,
        editor: &mut Editor,
    ) -> Result<InputOutcome, ApplyError> {
        match cursor_block(editor) {
            Some((block, kind, 0)) if kind == kinds::LIST_ITEM => {
                transforms::lift_list_item(editor, &block, kinds::PARAGRAPH)?;
                Ok(InputOutcome::Handled)
            }
            _ => Ok(InputOutcome::PassThrough),
        }
    }
}

fn accepts_blocks(el: &ElementNode, registry: &PluginRegistry) -> bool {
    !registry.is_void(&el.kind) && registry.child_constraint(el) != ChildConstraint::InlineOnly
}

/// Wraps every run of list items that are not inside a list container into
/// a bulleted list.
struct WrapStrayListItems;

impl WrapStrayListItems {
    fn wrap_runs(parent: &[usize], children: &[Node], ops: &mut Vec<Op>) {
        let is_item = |node: &Node| node.as_element().is_some_and(|el| el.kind == kinds::LIST_ITEM);

        let mut end = children.len();
        while end > 0 {
            if !is_item(&children[end - 1]) {
                end -= 1;
                continue;
            }
            let mut start = end - 1;
            while start > 0 && is_item(&children[start - 1]) {
                start -= 1;
            }
            for ix in (start..end).rev() {
                ops.push(Op::RemoveNode {
                    path: child_path(parent, ix),
                });
            }
            ops.push(Op::InsertNode {
                path: child_path(parent, start),
                node: Node::element(kinds::BULLETED_LIST, children[start..end].to_vec()),
            });
            end = start;
        }
    }
}

impl NormalizePass for WrapStrayListItems {
    fn id(&self) -> &'static str {
        "lists.wrap_stray_items"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        visit_elements_post_order(&doc.children, &mut Vec::new(), &mut |path, el| {
            if kinds::is_list_container(&el.kind) || !accepts_blocks(el, registry) {
                return;
            }
            Self::wrap_runs(path, &el.children, &mut ops);
        });
        Self::wrap_runs(&[], &doc.children, &mut ops);
        ops
    }
}

struct RemoveEmptyLists;

impl NormalizePass for RemoveEmptyLists {
    fn id(&self) -> &'static str {
        "lists.remove_empty_lists"
    }

    fn run(&self, doc: &Document, _registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        visit_elements_post_order(&doc.children, &mut Vec::new(), &mut |path, el| {
            if kinds::is_list_container(&el.kind) && el.children.is_empty() {
                ops.push(Op::RemoveNode {
                    path: path.to_vec(),
                });
            }
        });
        ops
    }
}

pub(crate) struct ListPlugin;

impl EditorPlugin for ListPlugin {
    fn id(&self) -> &'static str {
        "lists"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![
            NodeSpec::text_block(kinds::LIST_ITEM),
            NodeSpec::container(kinds::NUMBERED_LIST),
            NodeSpec::container(kinds::BULLETED_LIST),
        ]
    }

    fn input_handlers(&self) -> Vec<Arc<dyn InputHandler>> {
        vec![Arc::new(ListBreak), Arc::new(ListBackspace)]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(WrapStrayListItems), Box::new(RemoveEmptyLists)]
    }
}

struct CheckListBackspace;

impl InputHandler for CheckListBackspace {
    fn id(&self) -> &'static str {
        "check_list.delete_backward"
    }

    /// Backspace at the start of a check-list item turns it into a paragraph.
    fn try_handle_delete_backward(
        &self,
        editor: &mut Editor,
    ) -> Result<InputOutcome, ApplyError> {
        match cursor_block(editor) {
            Some((block, kind, 0)) if kind == kinds::CHECK_LIST => {
                transforms::set_block_kind(
                    editor,
                    &block,
                    kinds::PARAGRAPH,
                    AttrPatch::default().remove("checked"),
                )?;
                Ok(InputOutcome::Handled)
            }
            _ => Ok(InputOutcome::PassThrough),
        }
    }
}

pub fn set_checked(editor: &mut Editor, checked: bool) -> Result<(), ApplyError> {
    let Some(block) = focus_block(editor) else {
        return Ok(());
    };
    if editor
        .doc()
        .element(&block)
        .is_none_or(|el| el.kind != kinds::CHECK_LIST)
    {
        return Ok(());
    }
    transforms::set_block_kind(
        editor,
        &block,
        kinds::CHECK_LIST,
        AttrPatch::default().set("checked", checked),
    )
}

pub(crate) struct CheckListPlugin;

impl EditorPlugin for CheckListPlugin {
    fn id(&self) -> &'static str {
        "check_list"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::text_block(kinds::CHECK_LIST)]
    }

    fn input_handlers(&self) -> Vec<Arc<dyn InputHandler>> {
        vec![Arc::new(CheckListBackspace)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("check_list.toggle", "Toggle check list", |editor, _args| {
                toggle_block(editor, kinds::CHECK_LIST).map_err(Into::into)
            })
            .description("Toggle an unchecked check-list item for the active block.")
            .keywords(["todo", "check", "checkbox", "task"]),
            CommandSpec::new("check_list.set_checked", "Set checked", |editor, args| {
                let checked = args
                    .as_ref()
                    .and_then(|v| v.get("checked"))
                    .and_then(Value::as_bool)
                    .ok_or_else(|| CommandError::new("Missing args.checked"))?;
                set_checked(editor, checked).map_err(Into::into)
            })
            .description("Check or uncheck the active check-list item.")
            .args_example(serde_json::json!({ "checked": true })),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![
            QuerySpec::new("check_list.is_active", |editor, _args| {
                Ok(Value::Bool(is_block_active(editor, kinds::CHECK_LIST)))
            }),
            QuerySpec::new("check_list.is_checked", |editor, _args| {
                let block = focus_block(editor).ok_or_else(|| QueryError::new("No active block"))?;
                Ok(editor
                    .doc()
                    .element(&block)
                    .filter(|el| el.kind == kinds::CHECK_LIST)
                    .and_then(|el| el.attr_bool("checked"))
                    .map_or(Value::Null, Value::Bool))
            }),
        ]
    }
}

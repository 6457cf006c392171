use serde_json::Value;

use crate::core::{ApplyError, AttrPatch, Editor, Node, kinds};
use crate::ops::Path;
use crate::plugin::{CommandError, CommandSpec, EditorPlugin, NodeSpec, QueryError, QuerySpec, arg_str};
use crate::range::{self, Affinity};
use crate::transforms;

pub(crate) struct HeadingPlugin;

impl EditorPlugin for HeadingPlugin {
    fn id(&self) -> &'static str {
        "heading"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        [kinds::HEADING_ONE, kinds::HEADING_TWO, kinds::HEADING_THREE]
            .into_iter()
            .map(NodeSpec::text_block)
            .collect()
    }
}

pub(crate) struct BlockQuotePlugin;

impl EditorPlugin for BlockQuotePlugin {
    fn id(&self) -> &'static str {
        "block_quote"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::text_block(kinds::BLOCK_QUOTE)]
    }
}

pub(crate) struct DividerPlugin;

impl EditorPlugin for DividerPlugin {
    fn id(&self) -> &'static str {
        "divider"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::void_block(kinds::DIVIDER)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("divider.insert", "Insert divider", |editor, _args| {
                transforms::insert_block_node(editor, Node::divider())
                    .map(|_| ())
                    .map_err(|e| CommandError::new(format!("Failed to insert divider: {e}")))
            })
            .description("Insert a divider at the cursor, followed by a block for the cursor.")
            .keywords(["divider", "separator", "hr", "horizontal rule"]),
        ]
    }
}

/// Path of the block holding the focus.
pub fn focus_block(editor: &Editor) -> Option<Path> {
    range::block_above(editor.doc(), editor.registry(), &editor.selection().focus.path)
}

pub fn is_block_active(editor: &Editor, kind: &str) -> bool {
    let Some(block) = focus_block(editor) else {
        return false;
    };
    let Some(el) = editor.doc().element(&block) else {
        return false;
    };
    if !kinds::is_list_container(kind) {
        return el.kind == kind;
    }
    el.kind == kinds::LIST_ITEM
        && block
            .split_last()
            .and_then(|(_, parent)| editor.doc().element(parent))
            .is_some_and(|parent| parent.kind == kind)
}

/// Switches the focus block to `kind`, or back to a paragraph when it
/// already is one. List kinds wrap the block in a list of that kind, and
/// a block leaving a list is lifted out of it.
pub fn toggle_block(editor: &mut Editor, kind: &str) -> Result<(), ApplyError> {
    let Some(block) = focus_block(editor) else {
        return Ok(());
    };
    let Some(el) = editor.doc().element(&block) else {
        return Ok(());
    };
    if !editor.registry().is_text_block(el) {
        return Ok(());
    }
    let in_list = el.kind == kinds::LIST_ITEM;
    let offset = range::point_block_offset(editor.doc(), editor.registry(), &editor.selection().focus)
        .map_or(0, |(_, offset)| offset);
    let active = is_block_active(editor, kind);

    let new_path = if kinds::is_list_container(kind) {
        if active {
            transforms::rebuild_block(editor, &block, None, |el| {
                el.kind = kinds::PARAGRAPH.to_string();
            })?
        } else {
            transforms::rebuild_block(editor, &block, Some(kind), |el| {
                el.kind = kinds::LIST_ITEM.to_string();
                el.attrs.remove("checked");
            })?
        }
    } else {
        let target = if active { kinds::PARAGRAPH } else { kind };
        if in_list {
            transforms::lift_list_item(editor, &block, target)?
        } else {
            let mut patch = AttrPatch::default();
            if target == kinds::CHECK_LIST {
                patch = patch.set("checked", false);
            } else if el_has_checked(editor, &block) {
                patch = patch.remove("checked");
            }
            transforms::set_block_kind(editor, &block, target, patch)?;
            block
        }
    };

    transforms::select_offset(editor, &new_path, offset, Affinity::Backward);
    Ok(())
}

fn el_has_checked(editor: &Editor, block: &[usize]) -> bool {
    editor
        .doc()
        .element(block)
        .is_some_and(|el| el.attrs.contains_key("checked"))
}

pub(crate) struct BlockCommandsPlugin;

impl EditorPlugin for BlockCommandsPlugin {
    fn id(&self) -> &'static str {
        "block.commands"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("block.toggle", "Toggle block type", |editor, args| {
                let kind = arg_str(args.as_ref(), "kind")
                    .ok_or_else(|| CommandError::new("Missing args.kind"))?
                    .to_string();
                if !kinds::is_list_container(&kind) && !editor.registry().is_known_kind(&kind) {
                    return Err(CommandError::new(format!("Unknown block kind: {kind}")));
                }
                toggle_block(editor, &kind).map_err(Into::into)
            })
            .description("Toggle the block under the cursor between args.kind and a paragraph.")
            .keywords(["heading", "quote", "list", "paragraph", "block"])
            .args_example(serde_json::json!({ "kind": "heading-one" })),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![
            QuerySpec::new("block.is_active", |editor, args| {
                let kind = arg_str(args.as_ref(), "kind")
                    .ok_or_else(|| QueryError::new("Missing args.kind"))?;
                Ok(Value::Bool(is_block_active(editor, kind)))
            }),
            QuerySpec::new("block.active_kind", |editor, _args| {
                Ok(focus_block(editor)
                    .and_then(|block| editor.doc().element(&block).map(|el| el.kind.clone()))
                    .map_or(Value::Null, Value::String))
            }),
        ]
    }
}

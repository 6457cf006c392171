use std::sync::Arc;

use serde_json::Value;

use crate::blocks::{focus_block, is_block_active, toggle_block};
use crate::core::{ApplyError, Editor, Node, kinds};
use crate::ops::{Op, Transaction};
use crate::plugin::{CommandError, CommandSpec, EditorPlugin, InputHandler, InputOutcome, NodeSpec, QuerySpec};
use crate::range::{self, Affinity};
use crate::transforms;

/// Leading spaces and tabs of the line the cursor is on.
fn current_line_indent(before: &str) -> &str {
    let line_start = before.rfind('\n').map_or(0, |ix| ix + 1);
    let line = &before[line_start..];
    let end = line
        .char_indices()
        .find(|(_, ch)| *ch != ' ' && *ch != '\t')
        .map_or(line.len(), |(ix, _)| ix);
    &line[..end]
}

struct CodeBlockBreak;

impl InputHandler for CodeBlockBreak {
    fn id(&self) -> &'static str {
        "code_block.break"
    }

    /// Break inside a code block stays in the block and keeps the current
    /// line's indentation. Two consecutive blank lines exit the block.
    fn try_handle_insert_break(&self, editor: &mut Editor) -> Result<InputOutcome, ApplyError> {
        let Some((block, offset)) = range::cursor_block_offset(editor) else {
            return Ok(InputOutcome::PassThrough);
        };
        if editor
            .doc()
            .element(&block)
            .is_none_or(|el| el.kind != kinds::CODE_BLOCK)
        {
            return Ok(InputOutcome::PassThrough);
        }

        let text = range::block_string(editor.doc(), &block);
        let before = text.get(..offset).unwrap_or(&text);
        let indent = current_line_indent(before);
        let exit_suffix = format!("\n{indent}\n{indent}");

        if before.ends_with(&exit_suffix) {
            tracing::debug!(?block, "leaving code block");
            transforms::delete_backward_chars(editor, exit_suffix.chars().count())?;
            transforms::insert_block_node(editor, Node::paragraph(""))?;
        } else {
            let line_break = format!("\n{indent}");
            transforms::insert_text_with_marks(editor, &line_break, None)?;
        }
        Ok(InputOutcome::Handled)
    }
}

/// Turns the focus block into a code block, or a code block back into one
/// paragraph per non-empty line.
pub fn toggle_code_block(editor: &mut Editor) -> Result<(), ApplyError> {
    if !is_block_active(editor, kinds::CODE_BLOCK) {
        return toggle_block(editor, kinds::CODE_BLOCK);
    }
    let Some(block) = focus_block(editor) else {
        return Ok(());
    };
    let text = range::block_string(editor.doc(), &block);
    let mut lines: Vec<&str> = text.split('\n').filter(|line| !line.is_empty()).collect();
    if lines.is_empty() {
        lines.push("");
    }

    let Some((&first_ix, parent)) = block.split_last() else {
        return Ok(());
    };
    let mut ops = vec![Op::RemoveNode {
        path: block.clone(),
    }];
    for (i, line) in lines.iter().enumerate() {
        let mut path = parent.to_vec();
        path.push(first_ix + i);
        ops.push(Op::InsertNode {
            path,
            node: Node::paragraph(*line),
        });
    }
    editor.apply(Transaction::new(ops).source("code_block:unwrap_lines"))?;

    let mut last = parent.to_vec();
    last.push(first_ix + lines.len() - 1);
    let len = range::block_string(editor.doc(), &last).len();
    transforms::select_offset(editor, &last, len, Affinity::Backward);
    Ok(())
}

pub(crate) struct CodeBlockPlugin;

impl EditorPlugin for CodeBlockPlugin {
    fn id(&self) -> &'static str {
        "code_block"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::text_block(kinds::CODE_BLOCK)]
    }

    fn input_handlers(&self) -> Vec<Arc<dyn InputHandler>> {
        vec![Arc::new(CodeBlockBreak)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("code_block.toggle", "Toggle code block", |editor, _args| {
                toggle_code_block(editor)
                    .map_err(|e| CommandError::new(format!("Failed to toggle code block: {e}")))
            })
            .description("Toggle code block for the active text block.")
            .keywords(["code block", "code", "pre", "monospace"]),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![QuerySpec::new("code_block.is_active", |editor, _args| {
            Ok(Value::Bool(is_block_active(editor, kinds::CODE_BLOCK)))
        })]
    }
}

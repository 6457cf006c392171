use serde_json::Value;

use crate::core::{ApplyError, Editor, Node, kinds};
use crate::ops::{Op, Transaction};
use crate::plugin::{InputHandler, InputOutcome};
use crate::range;
use crate::transforms;

/// What a block prefix turns the block into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockShortcut {
    pub kind: &'static str,
    /// List container the retyped block is wrapped in.
    pub wrap_in: Option<&'static str>,
    pub checked: Option<bool>,
}

impl BlockShortcut {
    const fn block(kind: &'static str) -> Self {
        Self {
            kind,
            wrap_in: None,
            checked: None,
        }
    }

    const fn list(container: &'static str) -> Self {
        Self {
            kind: kinds::LIST_ITEM,
            wrap_in: Some(container),
            checked: None,
        }
    }

    const fn check_list(checked: bool) -> Self {
        Self {
            kind: kinds::CHECK_LIST,
            wrap_in: None,
            checked: Some(checked),
        }
    }
}

const SHORTCUTS: [(&str, BlockShortcut); 12] = [
    ("#", BlockShortcut::block(kinds::HEADING_ONE)),
    ("##", BlockShortcut::block(kinds::HEADING_TWO)),
    ("###", BlockShortcut::block(kinds::HEADING_THREE)),
    (">", BlockShortcut::block(kinds::BLOCK_QUOTE)),
    ("``", BlockShortcut::block(kinds::CODE_BLOCK)),
    ("*", BlockShortcut::list(kinds::BULLETED_LIST)),
    ("-", BlockShortcut::list(kinds::BULLETED_LIST)),
    ("+", BlockShortcut::list(kinds::BULLETED_LIST)),
    ("1.", BlockShortcut::list(kinds::NUMBERED_LIST)),
    ("[]-", BlockShortcut::check_list(false)),
    ("[x]-", BlockShortcut::check_list(true)),
    ("---", BlockShortcut::block(kinds::DIVIDER)),
];

/// The shortcut for a block whose text before the cursor is exactly `prefix`.
pub fn block_shortcut(prefix: &str) -> Option<BlockShortcut> {
    SHORTCUTS
        .iter()
        .find(|(p, _)| *p == prefix)
        .map(|(_, shortcut)| *shortcut)
}

/// Rewrites the block under the cursor: the first `prefix_len` bytes go and
/// the block takes the shortcut's kind.
pub fn apply_block_shortcut(
    editor: &mut Editor,
    shortcut: BlockShortcut,
    prefix_len: usize,
) -> Result<(), ApplyError> {
    let Some((block, _)) = range::cursor_block_offset(editor) else {
        return Ok(());
    };
    if shortcut.kind == kinds::DIVIDER {
        return apply_divider(editor, &block, prefix_len);
    }

    let new_path = transforms::rebuild_block(editor, &block, shortcut.wrap_in, |el| {
        el.children = transforms::remove_range_in(&el.children, 0..prefix_len);
        el.kind = shortcut.kind.to_string();
        el.attrs.remove("checked");
        if let Some(checked) = shortcut.checked {
            el.attrs.insert("checked".to_string(), Value::Bool(checked));
        }
    })?;
    transforms::select_block_start(editor, &new_path);
    Ok(())
}

/// The block becomes a divider. Text after the prefix moves into the block
/// that follows, and the cursor lands there.
fn apply_divider(editor: &mut Editor, block: &[usize], prefix_len: usize) -> Result<(), ApplyError> {
    let Some(el) = editor.doc().element(block) else {
        return Ok(());
    };
    let rest = transforms::remove_range_in(&el.children, 0..prefix_len);
    let rest_is_empty = rest.iter().all(|node| node.string().is_empty());

    let divider_path = transforms::rebuild_block(editor, block, None, |el| {
        el.kind = kinds::DIVIDER.to_string();
        el.attrs.clear();
        el.children = vec![Node::text("")];
    })?;

    let mut next = divider_path.clone();
    if let Some(last) = next.last_mut() {
        *last += 1;
    }
    let Some((&next_ix, parent)) = next.split_last() else {
        return Ok(());
    };
    let has_next = editor
        .doc()
        .children_at(parent)
        .is_some_and(|siblings| next_ix < siblings.len());

    if !rest_is_empty || !has_next {
        editor.apply(
            Transaction::new(vec![Op::InsertNode {
                path: next.clone(),
                node: Node::element(kinds::PARAGRAPH, rest),
            }])
            .source("markdown:divider"),
        )?;
    }
    transforms::select_block_start(editor, &next);
    Ok(())
}

pub(super) struct BlockShortcuts;

impl InputHandler for BlockShortcuts {
    fn id(&self) -> &'static str {
        "markdown.block_shortcuts"
    }

    fn try_handle_insert_text(
        &self,
        editor: &mut Editor,
        text: &str,
    ) -> Result<InputOutcome, ApplyError> {
        if text != " " {
            return Ok(InputOutcome::PassThrough);
        }
        let Some(before) = range::text_before_cursor(editor) else {
            return Ok(InputOutcome::PassThrough);
        };
        let Some(shortcut) = block_shortcut(&before) else {
            return Ok(InputOutcome::PassThrough);
        };
        let is_text_block = range::cursor_block_offset(editor)
            .and_then(|(block, _)| editor.doc().element(&block))
            .is_some_and(|el| editor.registry().is_text_block(el));
        if !is_text_block {
            return Ok(InputOutcome::PassThrough);
        }

        tracing::debug!(prefix = %before, kind = shortcut.kind, "block shortcut");
        apply_block_shortcut(editor, shortcut, before.len())?;
        Ok(InputOutcome::Handled)
    }
}

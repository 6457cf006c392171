//! Editing primitives built on transactions.
//!
//! Each primitive applies its own transaction and then places the cursor
//! from a block offset computed against the normalized document, so leaf
//! merges and splits done by normalization never leave the cursor behind.

use std::ops::Range;

use crate::core::{
    ApplyError, AttrPatch, Editor, ElementNode, Marks, Node, Point, Selection, TextNode,
    clamp_to_char_boundary, kinds,
};
use crate::ops::{Op, Path, Transaction};
use crate::range::{self, Affinity};

fn invalid_path(what: &str, path: &[usize]) -> ApplyError {
    ApplyError::InvalidPath(format!("{what} at {path:?}"))
}

fn sibling(path: &[usize], delta: usize) -> Path {
    let mut out = path.to_vec();
    if let Some(last) = out.last_mut() {
        *last += delta;
    }
    out
}

fn child(path: &[usize], ix: usize) -> Path {
    let mut out = path.to_vec();
    out.push(ix);
    out
}

pub(crate) fn replace_node_ops(path: &[usize], node: Node) -> Vec<Op> {
    vec![
        Op::RemoveNode {
            path: path.to_vec(),
        },
        Op::InsertNode {
            path: path.to_vec(),
            node,
        },
    ]
}

/// Byte offset `distance` characters away from `offset`, clamped to `text`.
pub fn shift_by_chars(text: &str, offset: usize, distance: isize) -> usize {
    let offset = clamp_to_char_boundary(text, offset);
    if distance >= 0 {
        text[offset..]
            .char_indices()
            .nth(distance.unsigned_abs())
            .map_or(text.len(), |(ix, _)| offset + ix)
    } else {
        text[..offset]
            .char_indices()
            .rev()
            .nth(distance.unsigned_abs() - 1)
            .map_or(0, |(ix, _)| ix)
    }
}

/// Splits inline content at a block offset, descending into inline elements.
pub fn split_children(children: &[Node], offset: usize) -> (Vec<Node>, Vec<Node>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut pos = 0usize;

    for node in children {
        let len = match node {
            Node::Text(t) => t.text.len(),
            Node::Element(_) => node.string().len(),
        };
        if pos + len <= offset {
            left.push(node.clone());
        } else if pos >= offset {
            right.push(node.clone());
        } else {
            match node {
                Node::Text(t) => {
                    let at = clamp_to_char_boundary(&t.text, offset - pos);
                    left.push(Node::Text(TextNode::with_marks(&t.text[..at], t.marks.clone())));
                    right.push(Node::Text(TextNode::with_marks(&t.text[at..], t.marks.clone())));
                }
                Node::Element(el) => {
                    let (inner_left, inner_right) = split_children(&el.children, offset - pos);
                    left.push(Node::Element(ElementNode {
                        children: inner_left,
                        ..el.clone()
                    }));
                    right.push(Node::Element(ElementNode {
                        children: inner_right,
                        ..el.clone()
                    }));
                }
            }
        }
        pos += len;
    }

    (left, right)
}

/// Inline content with the block range `range` cut out.
pub fn remove_range_in(children: &[Node], range: Range<usize>) -> Vec<Node> {
    let (mut left, rest) = split_children(children, range.start);
    let (_, right) = split_children(&rest, range.end.saturating_sub(range.start));
    left.extend(right);
    left
}

/// `RemoveText` ops covering a block range, last leaf first.
fn remove_text_ops(editor: &Editor, block: &[usize], range: Range<usize>) -> Vec<Op> {
    let leaves = range::block_leaves(editor.doc(), block);
    let mut ops = Vec::new();
    for leaf in leaves.iter().rev() {
        let start = range.start.max(leaf.start);
        let end = range.end.min(leaf.end());
        if start >= end {
            continue;
        }
        ops.push(Op::RemoveText {
            path: leaf.path.clone(),
            range: start - leaf.start..end - leaf.start,
        });
    }
    ops
}

/// Collapses the cursor onto a block offset.
pub fn select_offset(editor: &mut Editor, block: &[usize], offset: usize, affinity: Affinity) {
    let point = {
        let leaves = range::block_leaves(editor.doc(), block);
        range::offset_to_point(&leaves, offset, affinity)
    };
    if let Some(point) = point {
        editor.set_selection(Selection::collapsed(point));
    }
}

/// Places the cursor at the start of the first leaf of the block at `block`.
pub fn select_block_start(editor: &mut Editor, block: &[usize]) {
    select_offset(editor, block, 0, Affinity::Forward);
}

/// Moves the collapsed cursor `distance` characters within its block.
pub fn move_cursor(editor: &mut Editor, distance: isize) {
    let focus = editor.selection().focus.clone();
    let Some((block, offset)) = range::point_block_offset(editor.doc(), editor.registry(), &focus)
    else {
        return;
    };
    let text = range::block_string(editor.doc(), &block);
    let target = shift_by_chars(&text, offset, distance);
    select_offset(editor, &block, target, Affinity::Backward);
}

/// Moves only the focus `distance` characters within its block.
pub fn extend_focus(editor: &mut Editor, distance: isize) {
    let selection = editor.selection().clone();
    let Some((block, offset)) =
        range::point_block_offset(editor.doc(), editor.registry(), &selection.focus)
    else {
        return;
    };
    let text = range::block_string(editor.doc(), &block);
    let target = shift_by_chars(&text, offset, distance);
    let point = {
        let leaves = range::block_leaves(editor.doc(), &block);
        range::offset_to_point(&leaves, target, Affinity::Backward)
    };
    if let Some(focus) = point {
        editor.set_selection(Selection::new(selection.anchor, focus));
    }
}

/// Collapses the selection onto its focus.
pub fn collapse_to_focus(editor: &mut Editor) {
    let focus = editor.selection().focus.clone();
    editor.set_selection(Selection::collapsed(focus));
}

/// Deletes `count` characters before the cursor, staying inside its block.
pub fn delete_backward_chars(editor: &mut Editor, count: usize) -> Result<(), ApplyError> {
    if count == 0 {
        return Ok(());
    }
    let Some((block, offset)) = range::cursor_block_offset(editor) else {
        return Ok(());
    };
    let text = range::block_string(editor.doc(), &block);
    let start = shift_by_chars(&text, offset, -(count as isize));
    if start == offset {
        return Ok(());
    }
    let ops = remove_text_ops(editor, &block, start..offset);
    editor.apply(Transaction::new(ops).source("transforms:delete_backward"))?;
    select_offset(editor, &block, start, Affinity::Backward);
    Ok(())
}

/// Deletes everything the range covers. Blocks fully inside the range are
/// removed and the tail of the last block is merged into the first.
pub fn delete_range(editor: &mut Editor, range: &Selection) -> Result<(), ApplyError> {
    if range.is_collapsed() {
        return Ok(());
    }
    let (start, end) = range.ordered();
    let (start, end) = (start.clone(), end.clone());
    let doc = editor.doc();
    let registry = editor.registry();

    let Some((start_block, start_offset)) = range::point_block_offset(doc, registry, &start) else {
        return Ok(());
    };
    let Some((end_block, end_offset)) = range::point_block_offset(doc, registry, &end) else {
        return Ok(());
    };

    if start_block == end_block {
        let ops = remove_text_ops(editor, &start_block, start_offset..end_offset);
        editor.apply(Transaction::new(ops).source("transforms:delete_range"))?;
        select_offset(editor, &start_block, start_offset, Affinity::Backward);
        return Ok(());
    }

    let blocks = range::leaf_blocks_in_order(doc, registry);
    let (Some(si), Some(ei)) = (
        blocks.iter().position(|b| *b == start_block),
        blocks.iter().position(|b| *b == end_block),
    ) else {
        return Ok(());
    };

    let start_el = doc
        .element(&start_block)
        .ok_or_else(|| invalid_path("No block", &start_block))?;
    let end_el = doc
        .element(&end_block)
        .ok_or_else(|| invalid_path("No block", &end_block))?;

    let start_is_text = registry.is_text_block(start_el);
    let end_is_text = registry.is_text_block(end_el);
    let tail = if end_is_text {
        split_children(&end_el.children, end_offset).1
    } else {
        Vec::new()
    };

    let mut ops: Vec<Op> = Vec::new();
    if start_is_text {
        for path in blocks[si + 1..=ei].iter().rev() {
            ops.push(Op::RemoveNode { path: path.clone() });
        }
        let (mut children, _) = split_children(&start_el.children, start_offset);
        children.extend(tail);
        ops.extend(replace_node_ops(
            &start_block,
            Node::Element(ElementNode {
                children,
                ..start_el.clone()
            }),
        ));
    } else {
        // A void start block goes entirely; the end block keeps its tail.
        if end_is_text {
            ops.extend(replace_node_ops(
                &end_block,
                Node::Element(ElementNode {
                    children: tail,
                    ..end_el.clone()
                }),
            ));
        } else {
            ops.push(Op::RemoveNode {
                path: end_block.clone(),
            });
        }
        for path in blocks[si + 1..ei].iter().rev() {
            ops.push(Op::RemoveNode { path: path.clone() });
        }
        ops.push(Op::RemoveNode {
            path: start_block.clone(),
        });
    }

    editor.apply(Transaction::new(ops).source("transforms:delete_range"))?;
    if start_is_text {
        select_offset(editor, &start_block, start_offset, Affinity::Backward);
    }
    Ok(())
}

/// Inserts `text` at the collapsed cursor. When `marks` differ from the
/// marks of the leaf under the cursor the text goes into a new leaf.
pub fn insert_text_with_marks(
    editor: &mut Editor,
    text: &str,
    marks: Option<Marks>,
) -> Result<(), ApplyError> {
    if text.is_empty() {
        return Ok(());
    }
    let selection = editor.selection().clone();
    if !selection.is_collapsed() {
        delete_range(editor, &selection)?;
    }

    let focus = editor.selection().focus.clone();
    let Some((block, offset)) = range::point_block_offset(editor.doc(), editor.registry(), &focus)
    else {
        return Ok(());
    };
    let Some(block_el) = editor.doc().element(&block) else {
        return Ok(());
    };
    if editor.registry().is_void(&block_el.kind) {
        return Ok(());
    }
    let Some(leaf) = editor.doc().text(&focus.path) else {
        return Ok(());
    };
    let at = clamp_to_char_boundary(&leaf.text, focus.offset);

    let ops = match marks {
        Some(marks) if marks != leaf.marks => {
            let new_leaf = Node::Text(TextNode::with_marks(text, marks));
            if at == leaf.text.len() {
                vec![Op::InsertNode {
                    path: sibling(&focus.path, 1),
                    node: new_leaf,
                }]
            } else if at == 0 {
                vec![Op::InsertNode {
                    path: focus.path.clone(),
                    node: new_leaf,
                }]
            } else {
                let suffix = TextNode::with_marks(&leaf.text[at..], leaf.marks.clone());
                vec![
                    Op::RemoveText {
                        path: focus.path.clone(),
                        range: at..leaf.text.len(),
                    },
                    Op::InsertNode {
                        path: sibling(&focus.path, 1),
                        node: new_leaf,
                    },
                    Op::InsertNode {
                        path: sibling(&focus.path, 2),
                        node: Node::Text(suffix),
                    },
                ]
            }
        }
        _ => vec![Op::InsertText {
            path: focus.path.clone(),
            offset: at,
            text: text.to_string(),
        }],
    };

    editor.apply(Transaction::new(ops).source("transforms:insert_text"))?;
    select_offset(editor, &block, offset + text.len(), Affinity::Backward);
    Ok(())
}

/// Applies `apply` to the marks of every character in `range`, splitting
/// leaves at the range edges. The selection keeps its block offsets.
pub fn set_marks_on_range(
    editor: &mut Editor,
    range: &Selection,
    apply: &dyn Fn(Marks) -> Marks,
) -> Result<(), ApplyError> {
    let (start, end) = range.ordered();
    let doc = editor.doc();
    let registry = editor.registry();

    let Some((start_block, start_offset)) = range::point_block_offset(doc, registry, start) else {
        return Ok(());
    };
    let Some((end_block, end_offset)) = range::point_block_offset(doc, registry, end) else {
        return Ok(());
    };

    let blocks = range::leaf_blocks_in_order(doc, registry);
    let (Some(si), Some(ei)) = (
        blocks.iter().position(|b| *b == start_block),
        blocks.iter().position(|b| *b == end_block),
    ) else {
        return Ok(());
    };

    let mut ops: Vec<Op> = Vec::new();
    for (ix, block) in blocks.iter().enumerate().take(ei + 1).skip(si).rev() {
        let leaves = range::block_leaves(doc, block);
        let block_len = leaves.last().map_or(0, |leaf| leaf.end());
        let from = if ix == si { start_offset } else { 0 };
        let to = if ix == ei { end_offset } else { block_len };

        for leaf in leaves.iter().rev() {
            let s = from.max(leaf.start);
            let e = to.min(leaf.end());
            if s >= e {
                continue;
            }
            let text = &leaf.node.text;
            let (ls, le) = (s - leaf.start, e - leaf.start);
            let marks = leaf.node.marks.clone();

            if ls == 0 && le == text.len() {
                ops.push(Op::SetTextMarks {
                    path: leaf.path.clone(),
                    marks: apply(marks),
                });
                continue;
            }

            let mut pieces: Vec<Node> = Vec::new();
            if ls > 0 {
                pieces.push(Node::Text(TextNode::with_marks(&text[..ls], marks.clone())));
            }
            pieces.push(Node::Text(TextNode::with_marks(
                &text[ls..le],
                apply(marks.clone()),
            )));
            if le < text.len() {
                pieces.push(Node::Text(TextNode::with_marks(&text[le..], marks)));
            }

            ops.push(Op::RemoveNode {
                path: leaf.path.clone(),
            });
            for (i, node) in pieces.into_iter().enumerate() {
                ops.push(Op::InsertNode {
                    path: sibling(&leaf.path, i),
                    node,
                });
            }
        }
    }

    if ops.is_empty() {
        return Ok(());
    }

    let selection = editor.selection().clone();
    let anchor = range::point_block_offset(doc, registry, &selection.anchor);
    let focus = range::point_block_offset(doc, registry, &selection.focus);

    editor.apply(Transaction::new(ops).source("transforms:set_marks"))?;

    if let (Some((anchor_block, anchor_offset)), Some((focus_block, focus_offset))) = (anchor, focus)
    {
        let collapsed = selection.is_collapsed();
        let points = {
            let doc = editor.doc();
            let anchor_leaves = range::block_leaves(doc, &anchor_block);
            let focus_leaves = range::block_leaves(doc, &focus_block);
            let anchor_affinity = if collapsed {
                Affinity::Backward
            } else {
                Affinity::Forward
            };
            (
                range::offset_to_point(&anchor_leaves, anchor_offset, anchor_affinity),
                range::offset_to_point(&focus_leaves, focus_offset, Affinity::Backward),
            )
        };
        if let (Some(anchor), Some(focus)) = points {
            editor.set_selection(Selection::new(anchor, focus));
        }
    }
    Ok(())
}

/// Whether every character in `range` carries the mark tested by `has`.
pub fn range_has_mark(editor: &Editor, range: &Selection, has: &dyn Fn(&Marks) -> bool) -> bool {
    let (start, end) = range.ordered();
    let doc = editor.doc();
    let registry = editor.registry();
    let (Some((start_block, start_offset)), Some((end_block, end_offset))) = (
        range::point_block_offset(doc, registry, start),
        range::point_block_offset(doc, registry, end),
    ) else {
        return false;
    };
    let blocks = range::leaf_blocks_in_order(doc, registry);
    let (Some(si), Some(ei)) = (
        blocks.iter().position(|b| *b == start_block),
        blocks.iter().position(|b| *b == end_block),
    ) else {
        return false;
    };

    let mut saw_text = false;
    for (ix, block) in blocks.iter().enumerate().take(ei + 1).skip(si) {
        let leaves = range::block_leaves(doc, block);
        let block_len = leaves.last().map_or(0, |leaf| leaf.end());
        let from = if ix == si { start_offset } else { 0 };
        let to = if ix == ei { end_offset } else { block_len };
        for leaf in &leaves {
            if from.max(leaf.start) >= to.min(leaf.end()) {
                continue;
            }
            saw_text = true;
            if !has(&leaf.node.marks) {
                return false;
            }
        }
    }
    saw_text
}

/// Where a rebuilt block lands relative to the list it sits in.
fn lift_ops(
    editor: &Editor,
    item_path: &[usize],
    replacement: Node,
) -> Result<(Vec<Op>, Path), ApplyError> {
    let Some((&item_ix, list_path)) = item_path.split_last() else {
        return Err(invalid_path("No list item", item_path));
    };
    let list = editor
        .doc()
        .element(list_path)
        .ok_or_else(|| invalid_path("No list", list_path))?;
    let len = list.children.len();

    let mut ops: Vec<Op> = Vec::new();
    let new_path = if len == 1 {
        ops.extend(replace_node_ops(list_path, replacement));
        list_path.to_vec()
    } else if item_ix == 0 {
        ops.push(Op::RemoveNode {
            path: item_path.to_vec(),
        });
        ops.push(Op::InsertNode {
            path: list_path.to_vec(),
            node: replacement,
        });
        list_path.to_vec()
    } else if item_ix + 1 == len {
        ops.push(Op::RemoveNode {
            path: item_path.to_vec(),
        });
        ops.push(Op::InsertNode {
            path: sibling(list_path, 1),
            node: replacement,
        });
        sibling(list_path, 1)
    } else {
        let tail: Vec<Node> = list.children[item_ix + 1..].to_vec();
        for ix in (item_ix..len).rev() {
            ops.push(Op::RemoveNode {
                path: child(list_path, ix),
            });
        }
        ops.push(Op::InsertNode {
            path: sibling(list_path, 1),
            node: replacement,
        });
        ops.push(Op::InsertNode {
            path: sibling(list_path, 2),
            node: Node::Element(ElementNode {
                children: tail,
                ..list.clone()
            }),
        });
        sibling(list_path, 1)
    };

    Ok((ops, new_path))
}

/// Rewrites the block at `block` with `edit` in one transaction. A block
/// inside a list is lifted out first, splitting the list around it; with
/// `wrap_in` the rewritten block is wrapped in a fresh container of that
/// kind. Returns the rewritten block's new path.
pub fn rebuild_block(
    editor: &mut Editor,
    block: &[usize],
    wrap_in: Option<&str>,
    edit: impl FnOnce(&mut ElementNode),
) -> Result<Path, ApplyError> {
    let mut el = editor
        .doc()
        .element(block)
        .cloned()
        .ok_or_else(|| invalid_path("No block", block))?;
    edit(&mut el);

    let replacement = match wrap_in {
        Some(container) => Node::element(container, vec![Node::Element(el)]),
        None => Node::Element(el),
    };

    let in_list = block
        .split_last()
        .and_then(|(_, parent)| editor.doc().element(parent))
        .is_some_and(|parent| kinds::is_list_container(&parent.kind));

    let (ops, new_path) = if in_list {
        lift_ops(editor, block, replacement)?
    } else {
        (replace_node_ops(block, replacement), block.to_vec())
    };

    editor.apply(Transaction::new(ops).source("transforms:rebuild_block"))?;

    Ok(match wrap_in {
        Some(_) => child(&new_path, 0),
        None => new_path,
    })
}

/// Sets the kind and attributes of a block in place.
pub fn set_block_kind(
    editor: &mut Editor,
    block: &[usize],
    kind: &str,
    patch: AttrPatch,
) -> Result<(), ApplyError> {
    let mut ops = vec![Op::SetNodeKind {
        path: block.to_vec(),
        kind: kind.to_string(),
    }];
    if !patch.is_empty() {
        ops.push(Op::SetNodeAttrs {
            path: block.to_vec(),
            patch,
        });
    }
    editor.apply(Transaction::new(ops).source("transforms:set_block_kind"))
}

/// Lifts a list item out of its list as a block of kind `as_kind`.
pub fn lift_list_item(
    editor: &mut Editor,
    item: &[usize],
    as_kind: &str,
) -> Result<Path, ApplyError> {
    let offset = range::cursor_block_offset(editor)
        .filter(|(block, _)| block == item)
        .map(|(_, offset)| offset);
    let new_path = rebuild_block(editor, item, None, |el| {
        el.kind = as_kind.to_string();
        el.attrs.remove("checked");
    })?;
    if let Some(offset) = offset {
        select_offset(editor, &new_path, offset, Affinity::Backward);
    }
    Ok(new_path)
}

/// Splits the block under the cursor in two. A void block gets an empty
/// paragraph after it instead.
pub fn split_block(editor: &mut Editor) -> Result<(), ApplyError> {
    let selection = editor.selection().clone();
    if !selection.is_collapsed() {
        delete_range(editor, &selection)?;
    }
    let Some((block, offset)) = range::cursor_block_offset(editor) else {
        return Ok(());
    };
    let Some(el) = editor.doc().element(&block).cloned() else {
        return Ok(());
    };

    if editor.registry().is_void(&el.kind) {
        return insert_paragraph_after(editor, &block);
    }

    let (left, right) = split_children(&el.children, offset);
    let mut second = ElementNode {
        children: right,
        ..el.clone()
    };
    if second.kind == kinds::CHECK_LIST {
        second
            .attrs
            .insert("checked".to_string(), serde_json::Value::Bool(false));
    }
    let first = ElementNode {
        children: left,
        ..el
    };

    let mut ops = replace_node_ops(&block, Node::Element(first));
    ops.push(Op::InsertNode {
        path: sibling(&block, 1),
        node: Node::Element(second),
    });
    editor.apply(Transaction::new(ops).source("transforms:split_block"))?;
    select_block_start(editor, &sibling(&block, 1));
    Ok(())
}

/// Inserts an empty paragraph right after `block` and moves the cursor there.
pub fn insert_paragraph_after(editor: &mut Editor, block: &[usize]) -> Result<(), ApplyError> {
    let next = sibling(block, 1);
    editor.apply(
        Transaction::new(vec![Op::InsertNode {
            path: next.clone(),
            node: Node::paragraph(""),
        }])
        .selection_after(Selection::collapsed(Point::new(child(&next, 0), 0)))
        .source("transforms:insert_paragraph"),
    )
}

/// Inserts a block-level node at the cursor: after the cursor's block when
/// the cursor is at its end, before it when at the start of a non-empty
/// block, otherwise between the two halves of the split block. An empty
/// paragraph under the cursor is replaced by the node. Inside a list the
/// node goes beside the list. A void node is followed by a block the cursor
/// moves into, created when missing; any other node receives the cursor
/// itself.
pub fn insert_block_node(editor: &mut Editor, node: Node) -> Result<Path, ApplyError> {
    let selection = editor.selection().clone();
    if !selection.is_collapsed() {
        delete_range(editor, &selection)?;
    }
    let Some((block, offset)) =
        range::point_block_offset(editor.doc(), editor.registry(), &editor.selection().focus)
    else {
        return Err(invalid_path("Cursor is not in a block", &selection.focus.path));
    };
    let el = editor
        .doc()
        .element(&block)
        .cloned()
        .ok_or_else(|| invalid_path("No block", &block))?;

    let block_len = range::block_string(editor.doc(), &block).len();
    let is_void_block = editor.registry().is_void(&el.kind);
    let parent_is_list = block
        .split_last()
        .and_then(|(_, parent)| editor.doc().element(parent))
        .is_some_and(|parent| kinds::is_list_container(&parent.kind));

    let at_start = offset == 0 && block_len > 0 && !is_void_block;
    let replace_empty = !parent_is_list && block_len == 0 && el.kind == kinds::PARAGRAPH;
    let split = !parent_is_list && !is_void_block && offset > 0 && offset < block_len;
    let mut ops: Vec<Op> = Vec::new();
    let node_path = if parent_is_list {
        let list_path = &block[..block.len() - 1];
        if at_start {
            list_path.to_vec()
        } else {
            sibling(list_path, 1)
        }
    } else if split {
        let (left, right) = split_children(&el.children, offset);
        ops.extend(replace_node_ops(
            &block,
            Node::Element(ElementNode {
                children: left,
                ..el.clone()
            }),
        ));
        ops.push(Op::InsertNode {
            path: sibling(&block, 1),
            node: Node::Element(ElementNode {
                children: right,
                ..el.clone()
            }),
        });
        sibling(&block, 1)
    } else if replace_empty {
        ops.push(Op::RemoveNode { path: block.clone() });
        block.clone()
    } else if at_start {
        block.clone()
    } else {
        sibling(&block, 1)
    };

    let node_is_void = match &node {
        Node::Element(inserted) => editor.registry().is_void(&inserted.kind),
        Node::Text(_) => false,
    };
    let (&node_ix, parent) = node_path
        .split_last()
        .ok_or_else(|| invalid_path("No insert position", &block))?;
    let mut sibling_count = editor.doc().children_at(parent).map_or(0, <[Node]>::len);
    if replace_empty {
        sibling_count -= 1;
    }
    let has_next = split || node_ix < sibling_count;

    ops.push(Op::InsertNode {
        path: node_path.clone(),
        node,
    });

    let after = sibling(&node_path, 1);
    if node_is_void && !has_next {
        ops.push(Op::InsertNode {
            path: after.clone(),
            node: Node::paragraph(""),
        });
    }

    editor.apply(Transaction::new(ops).source("transforms:insert_block"))?;
    if node_is_void {
        select_block_start(editor, &after);
    } else {
        select_block_start(editor, &node_path);
    }
    Ok(node_path)
}

/// Inserts an inline element at the cursor and places the cursor after it.
pub fn insert_inline_node(editor: &mut Editor, node: Node) -> Result<(), ApplyError> {
    let selection = editor.selection().clone();
    if !selection.is_collapsed() {
        delete_range(editor, &selection)?;
    }
    let Some((block, offset)) = range::cursor_block_offset(editor) else {
        return Ok(());
    };
    let Some(el) = editor.doc().element(&block).cloned() else {
        return Ok(());
    };
    if !editor.registry().is_text_block(&el) {
        return Ok(());
    }

    let inserted_len = node.string().len();
    let (mut children, right) = split_children(&el.children, offset);
    children.push(node);
    children.extend(right);

    editor.apply(
        Transaction::new(replace_node_ops(
            &block,
            Node::Element(ElementNode { children, ..el }),
        ))
        .source("transforms:insert_inline"),
    )?;
    select_offset(editor, &block, offset + inserted_len, Affinity::Forward);
    Ok(())
}

/// Wraps the part of `range` inside its start block in the inline element
/// `wrapper`. The cursor lands after the wrapped text.
pub fn wrap_inline(
    editor: &mut Editor,
    range: &Selection,
    wrapper: ElementNode,
) -> Result<(), ApplyError> {
    let (start, end) = range.ordered();
    let doc = editor.doc();
    let registry = editor.registry();
    let Some((block, start_offset)) = range::point_block_offset(doc, registry, start) else {
        return Ok(());
    };
    let block_len = range::block_string(doc, &block).len();
    let end_offset = match range::point_block_offset(doc, registry, end) {
        Some((end_block, offset)) if end_block == block => offset,
        _ => block_len,
    };
    let Some(el) = doc.element(&block).cloned() else {
        return Ok(());
    };
    if !registry.is_text_block(&el) || start_offset >= end_offset {
        return Ok(());
    }

    let (mut children, rest) = split_children(&el.children, start_offset);
    let (middle, right) = split_children(&rest, end_offset - start_offset);
    // Links never nest: flatten any inline element caught in the range.
    let middle: Vec<Node> = middle
        .into_iter()
        .flat_map(|node| match node {
            Node::Element(inner) if registry.is_inline(&inner.kind) => inner.children,
            other => vec![other],
        })
        .collect();
    children.push(Node::Element(ElementNode {
        children: middle,
        ..wrapper
    }));
    children.extend(right);

    editor.apply(
        Transaction::new(replace_node_ops(
            &block,
            Node::Element(ElementNode { children, ..el }),
        ))
        .source("transforms:wrap_inline"),
    )?;
    select_offset(editor, &block, end_offset, Affinity::Forward);
    Ok(())
}

/// Replaces the inline element at `path` with its children.
pub fn unwrap_inline(editor: &mut Editor, path: &[usize]) -> Result<(), ApplyError> {
    let Some(el) = editor.doc().element(path).cloned() else {
        return Ok(());
    };
    let selection = editor.selection().clone();
    let anchor = range::point_block_offset(editor.doc(), editor.registry(), &selection.anchor);
    let focus = range::point_block_offset(editor.doc(), editor.registry(), &selection.focus);

    let mut ops = vec![Op::RemoveNode {
        path: path.to_vec(),
    }];
    for (i, node) in el.children.into_iter().enumerate() {
        ops.push(Op::InsertNode {
            path: sibling(path, i),
            node,
        });
    }
    editor.apply(Transaction::new(ops).source("transforms:unwrap_inline"))?;

    if let (Some((anchor_block, anchor_offset)), Some((focus_block, focus_offset))) = (anchor, focus)
    {
        let points = {
            let doc = editor.doc();
            (
                range::offset_to_point(
                    &range::block_leaves(doc, &anchor_block),
                    anchor_offset,
                    Affinity::Backward,
                ),
                range::offset_to_point(
                    &range::block_leaves(doc, &focus_block),
                    focus_offset,
                    Affinity::Backward,
                ),
            )
        };
        if let (Some(anchor), Some(focus)) = points {
            editor.set_selection(Selection::new(anchor, focus));
        }
    }
    Ok(())
}

/// Default backspace: removes the previous character, or at the start of a
/// block merges it into the previous text block, or removes a previous void.
pub fn delete_backward(editor: &mut Editor) -> Result<(), ApplyError> {
    let selection = editor.selection().clone();
    if !selection.is_collapsed() {
        return delete_range(editor, &selection);
    }
    let Some((block, offset)) = range::cursor_block_offset(editor) else {
        return Ok(());
    };
    let Some(el) = editor.doc().element(&block).cloned() else {
        return Ok(());
    };

    if editor.registry().is_void(&el.kind) {
        return remove_void_block(editor, &block);
    }
    if offset > 0 {
        return delete_backward_chars(editor, 1);
    }

    let blocks = range::leaf_blocks_in_order(editor.doc(), editor.registry());
    let Some(ix) = blocks.iter().position(|b| *b == block) else {
        return Ok(());
    };
    let Some(prev) = ix.checked_sub(1).and_then(|p| blocks.get(p)).cloned() else {
        return Ok(());
    };
    let Some(prev_el) = editor.doc().element(&prev).cloned() else {
        return Ok(());
    };

    if editor.registry().is_void(&prev_el.kind) {
        return editor.apply(
            Transaction::new(vec![Op::RemoveNode { path: prev }]).source("transforms:remove_void"),
        );
    }

    let prev_len = range::block_string(editor.doc(), &prev).len();
    let mut ops: Vec<Op> = Vec::new();
    let start = prev_el.children.len();
    for (i, node) in el.children.iter().cloned().enumerate() {
        ops.push(Op::InsertNode {
            path: child(&prev, start + i),
            node,
        });
    }
    ops.push(Op::RemoveNode {
        path: block.clone(),
    });
    editor.apply(Transaction::new(ops).source("transforms:merge_blocks"))?;
    select_offset(editor, &prev, prev_len, Affinity::Backward);
    Ok(())
}

fn remove_void_block(editor: &mut Editor, block: &[usize]) -> Result<(), ApplyError> {
    let blocks = range::leaf_blocks_in_order(editor.doc(), editor.registry());
    let ix = blocks.iter().position(|b| b == block);
    let prev = ix
        .and_then(|ix| ix.checked_sub(1))
        .and_then(|p| blocks.get(p))
        .cloned();

    editor.apply(
        Transaction::new(vec![Op::RemoveNode {
            path: block.to_vec(),
        }])
        .source("transforms:remove_void"),
    )?;

    if let Some(prev) = prev {
        let len = range::block_string(editor.doc(), &prev).len();
        select_offset(editor, &prev, len, Affinity::Backward);
    }
    Ok(())
}

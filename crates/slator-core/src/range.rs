//! Cursor arithmetic relative to the enclosing block.
//!
//! A block's text is the concatenation of its leaves in document order,
//! descending into inline elements. Offsets into that string are byte
//! offsets on char boundaries, the same unit as [`Point::offset`].

use crate::core::{Document, Editor, Node, Point, Selection, TextNode, clamp_to_char_boundary};
use crate::ops::Path;
use crate::plugin::PluginRegistry;

/// Upper bound, in characters, of the text the shortcut engines look at.
pub const MAX_CHARS_TO_MATCH: usize = 300;

/// Which leaf a block offset resolves to when it sits on a leaf boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Affinity {
    /// End of the earlier leaf.
    #[default]
    Backward,
    /// Start of the later leaf.
    Forward,
}

#[derive(Debug, Clone)]
pub struct Leaf<'a> {
    pub path: Path,
    pub start: usize,
    pub node: &'a TextNode,
}

impl Leaf<'_> {
    pub fn end(&self) -> usize {
        self.start + self.node.text.len()
    }
}

/// Innermost block ancestor of the node at `path` that the cursor can sit
/// in (a text block or a void block).
pub fn block_above(doc: &Document, registry: &PluginRegistry, path: &[usize]) -> Option<Path> {
    (1..=path.len()).rev().find_map(|len| {
        let el = doc.element(&path[..len])?;
        registry.is_leaf_block(el).then(|| path[..len].to_vec())
    })
}

/// The text leaves of a block in document order, with their block offsets.
pub fn block_leaves<'a>(doc: &'a Document, block_path: &[usize]) -> Vec<Leaf<'a>> {
    fn walk<'a>(children: &'a [Node], path: &mut Vec<usize>, start: &mut usize, out: &mut Vec<Leaf<'a>>) {
        for (ix, node) in children.iter().enumerate() {
            path.push(ix);
            match node {
                Node::Text(t) => {
                    out.push(Leaf {
                        path: path.clone(),
                        start: *start,
                        node: t,
                    });
                    *start += t.text.len();
                }
                Node::Element(el) => walk(&el.children, path, start, out),
            }
            path.pop();
        }
    }

    let mut out = Vec::new();
    if let Some(el) = doc.element(block_path) {
        walk(&el.children, &mut block_path.to_vec(), &mut 0, &mut out);
    }
    out
}

pub fn block_string(doc: &Document, block_path: &[usize]) -> String {
    doc.node(block_path).map(Node::string).unwrap_or_default()
}

pub fn point_to_offset(leaves: &[Leaf<'_>], point: &Point) -> Option<usize> {
    let leaf = leaves.iter().find(|leaf| leaf.path == point.path)?;
    Some(leaf.start + clamp_to_char_boundary(&leaf.node.text, point.offset))
}

pub fn offset_to_point(leaves: &[Leaf<'_>], offset: usize, affinity: Affinity) -> Option<Point> {
    let last = leaves.last()?;
    let leaf = match affinity {
        Affinity::Backward => leaves.iter().find(|leaf| offset <= leaf.end()),
        Affinity::Forward => leaves.iter().find(|leaf| offset < leaf.end()),
    }
    .unwrap_or(last);

    let local = offset.saturating_sub(leaf.start);
    Some(Point::new(
        leaf.path.clone(),
        clamp_to_char_boundary(&leaf.node.text, local),
    ))
}

/// Block path and block offset of `point`.
pub fn point_block_offset(
    doc: &Document,
    registry: &PluginRegistry,
    point: &Point,
) -> Option<(Path, usize)> {
    let block = block_above(doc, registry, &point.path)?;
    let leaves = block_leaves(doc, &block);
    let offset = point_to_offset(&leaves, point)?;
    Some((block, offset))
}

/// Block path and block offset of the collapsed cursor.
pub fn cursor_block_offset(editor: &Editor) -> Option<(Path, usize)> {
    let selection = editor.selection();
    if !selection.is_collapsed() {
        return None;
    }
    point_block_offset(editor.doc(), editor.registry(), &selection.focus)
}

/// Keeps at most the last `max_chars` characters of `text`.
pub fn truncate_left(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let skip = count - max_chars;
    let start = text.char_indices().nth(skip).map_or(text.len(), |(ix, _)| ix);
    &text[start..]
}

/// Text between the start of the cursor's block and the cursor, limited to
/// [`MAX_CHARS_TO_MATCH`] characters. `None` unless the selection is
/// collapsed.
pub fn text_before_cursor(editor: &Editor) -> Option<String> {
    let range = before_range(editor)?;
    let before = range_string(editor.doc(), editor.registry(), &range)?;
    Some(truncate_left(&before, MAX_CHARS_TO_MATCH).to_string())
}

/// Text covered by `range`. `None` when its edges sit in different blocks.
pub fn range_string(doc: &Document, registry: &PluginRegistry, range: &Selection) -> Option<String> {
    let (start, end) = range.ordered();
    let (block, from) = point_block_offset(doc, registry, start)?;
    let (end_block, to) = point_block_offset(doc, registry, end)?;
    if block != end_block {
        return None;
    }
    block_string(doc, &block).get(from..to).map(str::to_string)
}

/// The range from the start of the cursor's block to the cursor.
pub fn before_range(editor: &Editor) -> Option<Selection> {
    let (block, _) = cursor_block_offset(editor)?;
    let leaves = block_leaves(editor.doc(), &block);
    let start = offset_to_point(&leaves, 0, Affinity::Forward)?;
    Some(Selection::new(start, editor.selection().focus.clone()))
}

/// Moves the edges of `range` off neighbouring leaves without changing the
/// characters it covers: a start sitting at the end of its leaf moves to the
/// start of the next leaf in the block, an end sitting at offset 0 moves to
/// the end of the previous one.
pub fn unhang_range(doc: &Document, registry: &PluginRegistry, range: &Selection) -> Selection {
    let forward = !crate::core::point_is_before(&range.focus, &range.anchor);
    let (start, end) = range.ordered();
    let mut start = start.clone();
    let mut end = end.clone();

    if let Some(block) = block_above(doc, registry, &start.path) {
        let leaves = block_leaves(doc, &block);
        if let Some(ix) = leaves.iter().position(|leaf| leaf.path == start.path) {
            if start.offset >= leaves[ix].node.text.len()
                && let Some(next) = leaves.get(ix + 1)
            {
                start = Point::new(next.path.clone(), 0);
            }
        }
    }

    if end.offset == 0
        && let Some(block) = block_above(doc, registry, &end.path)
    {
        let leaves = block_leaves(doc, &block);
        if let Some(ix) = leaves.iter().position(|leaf| leaf.path == end.path)
            && ix > 0
        {
            let prev = &leaves[ix - 1];
            end = Point::new(prev.path.clone(), prev.node.text.len());
        }
    }

    if point_after(&start, &end) {
        return range.clone();
    }

    if forward {
        Selection::new(start, end)
    } else {
        Selection::new(end, start)
    }
}

fn point_after(a: &Point, b: &Point) -> bool {
    crate::core::point_is_before(b, a)
}

/// Every block the cursor can sit in, in document order.
pub fn leaf_blocks_in_order(doc: &Document, registry: &PluginRegistry) -> Vec<Path> {
    fn walk(nodes: &[Node], path: &mut Vec<usize>, registry: &PluginRegistry, out: &mut Vec<Path>) {
        for (ix, node) in nodes.iter().enumerate() {
            let Node::Element(el) = node else {
                continue;
            };
            path.push(ix);
            if registry.is_leaf_block(el) {
                out.push(path.clone());
            } else if !registry.is_inline(&el.kind) {
                walk(&el.children, path, registry, out);
            }
            path.pop();
        }
    }

    let mut out = Vec::new();
    walk(&doc.children, &mut Vec::new(), registry, &mut out);
    out
}

use crate::core::{Document, ElementNode, Node, kinds};
use crate::ops::Op;
use crate::plugin::{ChildConstraint, EditorPlugin, NodeSpec, NormalizePass, PluginRegistry};

/// Visits every element below `children` after its descendants, last sibling
/// first. Ops emitted in visiting order then never shift a path emitted
/// after them.
pub(crate) fn visit_elements_post_order(
    children: &[Node],
    path: &mut Vec<usize>,
    visit: &mut dyn FnMut(&[usize], &ElementNode),
) {
    for (ix, node) in children.iter().enumerate().rev() {
        let Node::Element(el) = node else {
            continue;
        };
        path.push(ix);
        visit_elements_post_order(&el.children, path, visit);
        visit(path, el);
        path.pop();
    }
}

pub(crate) fn child_path(parent: &[usize], ix: usize) -> Vec<usize> {
    let mut path = parent.to_vec();
    path.push(ix);
    path
}

/// Non-void elements whose children are text and inline elements: text
/// blocks and inline elements such as links.
fn holds_inline_content(el: &ElementNode, registry: &PluginRegistry) -> bool {
    !registry.is_void(&el.kind) && registry.child_constraint(el) == ChildConstraint::InlineOnly
}

pub(crate) struct CoreParagraphPlugin;

impl EditorPlugin for CoreParagraphPlugin {
    fn id(&self) -> &'static str {
        "core.paragraph"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::text_block(kinds::PARAGRAPH)]
    }
}

pub(crate) struct CoreNormalizePlugin;

impl EditorPlugin for CoreNormalizePlugin {
    fn id(&self) -> &'static str {
        "core.normalize"
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![
            Box::new(EnsureNonEmptyDocument),
            Box::new(EnsureVoidPlaceholder),
            Box::new(EnsureTextLeaf),
            Box::new(EnsureInlineSpacers),
            Box::new(RemoveEmptyTextLeaves),
            Box::new(MergeAdjacentTextLeaves),
        ]
    }
}

struct EnsureNonEmptyDocument;

impl NormalizePass for EnsureNonEmptyDocument {
    fn id(&self) -> &'static str {
        "core.ensure_non_empty_document"
    }

    fn run(&self, doc: &Document, _registry: &PluginRegistry) -> Vec<Op> {
        if doc.children.is_empty() {
            return vec![Op::InsertNode {
                path: vec![0],
                node: Node::paragraph(""),
            }];
        }
        Vec::new()
    }
}

/// Void elements keep exactly one empty, unmarked text child.
struct EnsureVoidPlaceholder;

impl NormalizePass for EnsureVoidPlaceholder {
    fn id(&self) -> &'static str {
        "core.ensure_void_placeholder"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        visit_elements_post_order(&doc.children, &mut Vec::new(), &mut |path, el| {
            if !registry.is_void(&el.kind) {
                return;
            }
            let placeholder = Node::text("");
            if el.children.len() == 1 && el.children[0] == placeholder {
                return;
            }
            for ix in (0..el.children.len()).rev() {
                ops.push(Op::RemoveNode {
                    path: child_path(path, ix),
                });
            }
            ops.push(Op::InsertNode {
                path: child_path(path, 0),
                node: placeholder,
            });
        });
        ops
    }
}

struct EnsureTextLeaf;

impl NormalizePass for EnsureTextLeaf {
    fn id(&self) -> &'static str {
        "core.ensure_inline_only_blocks_have_text_leaf"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        visit_elements_post_order(&doc.children, &mut Vec::new(), &mut |path, el| {
            if !holds_inline_content(el, registry) {
                return;
            }
            if !el.children.iter().any(|n| matches!(n, Node::Text(_))) {
                ops.push(Op::InsertNode {
                    path: child_path(path, 0),
                    node: Node::text(""),
                });
            }
        });
        ops
    }
}

/// Inline elements always have a text leaf on both sides, so the cursor can
/// be placed before and after them.
struct EnsureInlineSpacers;

impl NormalizePass for EnsureInlineSpacers {
    fn id(&self) -> &'static str {
        "core.ensure_inline_spacers"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        visit_elements_post_order(&doc.children, &mut Vec::new(), &mut |path, el| {
            if !holds_inline_content(el, registry) {
                return;
            }
            for ix in (0..el.children.len()).rev() {
                if !matches!(el.children[ix], Node::Element(_)) {
                    continue;
                }
                if !matches!(el.children.get(ix + 1), Some(Node::Text(_))) {
                    ops.push(Op::InsertNode {
                        path: child_path(path, ix + 1),
                        node: Node::text(""),
                    });
                }
                if ix == 0 {
                    ops.push(Op::InsertNode {
                        path: child_path(path, 0),
                        node: Node::text(""),
                    });
                }
            }
        });
        ops
    }
}

/// Drops empty leaves that are neither the only child nor the spacer of an
/// inline element.
struct RemoveEmptyTextLeaves;

impl NormalizePass for RemoveEmptyTextLeaves {
    fn id(&self) -> &'static str {
        "core.remove_empty_text_leaves"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        visit_elements_post_order(&doc.children, &mut Vec::new(), &mut |path, el| {
            if !holds_inline_content(el, registry) || el.children.len() < 2 {
                return;
            }

            let mut remaining: Vec<&Node> = el.children.iter().collect();
            for ix in (0..el.children.len()).rev() {
                let Node::Text(t) = remaining[ix] else {
                    continue;
                };
                if !t.text.is_empty() || remaining.len() < 2 {
                    continue;
                }
                let prev_is_element = ix > 0 && matches!(remaining[ix - 1], Node::Element(_));
                let next_is_element = matches!(remaining.get(ix + 1), Some(Node::Element(_)));
                if prev_is_element || next_is_element {
                    continue;
                }
                remaining.remove(ix);
                ops.push(Op::RemoveNode {
                    path: child_path(path, ix),
                });
            }
        });
        ops
    }
}

struct MergeAdjacentTextLeaves;

impl NormalizePass for MergeAdjacentTextLeaves {
    fn id(&self) -> &'static str {
        "core.merge_adjacent_text_leaves"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        visit_elements_post_order(&doc.children, &mut Vec::new(), &mut |path, el| {
            if !holds_inline_content(el, registry) || el.children.len() < 2 {
                return;
            }

            let mut ix = el.children.len();
            while ix > 0 {
                ix -= 1;
                let Node::Text(right) = &el.children[ix] else {
                    continue;
                };

                let mut start = ix;
                while start > 0 {
                    let Some(Node::Text(left)) = el.children.get(start - 1) else {
                        break;
                    };
                    if left.marks != right.marks {
                        break;
                    }
                    start -= 1;
                }

                if start == ix {
                    continue;
                }

                let Some(Node::Text(first)) = el.children.get(start) else {
                    continue;
                };
                let appended: String = el.children[start + 1..=ix]
                    .iter()
                    .filter_map(Node::as_text)
                    .map(|t| t.text.as_str())
                    .collect();

                if !appended.is_empty() {
                    ops.push(Op::InsertText {
                        path: child_path(path, start),
                        offset: first.text.len(),
                        text: appended,
                    });
                }

                for remove_ix in (start + 1..=ix).rev() {
                    ops.push(Op::RemoveNode {
                        path: child_path(path, remove_ix),
                    });
                }

                ix = start;
            }
        });
        ops
    }
}

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ops::{Op, Path, Transaction};
use crate::plugin::{CommandError, CommandSpec, NodeSpec, PluginRegistry, QueryError};

pub type Attrs = BTreeMap<String, serde_json::Value>;
pub type ElementKind = String;

/// Element kinds known to the built-in plugins.
pub mod kinds {
    pub const PARAGRAPH: &str = "paragraph";
    pub const HEADING_ONE: &str = "heading-one";
    pub const HEADING_TWO: &str = "heading-two";
    pub const HEADING_THREE: &str = "heading-three";
    pub const BLOCK_QUOTE: &str = "block-quote";
    pub const CODE_BLOCK: &str = "code-block";
    pub const LIST_ITEM: &str = "list-item";
    pub const NUMBERED_LIST: &str = "numbered-list";
    pub const BULLETED_LIST: &str = "bulleted-list";
    pub const CHECK_LIST: &str = "check-list";
    pub const DIVIDER: &str = "divider";
    pub const IMAGE: &str = "image";
    pub const LINK: &str = "link";

    pub const LIST_CONTAINERS: [&str; 2] = [NUMBERED_LIST, BULLETED_LIST];

    pub fn is_list_container(kind: &str) -> bool {
        LIST_CONTAINERS.contains(&kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Document {
    pub fn node(&self, path: &[usize]) -> Option<&Node> {
        let (first, rest) = path.split_first()?;
        let mut node = self.children.get(*first)?;
        for &ix in rest {
            node = match node {
                Node::Element(el) => el.children.get(ix)?,
                Node::Text(_) => return None,
            };
        }
        Some(node)
    }

    pub fn element(&self, path: &[usize]) -> Option<&ElementNode> {
        match self.node(path)? {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    pub fn text(&self, path: &[usize]) -> Option<&TextNode> {
        match self.node(path)? {
            Node::Text(t) => Some(t),
            Node::Element(_) => None,
        }
    }

    /// Children of the node at `parent_path`; the root's children for an empty path.
    pub fn children_at(&self, parent_path: &[usize]) -> Option<&[Node]> {
        if parent_path.is_empty() {
            return Some(&self.children);
        }
        self.element(parent_path).map(|el| el.children.as_slice())
    }

    /// Depth-first search for the first element matching `predicate`.
    pub fn find_element(&self, predicate: impl Fn(&ElementNode) -> bool) -> Option<Path> {
        fn walk(
            nodes: &[Node],
            path: &mut Vec<usize>,
            predicate: &dyn Fn(&ElementNode) -> bool,
        ) -> Option<Path> {
            for (ix, node) in nodes.iter().enumerate() {
                let Node::Element(el) = node else {
                    continue;
                };
                path.push(ix);
                if predicate(el) {
                    return Some(path.clone());
                }
                if let Some(found) = walk(&el.children, path, predicate) {
                    return Some(found);
                }
                path.pop();
            }
            None
        }

        walk(&self.children, &mut Vec::new(), &predicate)
    }

    /// All elements in document order, with their paths.
    pub fn elements(&self) -> Vec<(Path, &ElementNode)> {
        fn walk<'a>(nodes: &'a [Node], path: &mut Vec<usize>, out: &mut Vec<(Path, &'a ElementNode)>) {
            for (ix, node) in nodes.iter().enumerate() {
                let Node::Element(el) = node else {
                    continue;
                };
                path.push(ix);
                out.push((path.clone(), el));
                walk(&el.children, path, out);
                path.pop();
            }
        }

        let mut out = Vec::new();
        walk(&self.children, &mut Vec::new(), &mut out);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Element(ElementNode),
    Text(TextNode),
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(TextNode::new(text))
    }

    pub fn element(kind: impl Into<String>, children: Vec<Node>) -> Self {
        Node::Element(ElementNode {
            kind: kind.into(),
            attrs: Attrs::default(),
            children,
        })
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Node::element(kinds::PARAGRAPH, vec![Node::text(text)])
    }

    /// A void element: attributes only, with the single empty placeholder leaf.
    pub fn void(kind: impl Into<String>, attrs: Attrs) -> Self {
        Node::Element(ElementNode {
            kind: kind.into(),
            attrs,
            children: vec![Node::text("")],
        })
    }

    pub fn divider() -> Self {
        Node::void(kinds::DIVIDER, Attrs::default())
    }

    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextNode> {
        match self {
            Node::Text(t) => Some(t),
            Node::Element(_) => None,
        }
    }

    /// Concatenated text of every leaf below this node.
    pub fn string(&self) -> String {
        match self {
            Node::Text(t) => t.text.clone(),
            Node::Element(el) => el.children.iter().map(Node::string).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    pub kind: ElementKind,
    #[serde(default)]
    pub attrs: Attrs,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl ElementNode {
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(|v| v.as_str())
    }

    pub fn attr_bool(&self, key: &str) -> Option<bool> {
        self.attrs.get(key).and_then(|v| v.as_bool())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    #[serde(default)]
    pub marks: Marks,
}

impl TextNode {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            marks: Marks::default(),
        }
    }

    pub fn with_marks(text: impl Into<String>, marks: Marks) -> Self {
        Self {
            text: text.into(),
            marks,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkKind {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Code,
    Superscript,
    Subscript,
}

impl MarkKind {
    pub const ALL: [MarkKind; 7] = [
        MarkKind::Bold,
        MarkKind::Italic,
        MarkKind::Underline,
        MarkKind::Strikethrough,
        MarkKind::Code,
        MarkKind::Superscript,
        MarkKind::Subscript,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MarkKind::Bold => "bold",
            MarkKind::Italic => "italic",
            MarkKind::Underline => "underline",
            MarkKind::Strikethrough => "strikethrough",
            MarkKind::Code => "code",
            MarkKind::Superscript => "superscript",
            MarkKind::Subscript => "subscript",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Marks {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub strikethrough: bool,
    #[serde(default)]
    pub code: bool,
    #[serde(default)]
    pub superscript: bool,
    #[serde(default)]
    pub subscript: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    /// Marks applied by a closed markdown delimiter run. They are dropped for
    /// text typed right after the run.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub markdown: BTreeSet<MarkKind>,
}

impl Marks {
    pub fn get(&self, kind: MarkKind) -> bool {
        match kind {
            MarkKind::Bold => self.bold,
            MarkKind::Italic => self.italic,
            MarkKind::Underline => self.underline,
            MarkKind::Strikethrough => self.strikethrough,
            MarkKind::Code => self.code,
            MarkKind::Superscript => self.superscript,
            MarkKind::Subscript => self.subscript,
        }
    }

    pub fn set(&mut self, kind: MarkKind, value: bool) {
        let slot = match kind {
            MarkKind::Bold => &mut self.bold,
            MarkKind::Italic => &mut self.italic,
            MarkKind::Underline => &mut self.underline,
            MarkKind::Strikethrough => &mut self.strikethrough,
            MarkKind::Code => &mut self.code,
            MarkKind::Superscript => &mut self.superscript,
            MarkKind::Subscript => &mut self.subscript,
        };
        *slot = value;
    }

    pub fn is_plain(&self) -> bool {
        *self == Marks::default()
    }

    /// The marks text typed after a closed delimiter run should carry.
    pub fn after_markdown_run(&self) -> Marks {
        let mut next = self.clone();
        for kind in std::mem::take(&mut next.markdown) {
            next.set(kind, false);
        }
        next
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub path: Path,
    pub offset: usize,
}

impl Point {
    pub fn new(path: Path, offset: usize) -> Self {
        Self { path, offset }
    }
}

/// An anchor/focus pair. Used both for the live selection and for any range
/// addressed independently of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self { anchor, focus }
    }

    pub fn collapsed(point: Point) -> Self {
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    /// The earlier and later point, in document order.
    pub fn ordered(&self) -> (&Point, &Point) {
        if point_is_before(&self.focus, &self.anchor) {
            (&self.focus, &self.anchor)
        } else {
            (&self.anchor, &self.focus)
        }
    }
}

pub(crate) fn point_is_before(a: &Point, b: &Point) -> bool {
    if a.path == b.path {
        a.offset < b.offset
    } else {
        a.path < b.path
    }
}

#[derive(Debug, Clone)]
pub struct UndoRecord {
    pub inverse_ops: Vec<Op>,
    pub selection_before: Selection,
    pub selection_after: Selection,
}

#[derive(Debug, Default)]
pub struct EditorConfig {
    pub max_undo: usize,
    pub max_normalize_iterations: usize,
}

impl EditorConfig {
    fn with_defaults(mut self) -> Self {
        if self.max_undo == 0 {
            self.max_undo = 200;
        }
        if self.max_normalize_iterations == 0 {
            self.max_normalize_iterations = 100;
        }
        self
    }
}

pub struct Editor {
    doc: Document,
    selection: Selection,
    registry: PluginRegistry,
    config: EditorConfig,
    undo_stack: Vec<UndoRecord>,
    redo_stack: Vec<UndoRecord>,
    batch_depth: usize,
    pending_marks: Option<Marks>,
}

impl Editor {
    pub fn new(doc: Document, selection: Selection, registry: PluginRegistry) -> Self {
        Self::with_config(doc, selection, registry, EditorConfig::default())
    }

    pub fn with_config(
        doc: Document,
        selection: Selection,
        registry: PluginRegistry,
        config: EditorConfig,
    ) -> Self {
        let mut editor = Self {
            doc,
            selection,
            registry,
            config: config.with_defaults(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            batch_depth: 0,
            pending_marks: None,
        };
        editor.normalize_in_place();
        editor
    }

    pub fn with_core_plugins() -> Self {
        Self::empty(PluginRegistry::core())
    }

    pub fn with_richtext_plugins() -> Self {
        Self::empty(PluginRegistry::richtext())
    }

    /// A single empty paragraph with the cursor in it.
    pub fn empty(registry: PluginRegistry) -> Self {
        let doc = Document {
            children: vec![Node::paragraph("")],
        };
        let selection = Selection::collapsed(Point::new(vec![0, 0], 0));
        Self::new(doc, selection, registry)
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: Selection) {
        if selection != self.selection {
            self.pending_marks = None;
        }
        self.selection = selection;
        self.normalize_selection_in_place();
    }

    /// Marks the next typed text will carry, set by toggling a mark on a
    /// collapsed selection. Dropped as soon as the selection moves.
    pub fn pending_marks(&self) -> Option<&Marks> {
        self.pending_marks.as_ref()
    }

    pub fn set_pending_marks(&mut self, marks: Marks) {
        self.pending_marks = Some(marks);
    }

    pub(crate) fn take_pending_marks(&mut self) -> Option<Marks> {
        self.pending_marks.take()
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo(&mut self) -> bool {
        let Some(record) = self.undo_stack.pop() else {
            return false;
        };
        self.pending_marks = None;

        let UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        } = record;

        let mut redo_ops: Vec<Op> = Vec::new();
        for op in inverse_ops.iter().cloned() {
            match self.apply_op(op) {
                Ok(inv) => redo_ops.push(inv),
                Err(err) => {
                    // Stop mutating once the history no longer lines up with the document.
                    tracing::warn!(%err, "undo stopped early");
                    break;
                }
            }
        }
        redo_ops.reverse();

        self.selection = selection_before.clone();
        self.normalize_in_place();

        self.redo_stack.push(UndoRecord {
            selection_before,
            selection_after,
            inverse_ops: redo_ops,
        });
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(record) = self.redo_stack.pop() else {
            return false;
        };
        self.pending_marks = None;

        let UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        } = record;

        let mut undo_ops: Vec<Op> = Vec::new();
        for op in inverse_ops.iter().cloned() {
            match self.apply_op(op) {
                Ok(inv) => undo_ops.push(inv),
                Err(err) => {
                    tracing::warn!(%err, "redo stopped early");
                    break;
                }
            }
        }
        undo_ops.reverse();

        self.selection = selection_after.clone();
        self.normalize_in_place();

        self.undo_stack.push(UndoRecord {
            selection_before,
            selection_after,
            inverse_ops: undo_ops,
        });
        true
    }

    /// Applies a transaction atomically: ops, then normalization, then one
    /// undo record unless the transaction opted out of history.
    pub fn apply(&mut self, tx: Transaction) -> Result<(), ApplyError> {
        let Transaction {
            ops,
            selection_after,
            meta,
        } = tx;
        let selection_before = self.selection.clone();
        let op_count = ops.len();

        let mut inverse_ops: Vec<Op> = Vec::new();
        for op in ops {
            match self.apply_op(op) {
                Ok(inv) => inverse_ops.push(inv),
                Err(err) => {
                    self.rollback(inverse_ops, selection_before);
                    return Err(err);
                }
            }
        }

        if let Some(sel) = selection_after {
            self.selection = sel;
        }

        let mut inverse_normalize = match self.normalize_with_inverse_ops() {
            Ok(ops) => ops,
            Err((err, applied)) => {
                inverse_ops.extend(applied);
                self.rollback(inverse_ops, selection_before);
                return Err(err);
            }
        };
        inverse_ops.append(&mut inverse_normalize);
        inverse_ops.reverse();

        self.normalize_selection_in_place();
        if self.selection != selection_before {
            self.pending_marks = None;
        }

        tracing::trace!(
            source = meta.source.as_deref().unwrap_or(""),
            ops = op_count,
            save_history = meta.save_history,
            "applied transaction"
        );

        if !meta.save_history {
            return Ok(());
        }

        let selection_after = self.selection.clone();
        self.undo_stack.push(UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        });
        self.redo_stack.clear();
        if self.batch_depth == 0 {
            self.trim_history();
        }

        Ok(())
    }

    /// Applies a transaction that must never show up as an undo step, e.g. a
    /// server result merged into a node after the user's edits.
    pub fn apply_without_history(&mut self, tx: Transaction) -> Result<(), ApplyError> {
        self.apply(tx.without_history())
    }

    /// Runs `f` as one undoable step: every recorded transaction it applies
    /// is merged into a single undo record.
    pub fn transact<T, E>(
        &mut self,
        source: &str,
        f: impl FnOnce(&mut Self) -> Result<T, E>,
    ) -> Result<T, E> {
        if self.batch_depth > 0 {
            self.batch_depth += 1;
            let result = f(self);
            self.batch_depth -= 1;
            return result;
        }

        let start = self.undo_stack.len();
        let selection_before = self.selection.clone();

        self.batch_depth = 1;
        let result = f(self);
        self.batch_depth = 0;

        let records = self.undo_stack.split_off(start.min(self.undo_stack.len()));
        if !records.is_empty() {
            let mut inverse_ops: Vec<Op> = Vec::new();
            for record in records.into_iter().rev() {
                inverse_ops.extend(record.inverse_ops);
            }
            tracing::trace!(source, ops = inverse_ops.len(), "merged undo step");
            self.undo_stack.push(UndoRecord {
                inverse_ops,
                selection_before,
                selection_after: self.selection.clone(),
            });
            self.trim_history();
        }

        result
    }

    pub fn run_command(
        &mut self,
        id: &str,
        args: Option<serde_json::Value>,
    ) -> Result<(), CommandError> {
        let Some(command) = self.registry.command(id) else {
            return Err(CommandError::new(format!("Unknown command: {id}")));
        };
        let source = format!("command:{id}");
        self.transact(&source, |editor| (command.handler)(editor, args))
    }

    pub fn run_query_json(&self, id: &str, args: Option<Value>) -> Result<Value, QueryError> {
        let Some(query) = self.registry.query(id) else {
            return Err(QueryError::new(format!("Unknown query: {id}")));
        };
        (query.handler)(self, args)
    }

    pub fn run_query<T>(&self, id: &str, args: Option<Value>) -> Result<T, QueryError>
    where
        T: DeserializeOwned,
    {
        let value = self.run_query_json(id, args)?;
        serde_json::from_value(value)
            .map_err(|err| QueryError::new(format!("Failed to decode query result: {err}")))
    }

    pub fn node_specs(&self) -> &HashMap<String, NodeSpec> {
        self.registry.node_specs()
    }

    pub fn commands(&self) -> &HashMap<String, CommandSpec> {
        self.registry.commands()
    }

    fn trim_history(&mut self) {
        let max = self.config.max_undo;
        if self.undo_stack.len() > max {
            let excess = self.undo_stack.len() - max;
            self.undo_stack.drain(..excess);
        }
    }

    fn rollback(&mut self, applied_inverse: Vec<Op>, selection_before: Selection) {
        for op in applied_inverse.into_iter().rev() {
            if let Err(err) = self.apply_op(op) {
                tracing::warn!(%err, "rollback stopped early");
                break;
            }
        }
        self.selection = selection_before;
        self.normalize_selection_in_place();
    }

    fn normalize_in_place(&mut self) {
        if let Err((err, _)) = self.normalize_with_inverse_ops() {
            tracing::warn!(%err, "normalization failed");
        }
        self.normalize_selection_in_place();
    }

    fn normalize_selection_in_place(&mut self) {
        self.selection = self
            .registry
            .normalize_selection(&self.doc, &self.selection);
    }

    /// Runs every pass against the document as left by the previous one,
    /// until a full round produces no ops.
    fn normalize_with_inverse_ops(&mut self) -> Result<Vec<Op>, (ApplyError, Vec<Op>)> {
        let mut inverse_ops: Vec<Op> = Vec::new();
        for _ in 0..self.config.max_normalize_iterations {
            let mut changed = false;
            for pass in self.registry.normalize_passes() {
                let ops = pass.run(&self.doc, &self.registry);
                if ops.is_empty() {
                    continue;
                }
                tracing::trace!(pass = pass.id(), ops = ops.len(), "normalize");
                changed = true;
                for op in ops {
                    match apply_op_to(&mut self.doc, &mut self.selection, op) {
                        Ok(inv) => inverse_ops.push(inv),
                        Err(err) => return Err((err, inverse_ops)),
                    }
                }
            }
            if !changed {
                return Ok(inverse_ops);
            }
        }
        Err((ApplyError::NormalizeDidNotConverge, inverse_ops))
    }

    fn apply_op(&mut self, op: Op) -> Result<Op, ApplyError> {
        apply_op_to(&mut self.doc, &mut self.selection, op)
    }
}

fn apply_op_to(doc: &mut Document, selection: &mut Selection, op: Op) -> Result<Op, ApplyError> {
    match op {
        Op::InsertText { path, offset, text } => {
            let text_node = node_text_mut(doc, &path)?;
            let offset = clamp_to_char_boundary(&text_node.text, offset);
            text_node.text.insert_str(offset, &text);
            transform_selection_insert_text(selection, &path, offset, text.len());
            Ok(Op::RemoveText {
                path,
                range: offset..offset + text.len(),
            })
        }
        Op::RemoveText { path, range } => {
            let text_node = node_text_mut(doc, &path)?;
            let start =
                clamp_to_char_boundary(&text_node.text, range.start.min(text_node.text.len()));
            let end = clamp_to_char_boundary(&text_node.text, range.end.min(text_node.text.len()));
            if start >= end {
                return Ok(Op::InsertText {
                    path,
                    offset: start,
                    text: String::new(),
                });
            }
            let removed = text_node.text[start..end].to_string();
            text_node.text.replace_range(start..end, "");
            transform_selection_remove_text(selection, &path, start..end);
            Ok(Op::InsertText {
                path,
                offset: start,
                text: removed,
            })
        }
        Op::InsertNode { path, node } => {
            insert_node(doc, &path, node)?;
            transform_selection_insert_node(selection, &path);
            Ok(Op::RemoveNode { path })
        }
        Op::RemoveNode { path } => {
            let removed = remove_node(doc, &path)?;
            transform_selection_remove_node(selection, &path);
            Ok(Op::InsertNode {
                path,
                node: removed,
            })
        }
        Op::SetNodeAttrs { path, patch } => {
            let Node::Element(el) = node_mut(doc, &path)? else {
                return Err(ApplyError::InvalidPath("Text has no attrs".into()));
            };
            let old = patch_apply(&mut el.attrs, &patch);
            Ok(Op::SetNodeAttrs { path, patch: old })
        }
        Op::SetNodeKind { path, kind } => {
            let Node::Element(el) = node_mut(doc, &path)? else {
                return Err(ApplyError::InvalidPath("Text has no kind".into()));
            };
            let old = std::mem::replace(&mut el.kind, kind);
            Ok(Op::SetNodeKind { path, kind: old })
        }
        Op::SetTextMarks { path, marks } => {
            let text_node = node_text_mut(doc, &path)?;
            let old = std::mem::replace(&mut text_node.marks, marks);
            Ok(Op::SetTextMarks { path, marks: old })
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("normalization did not converge")]
    NormalizeDidNotConverge,
}

impl From<PathError> for ApplyError {
    fn from(value: PathError) -> Self {
        ApplyError::InvalidPath(value.0)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct PathError(pub String);

pub(crate) fn clamp_to_char_boundary(s: &str, mut ix: usize) -> usize {
    ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}

fn transform_selection_insert_text(
    selection: &mut Selection,
    path: &[usize],
    offset: usize,
    len: usize,
) {
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path == path && point.offset >= offset {
            point.offset = point.offset.saturating_add(len);
        }
    }
}

fn transform_selection_remove_text(
    selection: &mut Selection,
    path: &[usize],
    range: std::ops::Range<usize>,
) {
    let removed_len = range.end.saturating_sub(range.start);
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path != path {
            continue;
        }
        if point.offset <= range.start {
            continue;
        }
        if point.offset >= range.end {
            point.offset = point.offset.saturating_sub(removed_len);
        } else {
            point.offset = range.start;
        }
    }
}

fn transform_selection_insert_node(selection: &mut Selection, path: &[usize]) {
    let Some((&index, parent_path)) = path.split_last() else {
        return;
    };

    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path.len() <= parent_path.len() || !point.path.starts_with(parent_path) {
            continue;
        }
        let depth = parent_path.len();
        if point.path[depth] >= index {
            point.path[depth] += 1;
        }
    }
}

/// Points inside a removed subtree land at the end of the previous sibling,
/// or at the start of whatever now occupies the removed index.
fn transform_selection_remove_node(selection: &mut Selection, path: &[usize]) {
    let Some((&index, parent_path)) = path.split_last() else {
        return;
    };

    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path.len() <= parent_path.len() || !point.path.starts_with(parent_path) {
            continue;
        }
        let depth = parent_path.len();
        let ix = point.path[depth];
        if ix > index {
            point.path[depth] = ix - 1;
            continue;
        }
        if ix < index {
            continue;
        }

        point.path.truncate(depth + 1);
        if index > 0 {
            point.path[depth] = index - 1;
            point.offset = END_OF_NODE;
        } else {
            point.offset = 0;
        }
    }
}

/// Offset sentinel resolved to the end of whatever text the point lands on.
pub(crate) const END_OF_NODE: usize = usize::MAX;

fn node_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut Node, PathError> {
    let Some((&first, rest)) = path.split_first() else {
        return Err(PathError("Empty path".into()));
    };

    let len = doc.children.len();
    let mut node = doc
        .children
        .get_mut(first)
        .ok_or_else(|| PathError(format!("Path out of bounds at depth 0: {first} >= {len}")))?;

    for (depth, &ix) in rest.iter().enumerate() {
        node = match node {
            Node::Element(el) => {
                let len = el.children.len();
                el.children.get_mut(ix).ok_or_else(|| {
                    PathError(format!(
                        "Path out of bounds at depth {}: {ix} >= {len}",
                        depth + 1
                    ))
                })?
            }
            Node::Text(_) => {
                return Err(PathError(format!("Non-container node at depth {depth}")));
            }
        };
    }

    Ok(node)
}

fn node_text_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut TextNode, PathError> {
    match node_mut(doc, path)? {
        Node::Text(t) => Ok(t),
        Node::Element(_) => Err(PathError("Expected Text node".into())),
    }
}

fn children_mut<'a>(
    doc: &'a mut Document,
    parent_path: &[usize],
) -> Result<&'a mut Vec<Node>, PathError> {
    if parent_path.is_empty() {
        return Ok(&mut doc.children);
    }
    match node_mut(doc, parent_path)? {
        Node::Element(el) => Ok(&mut el.children),
        Node::Text(_) => Err(PathError("Parent is not a container".into())),
    }
}

fn insert_node(doc: &mut Document, path: &[usize], node: Node) -> Result<(), PathError> {
    let Some((&index, parent_path)) = path.split_last() else {
        return Err(PathError("Empty insert path".into()));
    };

    let children = children_mut(doc, parent_path)?;
    if index > children.len() {
        return Err(PathError(format!(
            "Insert index out of bounds: {index} > {}",
            children.len()
        )));
    }
    children.insert(index, node);
    Ok(())
}

fn remove_node(doc: &mut Document, path: &[usize]) -> Result<Node, PathError> {
    let Some((&index, parent_path)) = path.split_last() else {
        return Err(PathError("Empty remove path".into()));
    };

    let children = children_mut(doc, parent_path)?;
    if index >= children.len() {
        return Err(PathError(format!(
            "Remove index out of bounds: {index} >= {}",
            children.len()
        )));
    }
    Ok(children.remove(index))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttrPatch {
    #[serde(default)]
    pub set: Attrs,
    #[serde(default)]
    pub remove: Vec<String>,
}

impl AttrPatch {
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(key.into(), value.into());
        self
    }

    pub fn remove(mut self, key: impl Into<String>) -> Self {
        self.remove.push(key.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty()
    }
}

fn patch_apply(attrs: &mut Attrs, patch: &AttrPatch) -> AttrPatch {
    let mut old_set: Attrs = Attrs::new();
    let mut old_remove: Vec<String> = Vec::new();

    for (k, v) in &patch.set {
        if let Some(prev) = attrs.insert(k.clone(), v.clone()) {
            old_set.insert(k.clone(), prev);
        } else {
            old_remove.push(k.clone());
        }
    }

    for key in &patch.remove {
        if let Some(prev) = attrs.remove(key) {
            old_set.insert(key.clone(), prev);
        }
    }

    AttrPatch {
        set: old_set,
        remove: old_remove,
    }
}

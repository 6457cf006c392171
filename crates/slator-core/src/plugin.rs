use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{
    ApplyError, Document, END_OF_NODE, Editor, ElementNode, Node, Point, Selection,
    clamp_to_char_boundary,
};
use crate::input::DataTransfer;
use crate::ops::Op;

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct CommandError {
    message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ApplyError> for CommandError {
    fn from(err: ApplyError) -> Self {
        CommandError::new(err.to_string())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct QueryError {
    message: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub type CommandHandler =
    Arc<dyn Fn(&mut Editor, Option<Value>) -> Result<(), CommandError> + Send + Sync>;

pub type QueryHandler = Arc<dyn Fn(&Editor, Option<Value>) -> Result<Value, QueryError> + Send + Sync>;

#[derive(Clone)]
pub struct CommandSpec {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub args_example: Option<Value>,
    pub handler: CommandHandler,
}

impl CommandSpec {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        handler: impl Fn(&mut Editor, Option<Value>) -> Result<(), CommandError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            keywords: Vec::new(),
            args_example: None,
            handler: Arc::new(handler),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn args_example(mut self, args_example: Value) -> Self {
        self.args_example = Some(args_example);
        self
    }
}

#[derive(Clone)]
pub struct QuerySpec {
    pub id: String,
    pub handler: QueryHandler,
}

impl QuerySpec {
    pub fn new(
        id: impl Into<String>,
        handler: impl Fn(&Editor, Option<Value>) -> Result<Value, QueryError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            handler: Arc::new(handler),
        }
    }
}

/// Reads a required string argument from command/query args.
pub fn arg_str<'a>(args: Option<&'a Value>, key: &str) -> Option<&'a str> {
    args.and_then(|v| v.get(key)).and_then(|v| v.as_str())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    Block,
    Inline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildConstraint {
    None,
    BlockOnly,
    InlineOnly,
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub kind: String,
    pub role: NodeRole,
    pub is_void: bool,
    pub children: ChildConstraint,
}

impl NodeSpec {
    /// A block holding inline content.
    pub fn text_block(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            role: NodeRole::Block,
            is_void: false,
            children: ChildConstraint::InlineOnly,
        }
    }

    pub fn container(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            role: NodeRole::Block,
            is_void: false,
            children: ChildConstraint::BlockOnly,
        }
    }

    pub fn void_block(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            role: NodeRole::Block,
            is_void: true,
            children: ChildConstraint::None,
        }
    }

    pub fn inline(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            role: NodeRole::Inline,
            is_void: false,
            children: ChildConstraint::InlineOnly,
        }
    }
}

pub trait NormalizePass: Send + Sync {
    fn id(&self) -> &'static str;
    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    Handled,
    PassThrough,
}

/// A link in the input chain. Handlers run in registration order and the
/// first one reporting [`InputOutcome::Handled`] stops the chain; when none
/// does, the editor's default behavior runs.
pub trait InputHandler: Send + Sync {
    fn id(&self) -> &'static str;

    fn try_handle_insert_text(
        &self,
        _editor: &mut Editor,
        _text: &str,
    ) -> Result<InputOutcome, ApplyError> {
        Ok(InputOutcome::PassThrough)
    }

    fn try_handle_insert_break(&self, _editor: &mut Editor) -> Result<InputOutcome, ApplyError> {
        Ok(InputOutcome::PassThrough)
    }

    fn try_handle_delete_backward(
        &self,
        _editor: &mut Editor,
    ) -> Result<InputOutcome, ApplyError> {
        Ok(InputOutcome::PassThrough)
    }

    fn try_handle_insert_data(
        &self,
        _editor: &mut Editor,
        _data: &DataTransfer,
    ) -> Result<InputOutcome, ApplyError> {
        Ok(InputOutcome::PassThrough)
    }
}

pub trait EditorPlugin: Send + Sync {
    fn id(&self) -> &'static str;
    fn node_specs(&self) -> Vec<NodeSpec> {
        Vec::new()
    }
    fn input_handlers(&self) -> Vec<Arc<dyn InputHandler>> {
        Vec::new()
    }
    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        Vec::new()
    }
    fn commands(&self) -> Vec<CommandSpec> {
        Vec::new()
    }
    fn queries(&self) -> Vec<QuerySpec> {
        Vec::new()
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate node spec kind: {0}")]
    DuplicateNodeSpec(String),
    #[error("duplicate command id: {0}")]
    DuplicateCommand(String),
    #[error("duplicate query id: {0}")]
    DuplicateQuery(String),
}

#[derive(Default)]
pub struct PluginRegistry {
    node_specs: HashMap<String, NodeSpec>,
    input_handlers: Vec<Arc<dyn InputHandler>>,
    normalize_passes: Vec<Box<dyn NormalizePass>>,
    commands: HashMap<String, CommandSpec>,
    queries: HashMap<String, QuerySpec>,
}

impl PluginRegistry {
    pub fn new(
        plugins: impl IntoIterator<Item = Box<dyn EditorPlugin>>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for plugin in plugins {
            registry.register_plugin(plugin)?;
        }
        Ok(registry)
    }

    fn core_plugins() -> Vec<Box<dyn EditorPlugin>> {
        vec![
            Box::new(crate::normalize::CoreParagraphPlugin),
            Box::new(crate::normalize::CoreNormalizePlugin),
        ]
    }

    pub fn core() -> Self {
        let mut registry = Self::default();
        registry.register_all(Self::core_plugins());
        registry
    }

    /// Core plus every block, inline and markdown behavior. The markdown
    /// shortcuts come last so the handlers before them see input first.
    pub fn richtext() -> Self {
        let mut plugins = Self::core_plugins();
        plugins.extend([
            Box::new(crate::blocks::HeadingPlugin) as Box<dyn EditorPlugin>,
            Box::new(crate::blocks::BlockQuotePlugin),
            Box::new(crate::blocks::DividerPlugin),
            Box::new(crate::blocks::BlockCommandsPlugin),
            Box::new(crate::code_block::CodeBlockPlugin),
            Box::new(crate::lists::ListPlugin),
            Box::new(crate::lists::CheckListPlugin),
            Box::new(crate::marks::MarksPlugin),
            Box::new(crate::image::ImagePlugin),
            Box::new(crate::links::LinksPlugin),
            Box::new(crate::markdown::MarkdownShortcutsPlugin),
        ]);
        let mut registry = Self::default();
        registry.register_all(plugins);
        registry
    }

    fn register_all(&mut self, plugins: Vec<Box<dyn EditorPlugin>>) {
        for plugin in plugins {
            let id = plugin.id();
            if let Err(err) = self.register_plugin(plugin) {
                tracing::error!(plugin = id, %err, "built-in plugin rejected");
            }
        }
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn EditorPlugin>) -> Result<(), RegistryError> {
        for spec in plugin.node_specs() {
            if self.node_specs.contains_key(&spec.kind) {
                return Err(RegistryError::DuplicateNodeSpec(spec.kind));
            }
            self.node_specs.insert(spec.kind.clone(), spec);
        }

        self.input_handlers.extend(plugin.input_handlers());
        self.normalize_passes.extend(plugin.normalize_passes());

        for cmd in plugin.commands() {
            if self.commands.contains_key(&cmd.id) {
                return Err(RegistryError::DuplicateCommand(cmd.id));
            }
            self.commands.insert(cmd.id.clone(), cmd);
        }

        for query in plugin.queries() {
            if self.queries.contains_key(&query.id) {
                return Err(RegistryError::DuplicateQuery(query.id));
            }
            self.queries.insert(query.id.clone(), query);
        }

        tracing::debug!(plugin = plugin.id(), "registered plugin");
        Ok(())
    }

    pub fn node_specs(&self) -> &HashMap<String, NodeSpec> {
        &self.node_specs
    }

    pub fn input_handlers(&self) -> &[Arc<dyn InputHandler>] {
        &self.input_handlers
    }

    pub fn normalize_passes(&self) -> &[Box<dyn NormalizePass>] {
        &self.normalize_passes
    }

    pub fn commands(&self) -> &HashMap<String, CommandSpec> {
        &self.commands
    }

    pub fn command(&self, id: &str) -> Option<CommandSpec> {
        self.commands.get(id).cloned()
    }

    pub fn queries(&self) -> &HashMap<String, QuerySpec> {
        &self.queries
    }

    pub fn query(&self, id: &str) -> Option<QuerySpec> {
        self.queries.get(id).cloned()
    }

    pub fn is_known_kind(&self, kind: &str) -> bool {
        self.node_specs.contains_key(kind)
    }

    pub fn is_void(&self, kind: &str) -> bool {
        self.node_specs.get(kind).is_some_and(|s| s.is_void)
    }

    pub fn is_inline(&self, kind: &str) -> bool {
        self.node_specs
            .get(kind)
            .is_some_and(|s| s.role == NodeRole::Inline)
    }

    pub fn child_constraint(&self, el: &ElementNode) -> ChildConstraint {
        self.node_specs
            .get(&el.kind)
            .map(|s| s.children.clone())
            .unwrap_or_else(|| {
                if el.children.iter().any(|n| matches!(n, Node::Text(_))) {
                    ChildConstraint::InlineOnly
                } else {
                    ChildConstraint::Any
                }
            })
    }

    /// A non-void block whose children are text and inline elements.
    pub fn is_text_block(&self, el: &ElementNode) -> bool {
        !self.is_inline(&el.kind)
            && !self.is_void(&el.kind)
            && self.child_constraint(el) == ChildConstraint::InlineOnly
    }

    /// A block the cursor can sit in: a text block or a void block.
    pub fn is_leaf_block(&self, el: &ElementNode) -> bool {
        self.is_text_block(el) || (self.is_void(&el.kind) && !self.is_inline(&el.kind))
    }

    pub fn normalize_selection(&self, doc: &Document, selection: &Selection) -> Selection {
        let fallback = first_text_point(doc).unwrap_or(Point {
            path: vec![0],
            offset: 0,
        });

        let anchor =
            normalize_point_to_existing_text(doc, &selection.anchor).unwrap_or_else(|| {
                normalize_point_to_existing_text(doc, &selection.focus)
                    .unwrap_or_else(|| fallback.clone())
            });
        let focus = normalize_point_to_existing_text(doc, &selection.focus)
            .unwrap_or_else(|| anchor.clone());

        Selection { anchor, focus }
    }
}

fn first_text_point(doc: &Document) -> Option<Point> {
    text_descendant(&doc.children, &mut Vec::new(), false)
}

/// First (or last) text leaf below `children`, with the point at its start
/// (or end).
fn text_descendant(children: &[Node], path: &mut Vec<usize>, last: bool) -> Option<Point> {
    let order: Box<dyn Iterator<Item = (usize, &Node)>> = if last {
        Box::new(children.iter().enumerate().rev())
    } else {
        Box::new(children.iter().enumerate())
    };

    for (ix, node) in order {
        path.push(ix);
        match node {
            Node::Text(t) => {
                let point = Point {
                    path: path.clone(),
                    offset: if last { t.text.len() } else { 0 },
                };
                path.pop();
                return Some(point);
            }
            Node::Element(el) => {
                if let Some(point) = text_descendant(&el.children, path, last) {
                    path.pop();
                    return Some(point);
                }
            }
        }
        path.pop();
    }
    None
}

fn normalize_point_to_existing_text(doc: &Document, point: &Point) -> Option<Point> {
    if point.path.is_empty() || doc.children.is_empty() {
        return None;
    }

    let mut resolved_path: Vec<usize> = Vec::new();
    let mut children: &[Node] = &doc.children;

    for &wanted in &point.path {
        if children.is_empty() {
            break;
        }
        let ix = wanted.min(children.len() - 1);
        resolved_path.push(ix);
        match &children[ix] {
            Node::Text(t) => {
                return Some(Point {
                    path: resolved_path,
                    offset: clamp_to_char_boundary(&t.text, point.offset),
                });
            }
            Node::Element(el) => {
                children = &el.children;
            }
        }
    }

    match doc.node(&resolved_path)? {
        Node::Text(t) => Some(Point {
            path: resolved_path,
            offset: clamp_to_char_boundary(&t.text, point.offset),
        }),
        Node::Element(el) => {
            text_descendant(&el.children, &mut resolved_path, point.offset == END_OF_NODE)
        }
    }
}

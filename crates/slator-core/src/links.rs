use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;

use crate::core::{ApplyError, Attrs, Editor, ElementNode, Node, kinds};
use crate::input::DataTransfer;
use crate::ops::Path;
use crate::plugin::{CommandError, CommandSpec, EditorPlugin, InputHandler, InputOutcome, NodeSpec, QuerySpec, arg_str};
use crate::transforms;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\w+:)?//([^\s.]+\.\S{2}|localhost[:?\d]*)\S*$").expect("Invalid URL regex")
});

/// Whether `text` is a single absolute or protocol-relative url.
pub fn is_url(text: &str) -> bool {
    URL_RE.is_match(text)
}

pub fn link_attrs(url: &str, title: Option<&str>) -> Attrs {
    let mut attrs = Attrs::default();
    attrs.insert("url".to_string(), Value::String(url.to_string()));
    if let Some(title) = title.filter(|t| !t.is_empty()) {
        attrs.insert("title".to_string(), Value::String(title.to_string()));
    }
    attrs
}

/// An inline link whose single text child is `text`.
pub fn link_node(url: &str, title: Option<&str>, text: &str) -> Node {
    Node::Element(ElementNode {
        kind: kinds::LINK.to_string(),
        attrs: link_attrs(url, title),
        children: vec![Node::text(text)],
    })
}

/// Path of the link enclosing the focus, if any.
pub fn active_link(editor: &Editor) -> Option<Path> {
    let focus = &editor.selection().focus.path;
    (1..focus.len()).rev().find_map(|len| {
        let el = editor.doc().element(&focus[..len])?;
        (el.kind == kinds::LINK).then(|| focus[..len].to_vec())
    })
}

pub fn unwrap_link(editor: &mut Editor) -> Result<(), ApplyError> {
    match active_link(editor) {
        Some(path) => transforms::unwrap_inline(editor, &path),
        None => Ok(()),
    }
}

/// Links the selection to `url`. A collapsed cursor gets a new link showing
/// `text`, or the url itself.
pub fn wrap_link(editor: &mut Editor, url: &str, text: Option<&str>) -> Result<(), ApplyError> {
    unwrap_link(editor)?;
    let selection = editor.selection().clone();
    if selection.is_collapsed() {
        transforms::insert_inline_node(editor, link_node(url, None, text.unwrap_or(url)))
    } else {
        let wrapper = ElementNode {
            kind: kinds::LINK.to_string(),
            attrs: link_attrs(url, None),
            children: Vec::new(),
        };
        transforms::wrap_inline(editor, &selection, wrapper)
    }
}

/// A whole url typed or pasted at once becomes a link.
struct UrlToLink;

impl InputHandler for UrlToLink {
    fn id(&self) -> &'static str {
        "links.url"
    }

    fn try_handle_insert_text(
        &self,
        editor: &mut Editor,
        text: &str,
    ) -> Result<InputOutcome, ApplyError> {
        if !is_url(text) {
            return Ok(InputOutcome::PassThrough);
        }
        wrap_link(editor, text, None)?;
        Ok(InputOutcome::Handled)
    }

    fn try_handle_insert_data(
        &self,
        editor: &mut Editor,
        data: &DataTransfer,
    ) -> Result<InputOutcome, ApplyError> {
        match data.text_only().map(str::trim) {
            Some(text) if is_url(text) => {
                wrap_link(editor, text, None)?;
                Ok(InputOutcome::Handled)
            }
            _ => Ok(InputOutcome::PassThrough),
        }
    }
}

pub(crate) struct LinksPlugin;

impl EditorPlugin for LinksPlugin {
    fn id(&self) -> &'static str {
        "links"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::inline(kinds::LINK)]
    }

    fn input_handlers(&self) -> Vec<Arc<dyn InputHandler>> {
        vec![Arc::new(UrlToLink)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("link.insert", "Insert link", |editor, args| {
                let args = args.as_ref();
                let url = arg_str(args, "url").ok_or_else(|| CommandError::new("Missing args.url"))?;
                wrap_link(editor, url, arg_str(args, "text")).map_err(Into::into)
            })
            .description("Link the selection to args.url, or insert args.text as a link.")
            .keywords(["link", "url", "href"])
            .args_example(serde_json::json!({ "url": "https://example.com", "text": "example" })),
            CommandSpec::new("link.unwrap", "Remove link", |editor, _args| {
                unwrap_link(editor).map_err(Into::into)
            })
            .description("Remove the link around the cursor, keeping its text.")
            .keywords(["unlink"]),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![
            QuerySpec::new("link.is_active", |editor, _args| {
                Ok(Value::Bool(active_link(editor).is_some()))
            }),
            QuerySpec::new("link.url", |editor, _args| {
                Ok(active_link(editor)
                    .and_then(|path| editor.doc().element(&path))
                    .and_then(|el| el.attr_str("url"))
                    .map_or(Value::Null, |url| Value::String(url.to_string())))
            }),
        ]
    }
}

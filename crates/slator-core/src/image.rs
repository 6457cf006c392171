//! Image blocks.
//!
//! An image is a void block whose attributes carry a stable `id`, and either
//! a remote `url` or a `file` reference to bytes held by the host until an
//! upload resolves. Everything that touches an image across time looks it up
//! by id, never by a remembered path.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{ApplyError, AttrPatch, Attrs, Document, Editor, ElementNode, Node, kinds};
use crate::input::DataTransfer;
use crate::links::is_url;
use crate::ops::{Op, Path, Transaction};
use crate::plugin::{
    CommandError, CommandSpec, EditorPlugin, InputHandler, InputOutcome, NodeSpec, QueryError,
    QuerySpec, arg_str,
};
use crate::transforms;

/// Reference to a locally held file. `key` addresses the bytes in the host's
/// file store; the document only ever carries this reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub key: String,
    pub name: String,
    pub mime: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ImageAttrs {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileRef>,
    #[serde(default)]
    pub alt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ImageAttrs {
    pub fn new_id() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            id: Self::new_id(),
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn from_file(file: FileRef) -> Self {
        Self {
            id: Self::new_id(),
            file: Some(file),
            ..Self::default()
        }
    }

    pub fn alt(mut self, alt: impl Into<String>) -> Self {
        self.alt = alt.into();
        self
    }

    pub fn title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    /// Reads the attributes of an image element. `None` for other kinds or
    /// attributes that do not describe an image.
    pub fn from_element(el: &ElementNode) -> Option<Self> {
        if el.kind != kinds::IMAGE {
            return None;
        }
        let map: serde_json::Map<String, Value> =
            el.attrs.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        serde_json::from_value(Value::Object(map)).ok()
    }

    pub fn to_attrs(&self) -> Attrs {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map.into_iter().collect(),
            _ => Attrs::default(),
        }
    }

    pub fn into_node(self) -> Node {
        Node::void(kinds::IMAGE, self.to_attrs())
    }

    /// Waiting on an upload: a local file and no remote url yet.
    pub fn is_pending(&self) -> bool {
        self.file.is_some() && self.url.is_none()
    }
}

/// Path of the image with the given id.
pub fn find_image(doc: &Document, id: &str) -> Option<Path> {
    doc.find_element(|el| el.kind == kinds::IMAGE && el.attr_str("id") == Some(id))
}

/// Every image in document order.
pub fn images(doc: &Document) -> Vec<(Path, ImageAttrs)> {
    doc.elements()
        .into_iter()
        .filter_map(|(path, el)| ImageAttrs::from_element(el).map(|attrs| (path, attrs)))
        .collect()
}

/// A url whose path names an image file.
pub fn is_image_url(text: &str) -> bool {
    if !is_url(text) {
        return false;
    }
    let after_scheme = text.split_once("//").map_or(text, |(_, rest)| rest);
    let path = after_scheme
        .find('/')
        .map_or("", |ix| &after_scheme[ix..]);
    let path = path.split(['?', '#']).next().unwrap_or_default();
    mime_guess::from_path(path)
        .first()
        .is_some_and(|mime| mime.type_() == mime_guess::mime::IMAGE)
}

/// Inserts an image block at the cursor. The cursor moves to the block after
/// it.
pub fn insert_image(editor: &mut Editor, attrs: ImageAttrs) -> Result<Path, ApplyError> {
    tracing::debug!(id = %attrs.id, pending = attrs.is_pending(), "inserting image");
    transforms::insert_block_node(editor, attrs.into_node())
}

/// Patches the attributes of the image `id`, resolving its path right before
/// the mutation. Returns `false` when the image is gone. Without
/// `record_history` the change stays out of undo.
pub fn patch_image(
    editor: &mut Editor,
    id: &str,
    patch: AttrPatch,
    record_history: bool,
) -> Result<bool, ApplyError> {
    let Some(path) = find_image(editor.doc(), id) else {
        tracing::debug!(id, "image no longer in the document; patch skipped");
        return Ok(false);
    };
    if patch.is_empty() {
        return Ok(true);
    }
    let tx = Transaction::new(vec![Op::SetNodeAttrs { path, patch }]).source("image:patch");
    if record_history {
        editor.apply(tx)?;
    } else {
        editor.apply_without_history(tx)?;
    }
    Ok(true)
}

/// Sets the caption of the image `id` as a regular, undoable edit.
pub fn set_image_alt(editor: &mut Editor, id: &str, alt: &str) -> Result<bool, ApplyError> {
    patch_image(editor, id, AttrPatch::default().set("alt", alt), true)
}

struct ImageUrlPaste;

impl InputHandler for ImageUrlPaste {
    fn id(&self) -> &'static str {
        "image.paste_url"
    }

    fn try_handle_insert_data(
        &self,
        editor: &mut Editor,
        data: &DataTransfer,
    ) -> Result<InputOutcome, ApplyError> {
        let Some(text) = data.text_only().map(str::trim) else {
            return Ok(InputOutcome::PassThrough);
        };
        if !is_image_url(text) {
            return Ok(InputOutcome::PassThrough);
        }
        insert_image(editor, ImageAttrs::from_url(text))?;
        Ok(InputOutcome::Handled)
    }
}

pub(crate) struct ImagePlugin;

impl EditorPlugin for ImagePlugin {
    fn id(&self) -> &'static str {
        "image"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::void_block(kinds::IMAGE)]
    }

    fn input_handlers(&self) -> Vec<Arc<dyn InputHandler>> {
        vec![Arc::new(ImageUrlPaste)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("image.insert_url", "Insert image", |editor, args| {
                let args = args.as_ref();
                let url = arg_str(args, "url").ok_or_else(|| CommandError::new("Missing args.url"))?;
                let attrs = ImageAttrs::from_url(url)
                    .alt(arg_str(args, "alt").unwrap_or_default())
                    .title(arg_str(args, "title").map(str::to_string));
                insert_image(editor, attrs)
                    .map(|_| ())
                    .map_err(|e| CommandError::new(format!("Failed to insert image: {e}")))
            })
            .description("Insert an image block from args.url at the cursor.")
            .keywords(["image", "picture", "photo"])
            .args_example(serde_json::json!({ "url": "https://example.com/a.png", "alt": "" })),
            CommandSpec::new("image.set_alt", "Set image caption", |editor, args| {
                let args = args.as_ref();
                let id = arg_str(args, "id").ok_or_else(|| CommandError::new("Missing args.id"))?;
                let alt = arg_str(args, "alt").unwrap_or_default();
                match set_image_alt(editor, id, alt)? {
                    true => Ok(()),
                    false => Err(CommandError::new(format!("No image with id {id}"))),
                }
            })
            .description("Set the caption of the image args.id.")
            .args_example(serde_json::json!({ "id": "", "alt": "caption" })),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![
            QuerySpec::new("image.list", |editor, _args| {
                let list: Vec<ImageAttrs> =
                    images(editor.doc()).into_iter().map(|(_, attrs)| attrs).collect();
                serde_json::to_value(list)
                    .map_err(|e| QueryError::new(format!("Failed to encode images: {e}")))
            }),
            QuerySpec::new("image.find", |editor, args| {
                let id = arg_str(args.as_ref(), "id")
                    .ok_or_else(|| QueryError::new("Missing args.id"))?;
                Ok(find_image(editor.doc(), id)
                    .map(|path| serde_json::json!(path))
                    .unwrap_or(Value::Null))
            }),
        ]
    }
}

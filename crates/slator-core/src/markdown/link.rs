use std::sync::LazyLock;

use regex::Regex;

use crate::core::{ApplyError, Editor, ElementNode, Node, Selection};
use crate::image::{ImageAttrs, insert_image};
use crate::links::link_node;
use crate::ops::Transaction;
use crate::plugin::{InputHandler, InputOutcome};
use crate::range::{self, Affinity};
use crate::transforms;

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"!?\[([^\]]+)\]\((\S+)(\s.+)?\)$"#).expect("Invalid link regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMatch {
    pub is_image: bool,
    pub caption: String,
    pub url: String,
    pub title: Option<String>,
    /// Byte offset of the match within the text it was matched against.
    pub start: usize,
}

fn clean_title(raw: &str) -> Option<String> {
    let title = raw.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| title.strip_prefix(*q).and_then(|t| t.strip_suffix(*q)))
        .unwrap_or(title);
    (!unquoted.is_empty()).then(|| unquoted.to_string())
}

/// Matches a markdown link or image closed by the `)` about to be typed.
pub fn match_link(before: &str) -> Option<LinkMatch> {
    let candidate = format!("{before})");
    let captures = LINK_RE.captures(&candidate)?;
    let full = captures.get(0)?;
    Some(LinkMatch {
        is_image: full.as_str().starts_with('!'),
        caption: captures.get(1)?.as_str().to_string(),
        url: captures.get(2)?.as_str().to_string(),
        title: captures.get(3).and_then(|m| clean_title(m.as_str())),
        start: full.start(),
    })
}

/// Replaces the matched span ending at the cursor with a link or an image.
/// `span_start` is the block offset of the span's first byte.
pub fn apply_link(editor: &mut Editor, found: LinkMatch, span_start: usize) -> Result<(), ApplyError> {
    let Some((block, offset)) = range::cursor_block_offset(editor) else {
        return Ok(());
    };

    if found.is_image {
        let start = {
            let leaves = range::block_leaves(editor.doc(), &block);
            range::offset_to_point(&leaves, span_start, Affinity::Forward)
        };
        if let Some(start) = start {
            let span = Selection::new(start, editor.selection().focus.clone());
            transforms::delete_range(editor, &span)?;
        }
        let attrs = ImageAttrs::from_url(found.url)
            .alt(found.caption)
            .title(found.title);
        insert_image(editor, attrs)?;
        return Ok(());
    }

    let Some(el) = editor.doc().element(&block).cloned() else {
        return Ok(());
    };
    let (mut children, _) = transforms::split_children(&el.children, span_start);
    let (_, right) = transforms::split_children(&el.children, offset);
    children.push(link_node(&found.url, found.title.as_deref(), &found.caption));
    children.extend(right);

    editor.apply(
        Transaction::new(transforms::replace_node_ops(
            &block,
            Node::Element(ElementNode { children, ..el }),
        ))
        .source("markdown:link"),
    )?;
    transforms::select_offset(
        editor,
        &block,
        span_start + found.caption.len(),
        Affinity::Forward,
    );
    Ok(())
}

pub(super) struct LinkMatcher;

impl InputHandler for LinkMatcher {
    fn id(&self) -> &'static str {
        "markdown.link"
    }

    fn try_handle_insert_text(
        &self,
        editor: &mut Editor,
        text: &str,
    ) -> Result<InputOutcome, ApplyError> {
        if text != ")" {
            return Ok(InputOutcome::PassThrough);
        }
        let Some(before) = range::text_before_cursor(editor) else {
            return Ok(InputOutcome::PassThrough);
        };
        let Some(found) = match_link(&before) else {
            return Ok(InputOutcome::PassThrough);
        };
        let Some((_, offset)) = range::cursor_block_offset(editor) else {
            return Ok(InputOutcome::PassThrough);
        };
        // `before` may be truncated on the left; it always ends at the cursor.
        let span_start = offset - before.len() + found.start;

        tracing::debug!(url = %found.url, image = found.is_image, "markdown link");
        apply_link(editor, found, span_start)?;
        Ok(InputOutcome::Handled)
    }
}

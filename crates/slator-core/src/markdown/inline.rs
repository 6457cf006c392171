use std::sync::LazyLock;

use regex::Regex;

use crate::core::{ApplyError, Editor, MarkKind};
use crate::plugin::{InputHandler, InputOutcome};
use crate::range;
use crate::transforms;

struct DelimiterRule {
    trigger: &'static str,
    mark: MarkKind,
    /// Opening delimiter length.
    left: usize,
    /// Closing characters already in the document when the trigger arrives.
    right: usize,
    pattern: Regex,
}

impl DelimiterRule {
    fn new(trigger: &'static str, mark: MarkKind, left: usize, right: usize, pattern: &str) -> Self {
        Self {
            trigger,
            mark,
            left,
            right,
            pattern: Regex::new(pattern).expect("Invalid delimiter regex"),
        }
    }
}

static RULES: LazyLock<Vec<DelimiterRule>> = LazyLock::new(|| {
    vec![
        DelimiterRule::new("`", MarkKind::Code, 1, 0, r"`([^`]+)`$"),
        DelimiterRule::new("_", MarkKind::Italic, 2, 1, r"__([^_]+)__$"),
        DelimiterRule::new("*", MarkKind::Bold, 2, 1, r"\*\*([^*]+)\*\*$"),
        DelimiterRule::new("~", MarkKind::Strikethrough, 2, 1, r"~~([^~]+)~~$"),
    ]
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelimiterMatch {
    pub mark: MarkKind,
    pub left: usize,
    pub right: usize,
    /// Length of the enclosed text, in characters.
    pub content_chars: usize,
}

/// Matches `before` followed by the typed `trigger` against the closed
/// delimiter runs.
pub fn match_delimiter(before: &str, trigger: &str) -> Option<DelimiterMatch> {
    let rule = RULES.iter().find(|rule| rule.trigger == trigger)?;
    let candidate = format!("{before}{trigger}");
    let content = rule.pattern.captures(&candidate)?.get(1)?;
    Some(DelimiterMatch {
        mark: rule.mark,
        left: rule.left,
        right: rule.right,
        content_chars: content.as_str().chars().count(),
    })
}

/// Removes the delimiters of a matched run around the cursor and marks the
/// enclosed text. The cursor ends right after it.
pub fn apply_delimiter(editor: &mut Editor, found: DelimiterMatch) -> Result<(), ApplyError> {
    let content = found.content_chars as isize;

    transforms::delete_backward_chars(editor, found.right)?;
    transforms::move_cursor(editor, -content);
    transforms::delete_backward_chars(editor, found.left)?;
    transforms::extend_focus(editor, content);

    let range = range::unhang_range(editor.doc(), editor.registry(), editor.selection());
    let mark = found.mark;
    transforms::set_marks_on_range(editor, &range, &|mut marks| {
        marks.set(mark, true);
        marks.markdown.insert(mark);
        marks
    })?;
    transforms::collapse_to_focus(editor);
    Ok(())
}

pub(super) struct InlineDelimiters;

impl InputHandler for InlineDelimiters {
    fn id(&self) -> &'static str {
        "markdown.inline_delimiters"
    }

    fn try_handle_insert_text(
        &self,
        editor: &mut Editor,
        text: &str,
    ) -> Result<InputOutcome, ApplyError> {
        let Some(before) = range::text_before_cursor(editor) else {
            return Ok(InputOutcome::PassThrough);
        };
        let Some(found) = match_delimiter(&before, text) else {
            return Ok(InputOutcome::PassThrough);
        };
        tracing::debug!(mark = found.mark.as_str(), chars = found.content_chars, "closing delimiter run");
        apply_delimiter(editor, found)?;
        Ok(InputOutcome::Handled)
    }
}

/// Text typed right after a closed delimiter run drops the marks the run
/// applied.
pub(super) struct MarkdownRunEnd;

impl InputHandler for MarkdownRunEnd {
    fn id(&self) -> &'static str {
        "markdown.run_end"
    }

    fn try_handle_insert_text(
        &self,
        editor: &mut Editor,
        text: &str,
    ) -> Result<InputOutcome, ApplyError> {
        let selection = editor.selection();
        if !selection.is_collapsed() || editor.pending_marks().is_some() {
            return Ok(InputOutcome::PassThrough);
        }
        let Some(leaf) = editor.doc().text(&selection.focus.path) else {
            return Ok(InputOutcome::PassThrough);
        };
        if leaf.marks.markdown.is_empty() || selection.focus.offset < leaf.text.len() {
            return Ok(InputOutcome::PassThrough);
        }
        let marks = leaf.marks.after_markdown_run();
        transforms::insert_text_with_marks(editor, text, Some(marks))?;
        Ok(InputOutcome::Handled)
    }
}

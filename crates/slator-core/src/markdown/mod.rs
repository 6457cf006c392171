//! Markdown shortcuts applied while typing.
//!
//! Three engines look at the text between the start of the cursor's block
//! and the cursor whenever a trigger character arrives:
//!
//! * block prefixes (`# `, `> `, `1. `, ...) retype the block on a space;
//! * `[caption](url "title")` and `![alt](url)` become a link or an image on `)`;
//! * closed delimiter runs (`` `code` ``, `__italic__`, `**bold**`,
//!   `~~strike~~`) turn into marked text on their last delimiter.
//!
//! A trigger that does not complete a pattern is inserted as plain text.

mod block;
mod inline;
mod link;

use std::sync::Arc;

pub use block::{BlockShortcut, apply_block_shortcut, block_shortcut};
pub use inline::{DelimiterMatch, apply_delimiter, match_delimiter};
pub use link::{LinkMatch, apply_link, match_link};

use crate::plugin::{EditorPlugin, InputHandler};

pub(crate) struct MarkdownShortcutsPlugin;

impl EditorPlugin for MarkdownShortcutsPlugin {
    fn id(&self) -> &'static str {
        "markdown"
    }

    fn input_handlers(&self) -> Vec<Arc<dyn InputHandler>> {
        vec![
            Arc::new(block::BlockShortcuts),
            Arc::new(link::LinkMatcher),
            Arc::new(inline::InlineDelimiters),
            Arc::new(inline::MarkdownRunEnd),
        ]
    }
}

use std::sync::Arc;

use crate::core::{ApplyError, Editor};
use crate::plugin::{InputHandler, InputOutcome};
use crate::transforms;

/// A file handed to the editor by a paste or drop.
#[derive(Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub name: String,
    /// Full mime type, e.g. `image/png`. Empty when the host could not tell.
    pub mime: String,
    pub bytes: Arc<[u8]>,
}

impl LocalFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl std::fmt::Debug for LocalFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFile")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Clipboard or drag payload.
#[derive(Debug, Clone, Default)]
pub struct DataTransfer {
    pub text: Option<String>,
    pub files: Vec<LocalFile>,
}

impl DataTransfer {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            files: Vec::new(),
        }
    }

    pub fn files(files: Vec<LocalFile>) -> Self {
        Self { text: None, files }
    }

    /// The plain text, when present and the payload carries no files.
    pub fn text_only(&self) -> Option<&str> {
        if !self.files.is_empty() {
            return None;
        }
        self.text.as_deref().filter(|text| !text.is_empty())
    }
}

#[derive(Clone, Copy)]
enum InputEvent<'a> {
    InsertText(&'a str),
    InsertBreak,
    DeleteBackward,
    InsertData(&'a DataTransfer),
}

impl InputEvent<'_> {
    fn source(&self) -> &'static str {
        match self {
            InputEvent::InsertText(_) => "input:insert_text",
            InputEvent::InsertBreak => "input:insert_break",
            InputEvent::DeleteBackward => "input:delete_backward",
            InputEvent::InsertData(_) => "input:insert_data",
        }
    }

    fn offer(
        self,
        handler: &dyn InputHandler,
        editor: &mut Editor,
    ) -> Result<InputOutcome, ApplyError> {
        match self {
            InputEvent::InsertText(text) => handler.try_handle_insert_text(editor, text),
            InputEvent::InsertBreak => handler.try_handle_insert_break(editor),
            InputEvent::DeleteBackward => handler.try_handle_delete_backward(editor),
            InputEvent::InsertData(data) => handler.try_handle_insert_data(editor, data),
        }
    }
}

impl Editor {
    pub fn insert_text(&mut self, text: &str) -> Result<(), ApplyError> {
        self.dispatch(InputEvent::InsertText(text))
    }

    pub fn insert_break(&mut self) -> Result<(), ApplyError> {
        self.dispatch(InputEvent::InsertBreak)
    }

    pub fn delete_backward(&mut self) -> Result<(), ApplyError> {
        self.dispatch(InputEvent::DeleteBackward)
    }

    pub fn insert_data(&mut self, data: &DataTransfer) -> Result<(), ApplyError> {
        self.dispatch(InputEvent::InsertData(data))
    }

    /// Types `text` one character at a time, as keystrokes would arrive.
    pub fn type_text(&mut self, text: &str) -> Result<(), ApplyError> {
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            match ch {
                '\n' => self.insert_break()?,
                ch => self.insert_text(ch.encode_utf8(&mut buf))?,
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, event: InputEvent<'_>) -> Result<(), ApplyError> {
        let handlers: Vec<Arc<dyn InputHandler>> = self.registry().input_handlers().to_vec();
        self.transact(event.source(), |editor| {
            for handler in &handlers {
                if event.offer(handler.as_ref(), editor)? == InputOutcome::Handled {
                    tracing::debug!(handler = handler.id(), source = event.source(), "input handled");
                    return Ok(());
                }
            }
            editor.default_input(event)
        })
    }

    fn default_input(&mut self, event: InputEvent<'_>) -> Result<(), ApplyError> {
        match event {
            InputEvent::InsertText(text) => {
                let marks = self.take_pending_marks();
                transforms::insert_text_with_marks(self, text, marks)
            }
            InputEvent::InsertBreak => transforms::split_block(self),
            InputEvent::DeleteBackward => transforms::delete_backward(self),
            InputEvent::InsertData(data) => match data.text.as_deref() {
                Some(text) if !text.is_empty() => self.insert_text(text),
                _ => Ok(()),
            },
        }
    }
}

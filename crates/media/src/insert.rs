use std::sync::Arc;

use slator_core::{
    ApplyError, DataTransfer, EditorPlugin, Editor, ImageAttrs, InputHandler, InputOutcome,
    LocalFile, insert_image,
};

use crate::store::FileStore;
use crate::validate::ImageValidator;

/// Validates `files` and inserts an image block for each accepted one, in a
/// single undo step. Rejected files never produce a node. Returns the ids of
/// the new images.
pub fn insert_image_files(
    editor: &mut Editor,
    files: &[LocalFile],
    validator: &ImageValidator,
    store: &FileStore,
) -> Result<Vec<String>, ApplyError> {
    let accepted: Vec<(LocalFile, String)> = files
        .iter()
        .filter_map(|file| {
            validator
                .validate(file)
                .ok()
                .map(|mime| (file.clone(), mime))
        })
        .collect();
    if accepted.is_empty() {
        return Ok(Vec::new());
    }

    editor.transact("media:insert_images", |editor| {
        let mut ids = Vec::with_capacity(accepted.len());
        for (file, mime) in accepted {
            let attrs = ImageAttrs::from_file(store.put(file, &mime));
            ids.push(attrs.id.clone());
            insert_image(editor, attrs)?;
        }
        Ok(ids)
    })
}

struct ImageFilePaste {
    validator: ImageValidator,
    store: FileStore,
}

impl InputHandler for ImageFilePaste {
    fn id(&self) -> &'static str {
        "media.paste_files"
    }

    fn try_handle_insert_data(
        &self,
        editor: &mut Editor,
        data: &DataTransfer,
    ) -> Result<InputOutcome, ApplyError> {
        if data.files.is_empty() {
            return Ok(InputOutcome::PassThrough);
        }
        let ids = insert_image_files(editor, &data.files, &self.validator, &self.store)?;
        tracing::debug!(count = ids.len(), offered = data.files.len(), "pasted image files");
        Ok(InputOutcome::Handled)
    }
}

/// Registers image file paste and drop. Accepted files are kept in `store`
/// and referenced from the new image nodes.
pub struct ImageFilesPlugin {
    validator: ImageValidator,
    store: FileStore,
}

impl ImageFilesPlugin {
    pub fn new(validator: ImageValidator, store: FileStore) -> Self {
        Self { validator, store }
    }
}

impl EditorPlugin for ImageFilesPlugin {
    fn id(&self) -> &'static str {
        "media.image_files"
    }

    fn input_handlers(&self) -> Vec<Arc<dyn InputHandler>> {
        vec![Arc::new(ImageFilePaste {
            validator: self.validator.clone(),
            store: self.store.clone(),
        })]
    }
}

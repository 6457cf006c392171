use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine as _;
use parking_lot::Mutex;
use slator_core::{FileRef, LocalFile};

/// Bytes of files that image nodes reference by key until their upload
/// resolves.
#[derive(Debug, Clone, Default)]
pub struct FileStore {
    files: Arc<Mutex<HashMap<String, LocalFile>>>,
}

impl FileStore {
    /// Keeps `file` and returns the reference an image node carries.
    /// `mime` is the validated type, which may differ from what the host
    /// reported.
    pub fn put(&self, file: LocalFile, mime: &str) -> FileRef {
        let key = uuid::Uuid::new_v4().simple().to_string();
        let file_ref = FileRef {
            key: key.clone(),
            name: file.name.clone(),
            mime: mime.to_string(),
            size: file.size(),
        };
        self.files.lock().insert(key, file);
        file_ref
    }

    pub fn get(&self, key: &str) -> Option<LocalFile> {
        self.files.lock().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.files.lock().contains_key(key)
    }

    pub fn release(&self, key: &str) -> bool {
        let released = self.files.lock().remove(key).is_some();
        if released {
            tracing::trace!(key, "released local file");
        }
        released
    }

    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.lock().is_empty()
    }

    /// A `data:` url showing the file while it uploads.
    pub fn preview_url(&self, file: &FileRef) -> Option<String> {
        let files = self.files.lock();
        let local = files.get(&file.key)?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&local.bytes);
        Some(format!("data:{};base64,{encoded}", file.mime))
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// Image id to uploaded url, shared by everything in one editing session.
///
/// A node that comes back through undo/redo still carries its local file;
/// finding its id here means the upload already happened.
#[derive(Debug, Clone, Default)]
pub struct UploadCache {
    urls: Arc<Mutex<HashMap<String, String>>>,
}

impl UploadCache {
    pub fn get(&self, id: &str) -> Option<String> {
        self.urls.lock().get(id).cloned()
    }

    pub fn insert(&self, id: impl Into<String>, url: impl Into<String>) {
        self.urls.lock().insert(id.into(), url.into());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.urls.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.urls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.lock().is_empty()
    }
}

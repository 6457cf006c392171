//! Upload lifecycle of image nodes.
//!
//! `ImageUploads` watches the document for images that still carry a local
//! file, uploads each one on a tokio task and merges the resulting url back
//! into the node. Results come back over a channel and are applied on the
//! thread that owns the editor. The url merge never enters undo history.

use std::collections::{HashMap, HashSet};

use slator_core::{ApplyError, AttrPatch, Editor, FileRef, images};
use tokio::sync::mpsc;

use crate::cache::UploadCache;
use crate::config::{RetryPolicy, UploadConfig, UploadResponse};
use crate::error::UploadError;
use crate::status::{UploadPhase, UploadStatus};
use crate::store::FileStore;

/// Outcome of one upload task.
#[derive(Debug, Clone)]
pub struct UploadEvent {
    pub id: String,
    pub file_key: String,
    pub attempts: u32,
    pub result: Result<UploadResponse, UploadError>,
    generation: u64,
}

pub struct ImageUploads {
    config: UploadConfig,
    cache: UploadCache,
    store: FileStore,
    statuses: HashMap<String, UploadStatus>,
    next_generation: u64,
    in_flight: usize,
    events_tx: mpsc::UnboundedSender<UploadEvent>,
    events_rx: mpsc::UnboundedReceiver<UploadEvent>,
}

impl ImageUploads {
    pub fn new(config: UploadConfig, store: FileStore, cache: UploadCache) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config,
            cache,
            store,
            statuses: HashMap::new(),
            next_generation: 1,
            in_flight: 0,
            events_tx,
            events_rx,
        }
    }

    pub fn cache(&self) -> &UploadCache {
        &self.cache
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    pub fn status(&self, id: &str) -> Option<&UploadStatus> {
        self.statuses.get(id)
    }

    pub fn preview_url(&self, id: &str) -> Option<&str> {
        self.statuses.get(id)?.preview_url.as_deref()
    }

    /// Number of upload tasks that have not reported back yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Brings the side table in line with the document. Images already
    /// uploaded in this session get their cached url without a new upload;
    /// other pending images start uploading. Entries for images that left the
    /// document are torn down. Must run inside a tokio runtime.
    pub fn observe(&mut self, editor: &mut Editor) -> Result<(), ApplyError> {
        let found = images(editor.doc());
        let live: HashSet<String> = found.iter().map(|(_, attrs)| attrs.id.clone()).collect();

        let stale: Vec<String> = self
            .statuses
            .keys()
            .filter(|id| !live.contains(*id))
            .cloned()
            .collect();
        for id in stale {
            self.unmount(&id);
        }

        for (_, attrs) in found {
            if attrs.url.is_some() {
                self.statuses
                    .entry(attrs.id.clone())
                    .or_insert_with(|| UploadStatus::new(UploadPhase::Uploaded));
                continue;
            }
            let Some(file) = attrs.file else {
                continue;
            };

            if let Some(url) = self.cache.get(&attrs.id) {
                tracing::debug!(id = %attrs.id, "upload cache hit");
                self.merge_url(editor, &attrs.id, &UploadResponse::new(url))?;
                self.store.release(&file.key);
                self.statuses
                    .entry(attrs.id)
                    .or_insert_with(|| UploadStatus::new(UploadPhase::Uploaded))
                    .phase = UploadPhase::Uploaded;
                continue;
            }

            match self.statuses.get(&attrs.id).map(|s| s.phase) {
                Some(UploadPhase::Uploading | UploadPhase::Failed) => {}
                _ => self.start_upload(&attrs.id, &file),
            }
        }
        Ok(())
    }

    /// Starts another attempt for a failed image.
    pub fn retry(&mut self, editor: &Editor, id: &str) -> Result<(), UploadError> {
        let phase = self
            .statuses
            .get(id)
            .map(|s| s.phase)
            .ok_or_else(|| UploadError::UnknownImage(id.to_string()))?;
        match phase {
            UploadPhase::Failed => {}
            UploadPhase::Uploading => return Err(UploadError::InFlight(id.to_string())),
            phase => {
                return Err(UploadError::NotRetryable {
                    id: id.to_string(),
                    phase,
                });
            }
        }

        let file = images(editor.doc())
            .into_iter()
            .find(|(_, attrs)| attrs.id == id)
            .ok_or_else(|| UploadError::UnknownImage(id.to_string()))?
            .1
            .file
            .ok_or_else(|| UploadError::MissingFile(id.to_string()))?;
        tracing::debug!(id, "retrying upload");
        self.start_upload(id, &file);
        Ok(())
    }

    /// Forgets the image `id`. A task still running for it keeps going, but
    /// its result no longer touches the document or the side table.
    pub fn unmount(&mut self, id: &str) {
        if self.statuses.remove(id).is_some() {
            tracing::debug!(id, "image unmounted");
        }
    }

    fn start_upload(&mut self, id: &str, file: &FileRef) {
        let generation = self.next_generation;
        self.next_generation += 1;

        let preview_url = self.store.preview_url(file);
        let status = self
            .statuses
            .entry(id.to_string())
            .or_insert_with(|| UploadStatus::new(UploadPhase::LocalPreview));
        status.generation = generation;
        status.error = None;
        if status.preview_url.is_none() {
            status.preview_url = preview_url;
        }

        let Some(local) = self.store.get(&file.key) else {
            let err = UploadError::MissingFile(id.to_string());
            tracing::warn!(id, key = %file.key, "local file missing; upload not started");
            status.phase = UploadPhase::Failed;
            status.error = Some(err.to_string());
            if let Some(on_error) = &self.config.on_error {
                on_error(id, &err);
            }
            return;
        };

        status.phase = UploadPhase::Uploading;
        status.attempts += 1;
        self.in_flight += 1;

        let uploader = self.config.uploader.clone();
        let retry = self.config.retry;
        let tx = self.events_tx.clone();
        let id = id.to_string();
        let file_key = file.key.clone();
        tracing::debug!(%id, generation, "upload started");

        tokio::spawn(async move {
            let mut attempts = 0u32;
            let result = loop {
                attempts += 1;
                let result = uploader.upload(local.clone()).await;
                let retry_after = match (&result, retry) {
                    (Err(err), RetryPolicy::Automatic { max_retries, delay })
                        if attempts <= max_retries =>
                    {
                        tracing::warn!(%id, attempts, %err, "upload failed; retrying");
                        Some(delay)
                    }
                    _ => None,
                };
                match retry_after {
                    Some(delay) => tokio::time::sleep(delay).await,
                    None => break result,
                }
            };
            let event = UploadEvent {
                id,
                file_key,
                attempts,
                result,
                generation,
            };
            if tx.send(event).is_err() {
                tracing::debug!("upload finished after its pipeline was dropped");
            }
        });
    }

    /// Applies every result that has already arrived. Returns how many.
    pub fn pump(&mut self, editor: &mut Editor) -> Result<usize, ApplyError> {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply_event(editor, event)?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Waits for the next upload result. `None` when nothing is in flight.
    pub async fn next_event(&mut self) -> Option<UploadEvent> {
        if self.in_flight == 0 {
            return None;
        }
        self.events_rx.recv().await
    }

    /// Waits for every in-flight upload and applies the results.
    pub async fn settle(&mut self, editor: &mut Editor) -> Result<(), ApplyError> {
        while let Some(event) = self.next_event().await {
            self.apply_event(editor, event)?;
        }
        Ok(())
    }

    pub fn apply_event(&mut self, editor: &mut Editor, event: UploadEvent) -> Result<(), ApplyError> {
        self.in_flight = self.in_flight.saturating_sub(1);
        let current = self
            .statuses
            .get(&event.id)
            .is_some_and(|s| s.generation == event.generation && s.phase == UploadPhase::Uploading);

        match &event.result {
            Ok(response) => {
                self.cache.insert(event.id.clone(), response.url.clone());
                if let Some(on_success) = &self.config.on_success {
                    on_success(&event.id, response);
                }
                self.store.release(&event.file_key);
                if !current {
                    tracing::debug!(id = %event.id, "stale upload result discarded");
                    return Ok(());
                }
                if let Some(status) = self.statuses.get_mut(&event.id) {
                    status.phase = UploadPhase::Uploaded;
                    status.error = None;
                    status.preview_url = None;
                }
                tracing::debug!(id = %event.id, url = %response.url, "upload finished");
                self.merge_url(editor, &event.id, response)?;
            }
            Err(err) => {
                if let Some(on_error) = &self.config.on_error {
                    on_error(&event.id, err);
                }
                if !current {
                    tracing::debug!(id = %event.id, "stale upload failure discarded");
                    return Ok(());
                }
                tracing::warn!(id = %event.id, attempts = event.attempts, %err, "upload failed");
                if let Some(status) = self.statuses.get_mut(&event.id) {
                    status.phase = UploadPhase::Failed;
                    status.error = Some(err.to_string());
                }
            }
        }
        Ok(())
    }

    fn merge_url(&self, editor: &mut Editor, id: &str, response: &UploadResponse) -> Result<bool, ApplyError> {
        let mut patch = AttrPatch::default().set("url", response.url.as_str()).remove("file");
        if let Some(width) = response.width {
            patch = patch.set("width", width);
        }
        if let Some(height) = response.height {
            patch = patch.set("height", height);
        }
        slator_core::patch_image(editor, id, patch, false)
    }

    /// Natural size reported by the renderer once the image loaded. Kept out
    /// of history and only written when the node has no size yet.
    pub fn report_dimensions(
        &self,
        editor: &mut Editor,
        id: &str,
        width: u32,
        height: u32,
    ) -> Result<bool, ApplyError> {
        let has_size = images(editor.doc())
            .into_iter()
            .find(|(_, attrs)| attrs.id == id)
            .is_some_and(|(_, attrs)| attrs.width.is_some() && attrs.height.is_some());
        if has_size {
            return Ok(false);
        }
        let patch = AttrPatch::default().set("width", width).set("height", height);
        slator_core::patch_image(editor, id, patch, false)
    }

    /// Caption edits are user edits and go through history.
    pub fn set_caption(&self, editor: &mut Editor, id: &str, alt: &str) -> Result<bool, ApplyError> {
        slator_core::set_image_alt(editor, id, alt)
    }
}

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadPhase {
    /// Showing the local file; no upload started yet.
    LocalPreview,
    Uploading,
    Uploaded,
    /// The last attempt failed. The node keeps its file until a retry.
    Failed,
}

/// Transient per-image state for the renderer. Never stored in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadStatus {
    pub phase: UploadPhase,
    pub attempts: u32,
    pub error: Option<String>,
    pub preview_url: Option<String>,
    #[serde(skip)]
    pub(crate) generation: u64,
}

impl UploadStatus {
    pub(crate) fn new(phase: UploadPhase) -> Self {
        Self {
            phase,
            attempts: 0,
            error: None,
            preview_url: None,
            generation: 0,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.phase == UploadPhase::Uploading
    }

    pub fn can_retry(&self) -> bool {
        self.phase == UploadPhase::Failed
    }
}

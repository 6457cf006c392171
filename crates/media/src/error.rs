use crate::status::UploadPhase;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    #[error("upload failed: {0}")]
    Uploader(String),
    #[error("no local file for image {0}")]
    MissingFile(String),
    #[error("image {0} is not in the document")]
    UnknownImage(String),
    #[error("image {id} cannot be retried while {phase:?}")]
    NotRetryable { id: String, phase: UploadPhase },
    #[error("an upload for image {0} is already in flight")]
    InFlight(String),
}

impl UploadError {
    pub fn uploader(message: impl Into<String>) -> Self {
        UploadError::Uploader(message.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{name} is {size} bytes, over the {max} byte limit")]
    TooLarge { name: String, size: u64, max: u64 },
    #[error("{name} has unsupported type {mime}")]
    UnsupportedType { name: String, mime: String },
}

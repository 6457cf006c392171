mod cache;
mod config;
mod error;
mod insert;
mod pipeline;
mod status;
mod store;
mod validate;

pub use crate::cache::UploadCache;
pub use crate::config::*;
pub use crate::error::{UploadError, ValidationError};
pub use crate::insert::{ImageFilesPlugin, insert_image_files};
pub use crate::pipeline::{ImageUploads, UploadEvent};
pub use crate::status::{UploadPhase, UploadStatus};
pub use crate::store::FileStore;
pub use crate::validate::{ImageValidator, RejectCallback};

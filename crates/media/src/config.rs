use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use slator_core::LocalFile;

use crate::error::UploadError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl UploadResponse {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            width: None,
            height: None,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}

pub type UploadFuture = Pin<Box<dyn Future<Output = Result<UploadResponse, UploadError>> + Send + 'static>>;

/// Sends a file to the host's storage.
pub trait ImageUploader: Send + Sync {
    fn upload(&self, file: LocalFile) -> UploadFuture;
}

impl<F, Fut> ImageUploader for F
where
    F: Fn(LocalFile) -> Fut + Send + Sync,
    Fut: Future<Output = Result<UploadResponse, UploadError>> + Send + 'static,
{
    fn upload(&self, file: LocalFile) -> UploadFuture {
        Box::pin(self(file))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// A failed upload waits for an explicit retry.
    #[default]
    Manual,
    /// Up to `max_retries` further attempts, `delay` apart, before the image
    /// is marked failed. Manual retry stays available afterwards.
    Automatic { max_retries: u32, delay: Duration },
}

pub type SuccessCallback = Arc<dyn Fn(&str, &UploadResponse) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&str, &UploadError) + Send + Sync>;

#[derive(Clone)]
pub struct UploadConfig {
    pub uploader: Arc<dyn ImageUploader>,
    pub on_success: Option<SuccessCallback>,
    pub on_error: Option<ErrorCallback>,
    pub retry: RetryPolicy,
}

impl UploadConfig {
    pub fn new(uploader: impl ImageUploader + 'static) -> Self {
        Self {
            uploader: Arc::new(uploader),
            on_success: None,
            on_error: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn on_success(mut self, callback: impl Fn(&str, &UploadResponse) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&str, &UploadError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

use std::sync::Arc;

use slator_core::LocalFile;

use crate::error::ValidationError;

pub type RejectCallback = Arc<dyn Fn(&LocalFile, &ValidationError) + Send + Sync>;

/// Checks files before any image node is created for them.
#[derive(Clone, Default)]
pub struct ImageValidator {
    pub max_size: Option<u64>,
    /// Allowed image subtypes, e.g. `png`. Any image type when unset.
    pub allowed_types: Option<Vec<String>>,
    pub on_reject: Option<RejectCallback>,
}

impl ImageValidator {
    pub fn max_size(mut self, bytes: u64) -> Self {
        self.max_size = Some(bytes);
        self
    }

    pub fn allowed_types<I, S>(mut self, subtypes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_types = Some(subtypes.into_iter().map(Into::into).collect());
        self
    }

    pub fn on_reject(mut self, callback: impl Fn(&LocalFile, &ValidationError) + Send + Sync + 'static) -> Self {
        self.on_reject = Some(Arc::new(callback));
        self
    }

    /// Returns the file's image mime type. Rejections go to `on_reject`
    /// before being returned.
    pub fn validate(&self, file: &LocalFile) -> Result<String, ValidationError> {
        let result = self.check(file);
        if let Err(err) = &result {
            tracing::debug!(file = %file.name, %err, "image rejected");
            if let Some(on_reject) = &self.on_reject {
                on_reject(file, err);
            }
        }
        result
    }

    fn check(&self, file: &LocalFile) -> Result<String, ValidationError> {
        let mime = resolve_mime(file);
        let subtype = mime.strip_prefix("image/").ok_or_else(|| ValidationError::UnsupportedType {
            name: file.name.clone(),
            mime: mime.clone(),
        })?;
        if let Some(allowed) = &self.allowed_types
            && !allowed.iter().any(|t| t.eq_ignore_ascii_case(subtype))
        {
            return Err(ValidationError::UnsupportedType {
                name: file.name.clone(),
                mime,
            });
        }
        if let Some(max) = self.max_size
            && file.size() > max
        {
            return Err(ValidationError::TooLarge {
                name: file.name.clone(),
                size: file.size(),
                max,
            });
        }
        Ok(mime)
    }
}

/// The host's mime type, or one guessed from the file name.
fn resolve_mime(file: &LocalFile) -> String {
    if !file.mime.is_empty() {
        return file.mime.to_ascii_lowercase();
    }
    mime_guess::from_path(&file.name)
        .first()
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_default()
}

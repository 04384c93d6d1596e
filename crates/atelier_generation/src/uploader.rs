//! Reference image upload.

use atelier_backend::GenerationBackend;
use atelier_core::{ReferenceImage, UploadPolicy};
use atelier_error::{
    AtelierError, AtelierResult, BackendError, BackendErrorKind, GenerationError,
    GenerationErrorKind,
};
use atelier_workflow::UploadedReference;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Sends local reference images to the backend's input area.
#[derive(Clone)]
pub struct ReferenceImageUploader {
    backend: Arc<dyn GenerationBackend>,
}

impl ReferenceImageUploader {
    /// Create an uploader over a backend.
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    /// Upload one file and return the handle a loader node accepts.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn upload(&self, path: &Path) -> AtelierResult<String> {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                BackendError::new(BackendErrorKind::Io(format!(
                    "{} has no usable file name",
                    path.display()
                )))
            })?;

        let bytes = tokio::fs::read(path).await.map_err(|e| {
            BackendError::new(BackendErrorKind::Io(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        })?;

        let uploaded = self.backend.upload_image(filename, bytes).await?;
        Ok(uploaded.handle())
    }

    /// Upload every reference under `policy`.
    ///
    /// With [`UploadPolicy::BestEffort`] a failed image is logged and left out. With
    /// [`UploadPolicy::Required`] the first failure aborts with `ReferenceUploadFailed`.
    #[instrument(skip(self, references), fields(count = references.len(), policy = ?policy))]
    pub async fn upload_all(
        &self,
        references: &[ReferenceImage],
        policy: UploadPolicy,
    ) -> AtelierResult<Vec<UploadedReference>> {
        let mut uploaded = Vec::with_capacity(references.len());
        for reference in references {
            match self.upload(&reference.path).await {
                Ok(handle) => {
                    debug!(role = %reference.role, %handle, "Reference uploaded");
                    uploaded.push(UploadedReference::new(reference.role, handle));
                }
                Err(e) => match policy {
                    UploadPolicy::BestEffort => {
                        warn!(
                            role = %reference.role,
                            error = %e.message(),
                            "Reference upload failed; continuing without it"
                        );
                    }
                    UploadPolicy::Required => {
                        return Err(required_failure(&reference.path, &e));
                    }
                },
            }
        }
        Ok(uploaded)
    }
}

fn required_failure(path: &Path, err: &AtelierError) -> AtelierError {
    GenerationError::new(GenerationErrorKind::ReferenceUploadFailed(format!(
        "{}: {}",
        path.display(),
        err.message()
    )))
    .into()
}
